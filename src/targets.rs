// src/targets.rs
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExporterError, ExporterResult};

/// One monitored domain.
///
/// Targets compare and hash by [`Target::key`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub domain: String,
}

impl Target {
    pub fn new(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
        }
    }

    /// A target whose display name is the domain itself
    pub fn from_host(host: impl Into<String>) -> Self {
        let host = host.into();
        Self::new(host.clone(), host)
    }

    /// Stable identity used to diff target lists.
    pub fn key(&self) -> String {
        if self.name == self.domain {
            self.name.clone()
        } else {
            format!("{}|{}", self.name, self.domain)
        }
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.domain {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.domain)
        }
    }
}

/// Authoritative list of targets, pulled on every reconciliation pass.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetSource: Send + Sync {
    async fn list_targets(&self) -> ExporterResult<Vec<Target>>;
}

/// Fixed list, typically straight from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct StaticTargets {
    targets: Vec<Target>,
}

impl StaticTargets {
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl TargetSource for StaticTargets {
    async fn list_targets(&self) -> ExporterResult<Vec<Target>> {
        Ok(self.targets.clone())
    }
}

/// Targets read from a text file on every pass.
///
/// One target per line, `name [domain]`; blank lines and `#` comments are skipped.
#[derive(Debug, Clone)]
pub struct FileTargets {
    path: PathBuf,
}

impl FileTargets {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the file format described on [`FileTargets`]
    pub fn parse(content: &str) -> Vec<Target> {
        content
            .lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let name = fields.next()?;
                let domain = fields.next().unwrap_or(name);
                Some(Target::new(name, domain))
            })
            .collect()
    }
}

#[async_trait]
impl TargetSource for FileTargets {
    async fn list_targets(&self) -> ExporterResult<Vec<Target>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ExporterError::FileError {
                path: self.path.clone(),
                message: format!("Failed to read targets file: {}", e),
            })?;

        let targets = Self::parse(&content);
        debug!("Read {} targets from {}", targets.len(), self.path.display());
        Ok(targets)
    }
}

/// In-memory list the embedding process can change at runtime.
#[derive(Debug, Clone, Default)]
pub struct SharedTargets {
    inner: Arc<RwLock<Vec<Target>>>,
}

impl SharedTargets {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(targets)),
        }
    }

    /// Replace the whole list
    pub fn set(&self, targets: Vec<Target>) {
        *self.inner.write() = targets;
    }

    /// Add a target unless one with the same key exists
    pub fn add(&self, target: Target) {
        let mut targets = self.inner.write();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    /// Remove the target with the given key
    pub fn remove(&self, key: &str) {
        self.inner.write().retain(|t| t.key() != key);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[async_trait]
impl TargetSource for SharedTargets {
    async fn list_targets(&self) -> ExporterResult<Vec<Target>> {
        Ok(self.inner.read().clone())
    }
}
