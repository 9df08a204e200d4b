// src/logging.rs
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

use clap::ValueEnum;
use tracing::{error, Level};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging switches shared by the binary and tests.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub debug: bool,
    pub level: String,
    pub format: LogFormat,
    pub path: Option<PathBuf>,
}

impl LogOptions {
    /// Debug mode wins; unknown level names fall back to info.
    pub fn effective_level(&self) -> Level {
        if self.debug {
            return Level::DEBUG;
        }
        Level::from_str(self.level.trim()).unwrap_or(Level::INFO)
    }

    /// Debug mode always logs plain text
    pub fn effective_format(&self) -> LogFormat {
        if self.debug {
            LogFormat::Text
        } else {
            self.format
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the level when set.
pub fn init(options: &LogOptions) {
    let level = options.effective_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let mut open_error = None;
    let writer = match &options.path {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => BoxMakeWriter::new(Mutex::new(file)),
            Err(e) => {
                open_error = Some(format!("Failed to open log file {}: {}", path.display(), e));
                BoxMakeWriter::new(std::io::stderr)
            }
        },
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer);

    let installed = match options.effective_format() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init(),
    };

    if let Err(e) = installed {
        eprintln!("Logging already initialised: {}", e);
    }
    if let Some(message) = open_error {
        error!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(level: &str) -> LogOptions {
        LogOptions {
            level: level.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_level_resolution() {
        assert_eq!(options("warn").effective_level(), Level::WARN);
        assert_eq!(options("TRACE").effective_level(), Level::TRACE);
        assert_eq!(options("chatty").effective_level(), Level::INFO);
        assert_eq!(options("").effective_level(), Level::INFO);
    }

    #[test]
    fn test_debug_forces_text_and_debug_level() {
        let debug = LogOptions {
            debug: true,
            level: "error".to_string(),
            format: LogFormat::Json,
            path: None,
        };
        assert_eq!(debug.effective_level(), Level::DEBUG);
        assert_eq!(debug.effective_format(), LogFormat::Text);

        let json = LogOptions {
            format: LogFormat::Json,
            ..options("info")
        };
        assert_eq!(json.effective_format(), LogFormat::Json);
    }
}
