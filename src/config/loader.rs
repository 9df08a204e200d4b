// src/config/loader.rs
use std::path::Path;

use config::{Config as ConfigLoader, ConfigBuilder, Environment, File, FileFormat};
use config::builder::DefaultState;
use tracing::{info, warn};

use super::schema::Config;
use crate::error::{ExporterError, ExporterResult};

/// Where the binary looks for its configuration when `-C` is not given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/domain_exporter.toml";

/// `DOMAIN_EXPORTER_SERVER__LISTEN_ADDRESS=...` overrides `server.listen_address`
pub const ENV_PREFIX: &str = "DOMAIN_EXPORTER";

const DEFAULTS: &str = include_str!("../../config/default.toml");

fn defaults() -> ConfigBuilder<DefaultState> {
    ConfigLoader::builder().add_source(File::from_str(DEFAULTS, FileFormat::Toml))
}

fn finish(builder: ConfigBuilder<DefaultState>) -> ExporterResult<Config> {
    let config: Config = builder
        .build()
        .map_err(|e| ExporterError::ConfigError(format!("Failed to build configuration: {}", e)))?
        .try_deserialize()
        .map_err(|e| ExporterError::ConfigError(format!("Failed to parse configuration: {}", e)))?;

    config.validate()?;
    Ok(config)
}

/// Load defaults, then `path`, then the environment. A missing file is not
/// an error; the built-in defaults are used instead.
pub fn load_config(path: &Path) -> ExporterResult<Config> {
    let mut builder = defaults();

    if path.exists() {
        info!("Loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    } else {
        warn!("Config file {} not found. Using default config.", path.display());
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__"),
    );

    let config = finish(builder)?;
    info!("Loaded {} probe(s)", config.probes.len());
    Ok(config)
}

/// Parse a TOML document on top of the defaults, without the environment
pub fn parse_config(content: &str) -> ExporterResult<Config> {
    finish(defaults().add_source(File::from_str(content, FileFormat::Toml)))
}
