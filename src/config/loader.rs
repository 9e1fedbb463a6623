// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{DispatcherConfig, RawDispatcherConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw settings.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawDispatcherConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawDispatcherConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Parse settings straight from a TOML string.
pub fn parse_and_validate(contents: &str) -> Result<DispatcherConfig> {
    let raw: RawDispatcherConfig = toml::from_str(contents)?;
    DispatcherConfig::try_from(raw)
}

/// Load a configuration file from path and run validation.
///
/// When `path` is the default path and the file does not exist, the
/// built-in defaults are returned instead of an error; an explicitly named
/// file must exist.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<DispatcherConfig> {
    let path = path.as_ref();
    if path == default_config_path() && !path.exists() {
        debug!(path = %path.display(), "no dispatcher config found; using defaults");
        return Ok(DispatcherConfig::default());
    }

    let raw_config = load_from_path(path)?;
    let config = DispatcherConfig::try_from(raw_config)?;
    Ok(config)
}

/// Default config path: `openge.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("openge.toml")
}
