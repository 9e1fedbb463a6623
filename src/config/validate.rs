// src/config/validate.rs

use crate::config::model::{DispatcherConfig, RawDispatcherConfig};
use crate::errors::{OpenGeError, Result};

impl TryFrom<RawDispatcherConfig> for DispatcherConfig {
    type Error = OpenGeError;

    fn try_from(raw: RawDispatcherConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(DispatcherConfig::new_unchecked(raw.dispatcher, raw.workspace))
    }
}

pub fn validate_config(cfg: &RawDispatcherConfig) -> Result<()> {
    validate_concurrency(cfg)?;
    validate_pipe_name(cfg)?;
    Ok(())
}

fn validate_concurrency(cfg: &RawDispatcherConfig) -> Result<()> {
    if cfg.dispatcher.concurrency_limit == Some(0) {
        return Err(OpenGeError::ConfigError(
            "[dispatcher].concurrency_limit must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_pipe_name(cfg: &RawDispatcherConfig) -> Result<()> {
    if let Some(name) = &cfg.dispatcher.pipe_name {
        if name.trim().is_empty() {
            return Err(OpenGeError::ConfigError(
                "[dispatcher].pipe_name must not be empty".to_string(),
            ));
        }
        // The name becomes a file name (unix socket) or a pipe path segment.
        if name.contains(['/', '\\']) {
            return Err(OpenGeError::ConfigError(format!(
                "[dispatcher].pipe_name '{name}' must not contain path separators"
            )));
        }
    }
    Ok(())
}
