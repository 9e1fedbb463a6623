// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenGeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("Conflicting task key '{0}'")]
    DuplicateTaskKey(String),

    #[error("No task descriptor factory could handle '{0}'")]
    NoCapableFactory(String),

    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Correctness check failed: {0}")]
    Correctness(String),

    #[error("Dispatcher has already been started")]
    AlreadyStarted,

    #[error("Dispatcher is not running")]
    NotStarted,

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Response stream is closed")]
    StreamClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OpenGeError {
    /// Errors that reject a job before any node executes. These are never
    /// retried.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            OpenGeError::ConfigError(_)
                | OpenGeError::DagCycle(_)
                | OpenGeError::DuplicateTaskKey(_)
                | OpenGeError::NoCapableFactory(_)
                | OpenGeError::UnknownDependency { .. }
                | OpenGeError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OpenGeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_family_is_classified() {
        assert!(OpenGeError::DagCycle("a".into()).is_configuration_error());
        assert!(
            OpenGeError::UnknownDependency {
                task: "p:a".into(),
                dependency: "p:b".into()
            }
            .is_configuration_error()
        );
        assert!(!OpenGeError::Cancelled.is_configuration_error());
        assert!(!OpenGeError::Correctness("x".into()).is_configuration_error());
    }
}
