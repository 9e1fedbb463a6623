// src/config/mod.rs

//! Dispatcher configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed settings model (`model.rs`).
//! - Load a settings file from disk (`loader.rs`).
//! - Validate basic invariants (`validate.rs`).
//!
//! The job-graph document submitted by clients lives in [`crate::job`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, parse_and_validate};
pub use model::{DispatcherConfig, DispatcherSection, RawDispatcherConfig, WorkspaceSection};
pub use validate::validate_config;
