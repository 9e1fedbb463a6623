// src/job/mod.rs

//! The job-graph document clients submit: environments with tools, and
//! projects with tasks that invoke those tools.

pub mod loader;
pub mod model;

pub use loader::{load_job, parse_job};
pub use model::{Job, JobEnvironment, JobProject, JobTask, JobTool};
