// src/graph/mod.rs

//! Job graph construction.
//!
//! - [`args`] splits tool parameter strings into arguments.
//! - [`spec`] holds the immutable per-task specification.
//! - [`model`] defines [`Graph`] and [`GraphTask`].
//! - [`validate`] rejects unknown dependencies and cycles.
//! - [`generator`] builds a [`Graph`] from a [`Job`](crate::job::Job),
//!   choosing a descriptor factory for every task.

pub mod args;
pub mod generator;
pub mod model;
pub mod spec;
pub mod validate;

pub use args::{LogicalArgument, split_arguments};
pub use generator::GraphGenerator;
pub use model::{Graph, GraphTask};
pub use spec::{GraphExecutionEnvironment, GraphTaskSpec, task_key};
