// src/exec/mod.rs

//! Graph execution layer.
//!
//! - [`schedule`] decides the order node handles are launched in (pure).
//! - [`executor`] is the async DAG walker built on top of it.
//! - [`backend`] provides the `DescriptorExecutor` trait and the
//!   production `ProcessDescriptorExecutor`; tests replace it with a fake.
//! - [`task_runner`] spawns and supervises child processes.
//! - [`workspace`] leases a folder to each executing node.
//! - [`events`] defines the node lifecycle callbacks and the final report.

use std::future::Future;
use std::pin::Pin;

pub mod backend;
pub mod events;
pub mod executor;
pub mod schedule;
pub mod task_runner;
pub mod workspace;

pub use backend::{DescriptorExecutor, OutputLine, ProcessDescriptorExecutor};
pub use events::{ExecutionEvents, ExecutionReport, NodeOutcome, NullEvents};
pub use executor::GraphExecutor;
pub use workspace::{FolderWorkspaceProvider, Workspace, WorkspaceProvider};

/// Boxed, sendable future used at the trait seams of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
