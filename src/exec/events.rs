// src/exec/events.rs

//! Node lifecycle notifications and the overall execution report.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::graph::GraphTask;
use crate::types::{BuildResultStatus, OutputStream};

/// Receives node lifecycle events while a graph executes.
///
/// Called concurrently from every running node. For a single node the
/// order is `node_started`, any number of `node_output`, `node_finished`.
/// Nodes resolved to `NotRun` or cancelled before starting only get
/// `node_finished`.
pub trait ExecutionEvents: Send + Sync {
    fn node_started<'a>(&'a self, task: &'a GraphTask) -> BoxFuture<'a, Result<()>>;

    fn node_output<'a>(
        &'a self,
        task: &'a GraphTask,
        line: String,
        stream: OutputStream,
    ) -> BoxFuture<'a, Result<()>>;

    fn node_finished<'a>(
        &'a self,
        task: &'a GraphTask,
        outcome: NodeOutcome,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Terminal result of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeOutcome {
    pub status: BuildResultStatus,
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl NodeOutcome {
    pub fn skipped(status: BuildResultStatus) -> Self {
        Self {
            status,
            exit_code: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Events sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEvents;

impl ExecutionEvents for NullEvents {
    fn node_started<'a>(&'a self, _task: &'a GraphTask) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn node_output<'a>(
        &'a self,
        _task: &'a GraphTask,
        _line: String,
        _stream: OutputStream,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn node_finished<'a>(
        &'a self,
        _task: &'a GraphTask,
        _outcome: NodeOutcome,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Per-node statuses of one graph execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub statuses: BTreeMap<String, BuildResultStatus>,
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// Success iff every node succeeded.
    pub fn is_success(&self) -> bool {
        self.statuses.values().all(|s| s.is_success())
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn status_of(&self, key: &str) -> Option<BuildResultStatus> {
        self.statuses.get(key).copied()
    }

    pub fn count(&self, status: BuildResultStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.count(BuildResultStatus::Cancelled) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_success() {
        let report = ExecutionReport::default();
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn any_non_success_fails_the_report() {
        let mut report = ExecutionReport::default();
        report.statuses.insert("p:a".into(), BuildResultStatus::Success);
        report.statuses.insert("p:b".into(), BuildResultStatus::NotRun);
        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.count(BuildResultStatus::NotRun), 1);
    }
}
