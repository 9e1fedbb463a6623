// src/types.rs

//! Small shared enums used across the graph executor, the dispatcher and
//! the wire protocol.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal status of a single graph node.
///
/// `NotRun` is synthesized by the executor when a node's dependencies did
/// not all succeed, or when the build already failed before the node got
/// to start. A task never reports it about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildResultStatus {
    Success,
    Failed,
    Cancelled,
    NotRun,
}

impl BuildResultStatus {
    pub fn is_success(self) -> bool {
        matches!(self, BuildResultStatus::Success)
    }
}

impl fmt::Display for BuildResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildResultStatus::Success => "Success",
            BuildResultStatus::Failed => "Failed",
            BuildResultStatus::Cancelled => "Cancelled",
            BuildResultStatus::NotRun => "NotRun",
        };
        f.write_str(s)
    }
}

/// Why a job's cancellation token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The client (or the process-wide shutdown token) asked for it.
    Requested,
    /// Something inside the job broke, e.g. the response stream died.
    InternalFailure,
}

/// Final status of a whole job as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobCompletionStatus {
    Success,
    Failure,
    Cancelled,
    CancelledDueToFailure,
}

impl JobCompletionStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            JobCompletionStatus::Success => 0,
            _ => 1,
        }
    }
}

/// Which standard stream a line of task output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}
