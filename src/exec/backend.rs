// src/exec/backend.rs

//! Pluggable descriptor execution.
//!
//! The graph executor hands every resolved [`TaskDescriptor`] to a
//! [`DescriptorExecutor`]. Production code uses
//! [`ProcessDescriptorExecutor`]; tests swap in a fake that never spawns a
//! process.

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::exec::task_runner::{ProcessInvocation, run_process};
use crate::exec::workspace::Workspace;
use crate::factory::TaskDescriptor;
use crate::types::OutputStream;

/// One line of task output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub line: String,
    pub stream: OutputStream,
}

/// Executes descriptors and reports an exit code.
///
/// Returning `Err` marks the node failed, except for
/// [`OpenGeError::Cancelled`](crate::errors::OpenGeError::Cancelled) which
/// marks it cancelled.
pub trait DescriptorExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        descriptor: TaskDescriptor,
        workspace: &'a Workspace,
        output: mpsc::Sender<OutputLine>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<i32>>;
}

/// Runs descriptors on this machine.
///
/// Remote descriptors run locally as well; no remote worker pool is
/// attached to this executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessDescriptorExecutor;

impl ProcessDescriptorExecutor {
    async fn copy_file(
        from: &std::path::Path,
        to: &std::path::Path,
        output: &mpsc::Sender<OutputLine>,
    ) -> Result<i32> {
        let copied = async {
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating '{}'", parent.display()))?;
            }
            tokio::fs::copy(from, to)
                .await
                .with_context(|| format!("copying '{}' to '{}'", from.display(), to.display()))
        }
        .await;

        match copied {
            Ok(bytes) => {
                debug!(from = %from.display(), to = %to.display(), bytes, "copied file");
                Ok(0)
            }
            Err(e) => {
                warn!(error = %e, "file copy failed");
                let _ = output
                    .send(OutputLine {
                        line: format!("{e:#}"),
                        stream: OutputStream::Stderr,
                    })
                    .await;
                Ok(1)
            }
        }
    }
}

impl DescriptorExecutor for ProcessDescriptorExecutor {
    fn execute<'a>(
        &'a self,
        descriptor: TaskDescriptor,
        workspace: &'a Workspace,
        output: mpsc::Sender<OutputLine>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<i32>> {
        Box::pin(async move {
            match descriptor {
                TaskDescriptor::Copy { from, to } => Self::copy_file(&from, &to, &output).await,
                TaskDescriptor::Local {
                    path,
                    arguments,
                    working_directory,
                    environment,
                } => {
                    let invocation = ProcessInvocation {
                        program: &path,
                        arguments: &arguments,
                        working_directory: workspace.directory_for(&working_directory),
                        environment: &environment,
                    };
                    run_process(invocation, output, cancel).await
                }
                TaskDescriptor::Remote {
                    tool_path,
                    arguments,
                    working_directory,
                    environment,
                    input_files,
                    ..
                } => {
                    debug!(
                        tool = %tool_path.display(),
                        inputs = input_files.len(),
                        "no remote worker attached, running remote descriptor locally"
                    );
                    let invocation = ProcessInvocation {
                        program: &tool_path,
                        arguments: &arguments,
                        working_directory: workspace.directory_for(&working_directory),
                        environment: &environment,
                    };
                    run_process(invocation, output, cancel).await
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use crate::errors::OpenGeError;

    fn drain(mut rx: mpsc::Receiver<OutputLine>) -> Vec<OutputLine> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn copy_descriptor_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("in.txt");
        let to = dir.path().join("out").join("nested").join("in.txt");
        std::fs::write(&from, b"payload").unwrap();

        let workspace = Workspace::new(dir.path());
        let (tx, _rx) = mpsc::channel(8);
        let code = ProcessDescriptorExecutor
            .execute(
                TaskDescriptor::Copy { from, to: to.clone() },
                &workspace,
                tx,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(std::fs::read(&to).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn failed_copy_exits_one_with_a_stderr_line() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let (tx, rx) = mpsc::channel(8);

        let code = ProcessDescriptorExecutor
            .execute(
                TaskDescriptor::Copy {
                    from: dir.path().join("missing.txt"),
                    to: dir.path().join("out.txt"),
                },
                &workspace,
                tx,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(code, 1);
        let lines = drain(rx);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].stream, OutputStream::Stderr);
        assert!(lines[0].line.contains("missing.txt"));
    }

    #[cfg(unix)]
    fn shell(script: &str) -> TaskDescriptor {
        TaskDescriptor::Local {
            path: PathBuf::from("/bin/sh"),
            arguments: vec!["-c".to_string(), script.to_string()],
            working_directory: PathBuf::from("/definitely/not/here"),
            environment: BTreeMap::from([("OPENGE_GREETING".to_string(), "hello".to_string())]),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_process_streams_both_pipes_and_returns_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let (tx, rx) = mpsc::channel(64);

        let code = ProcessDescriptorExecutor
            .execute(
                shell("echo $OPENGE_GREETING; echo oops 1>&2; exit 3"),
                &workspace,
                tx,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(code, 3);
        let lines = drain(rx);
        assert!(lines.contains(&OutputLine {
            line: "hello".to_string(),
            stream: OutputStream::Stdout,
        }));
        assert!(lines.contains(&OutputLine {
            line: "oops".to_string(),
            stream: OutputStream::Stderr,
        }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let (tx, _rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            ProcessDescriptorExecutor.execute(shell("sleep 30"), &workspace, tx, cancel),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(OpenGeError::Cancelled)));
    }

    #[tokio::test]
    async fn spawn_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let (tx, _rx) = mpsc::channel(8);

        let result = ProcessDescriptorExecutor
            .execute(
                TaskDescriptor::Local {
                    path: dir.path().join("no-such-program"),
                    arguments: Vec::new(),
                    working_directory: dir.path().to_path_buf(),
                    environment: BTreeMap::new(),
                },
                &workspace,
                tx,
                CancellationToken::new(),
            )
            .await;

        assert!(result.is_err());
    }
}
