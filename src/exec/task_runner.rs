// src/exec/task_runner.rs

//! Child process runner for local and remote descriptors.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{OpenGeError, Result};
use crate::exec::backend::OutputLine;
use crate::types::OutputStream;

/// What to launch.
#[derive(Debug, Clone)]
pub struct ProcessInvocation<'a> {
    pub program: &'a Path,
    pub arguments: &'a [String],
    pub working_directory: PathBuf,
    pub environment: &'a BTreeMap<String, String>,
}

/// Run a child process to completion and return its exit code.
///
/// Every stdout/stderr line is forwarded to `output` before this returns.
/// If `cancel` fires first the child is killed and
/// [`OpenGeError::Cancelled`] is returned.
pub async fn run_process(
    invocation: ProcessInvocation<'_>,
    output: mpsc::Sender<OutputLine>,
    cancel: CancellationToken,
) -> Result<i32> {
    let program = invocation.program.display().to_string();
    info!(
        program = %program,
        cwd = %invocation.working_directory.display(),
        "starting task process"
    );

    let mut cmd = Command::new(invocation.program);
    cmd.args(invocation.arguments)
        .envs(invocation.environment)
        .current_dir(&invocation.working_directory)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process '{program}'"))?;

    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(forward_lines(stdout, OutputStream::Stdout, output.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(forward_lines(stderr, OutputStream::Stderr, output.clone()));
    }
    drop(output);

    let code = tokio::select! {
        status = child.wait() => {
            let status = status.with_context(|| format!("waiting for process '{program}'"))?;
            let code = status.code().unwrap_or(-1);
            info!(program = %program, exit_code = code, success = status.success(), "task process exited");
            code
        }
        _ = cancel.cancelled() => {
            info!(program = %program, "cancellation requested; killing process");
            if let Err(e) = child.kill().await {
                warn!(program = %program, error = %e, "failed to kill child process on cancellation");
            }
            for reader in readers {
                reader.abort();
            }
            return Err(OpenGeError::Cancelled);
        }
    };

    // Drain the pipes so all output precedes the caller's completion event.
    for reader in readers {
        if let Err(e) = reader.await {
            debug!(program = %program, error = %e, "output reader ended abnormally");
        }
    }

    Ok(code)
}

fn forward_lines<R>(
    pipe: R,
    stream: OutputStream,
    output: mpsc::Sender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut buf = Vec::new();
        let mut receiver_open = true;
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(?stream, error = %e, "output pipe read failed");
                    break;
                }
            }
            if !receiver_open {
                // Keep draining so the child never blocks on a full pipe.
                continue;
            }
            let line = decode_line(&buf);
            if output.send(OutputLine { line, stream }).await.is_err() {
                receiver_open = false;
            }
        }
    })
}

/// Decode one raw output line. Bytes that are not UTF-8 (e.g. OEM code
/// page compiler output) are replaced rather than ending the stream.
fn decode_line(raw: &[u8]) -> String {
    let trimmed = raw.strip_suffix(b"\n").unwrap_or(raw);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    String::from_utf8_lossy(trimmed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_line_strips_line_endings() {
        assert_eq!(decode_line(b"hello\r\n"), "hello");
        assert_eq!(decode_line(b"hello\n"), "hello");
        assert_eq!(decode_line(b"tail"), "tail");
    }

    #[test]
    fn decode_line_replaces_invalid_utf8() {
        assert_eq!(decode_line(b"caf\xe9\n"), "caf\u{fffd}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_utf8_does_not_stop_output_forwarding() {
        let dir = tempfile::tempdir().unwrap();
        let arguments = vec![
            "-c".to_string(),
            "printf 'caf\\351\\n'; seq 1 20000".to_string(),
        ];
        let environment = BTreeMap::new();
        let invocation = ProcessInvocation {
            program: Path::new("/bin/sh"),
            arguments: &arguments,
            working_directory: dir.path().to_path_buf(),
            environment: &environment,
        };

        let (tx, mut rx) = mpsc::channel(64);
        let collect = tokio::spawn(async move {
            let mut lines = Vec::new();
            while let Some(line) = rx.recv().await {
                lines.push(line);
            }
            lines
        });

        let code = run_process(invocation, tx, CancellationToken::new())
            .await
            .unwrap();
        let lines = collect.await.unwrap();

        assert_eq!(code, 0);
        assert_eq!(lines.len(), 20001);
        assert_eq!(lines[0].line, "caf\u{fffd}");
        assert_eq!(lines[20000].line, "20000");
        assert!(lines.iter().all(|l| l.stream == OutputStream::Stdout));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropped_receiver_does_not_stall_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let arguments = vec!["-c".to_string(), "seq 1 50000".to_string()];
        let environment = BTreeMap::new();
        let invocation = ProcessInvocation {
            program: Path::new("/bin/sh"),
            arguments: &arguments,
            working_directory: dir.path().to_path_buf(),
            environment: &environment,
        };

        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        let code = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            run_process(invocation, tx, CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(code, 0);
    }
}
