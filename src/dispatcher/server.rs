// src/dispatcher/server.rs

//! Local endpoint: a Unix domain socket, or a named pipe on Windows.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::component::DispatcherComponent;
use crate::dispatcher::protocol::{ClientRequest, JobResponse, decode_frame};
use crate::errors::Result;
use crate::stream::{JsonLinesSink, ResponseSink};
use crate::types::CancelReason;

/// Filesystem path (Unix) or pipe path (Windows) for `pipe_name`.
pub fn endpoint_path(pipe_name: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(format!(r"\\.\pipe\{pipe_name}"))
    } else {
        std::env::temp_dir().join(format!("{pipe_name}.sock"))
    }
}

/// Running accept loop.
pub(crate) struct ServerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    endpoint: PathBuf,
}

impl ServerHandle {
    pub fn endpoint(&self) -> String {
        self.endpoint.display().to_string()
    }

    /// Stop accepting connections. Connections already accepted keep
    /// running until their job completes.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
        remove_socket_file(&self.endpoint);
        info!(endpoint = %self.endpoint.display(), "endpoint closed");
    }
}

#[cfg(unix)]
fn remove_socket_file(endpoint: &std::path::Path) {
    if let Err(e) = std::fs::remove_file(endpoint) {
        debug!(error = %e, "could not remove socket file");
    }
}

#[cfg(not(unix))]
fn remove_socket_file(_endpoint: &std::path::Path) {}

pub(crate) fn bind(
    dispatcher: DispatcherComponent,
    pipe_name: &str,
    shutdown: CancellationToken,
) -> Result<ServerHandle> {
    let endpoint = endpoint_path(pipe_name);
    let token = CancellationToken::new();
    let task = platform::spawn_accept_loop(dispatcher, endpoint.clone(), token.clone(), shutdown)?;
    Ok(ServerHandle {
        token,
        task,
        endpoint,
    })
}

/// Handle one client connection: read a request frame, answer it.
///
/// For a job submission, EOF on the read half afterwards means the client
/// went away and cancels the job.
pub async fn serve_connection<R, W>(
    dispatcher: DispatcherComponent,
    reader: R,
    writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    let Some(line) = lines.next_line().await? else {
        debug!("client closed before sending a request");
        return Ok(());
    };

    let mut sink = JsonLinesSink::new(writer);
    match decode_frame::<ClientRequest>(&line)? {
        ClientRequest::Ping => sink.send(JobResponse::Pong).await,
        ClientRequest::SubmitJob(request) => {
            let cancellation = dispatcher.new_job_cancellation();

            let watcher_cancellation = cancellation.clone();
            let watcher = tokio::spawn(async move {
                while let Ok(Some(_)) = lines.next_line().await {}
                if !watcher_cancellation.token().is_cancelled() {
                    debug!("client disconnected; cancelling job");
                    watcher_cancellation.cancel(CancelReason::Requested);
                }
            });

            let submitted = dispatcher.submit_job(request, sink, cancellation).await;
            let outcome = match submitted {
                Ok(Some(job)) => {
                    if let Err(e) = job.await {
                        warn!(error = %e, "job supervisor ended abnormally");
                    }
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(e),
            };
            watcher.abort();
            outcome
        }
    }
}

fn spawn_connection<R, W>(dispatcher: DispatcherComponent, reader: R, writer: W)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = serve_connection(dispatcher, reader, writer).await {
            warn!(error = %e, "connection ended with an error");
        }
    });
}

#[cfg(unix)]
mod platform {
    use std::path::PathBuf;

    use tokio::net::UnixListener;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;
    use tracing::{debug, warn};

    use super::spawn_connection;
    use crate::dispatcher::component::DispatcherComponent;
    use crate::errors::Result;

    pub(super) fn spawn_accept_loop(
        dispatcher: DispatcherComponent,
        endpoint: PathBuf,
        token: CancellationToken,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        if endpoint.exists() {
            // Stale socket from a previous run.
            std::fs::remove_file(&endpoint)?;
        }
        let listener = UnixListener::bind(&endpoint)?;

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            debug!("accepted connection");
                            let (reader, writer) = stream.into_split();
                            spawn_connection(dispatcher.clone(), reader, writer);
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    },
                }
            }
        }))
    }
}

#[cfg(windows)]
mod platform {
    use std::path::PathBuf;

    use tokio::net::windows::named_pipe::ServerOptions;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;
    use tracing::{debug, warn};

    use super::spawn_connection;
    use crate::dispatcher::component::DispatcherComponent;
    use crate::errors::Result;

    pub(super) fn spawn_accept_loop(
        dispatcher: DispatcherComponent,
        endpoint: PathBuf,
        token: CancellationToken,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>> {
        let mut server = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&endpoint)?;

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = shutdown.cancelled() => break,
                    connected = server.connect() => {
                        if let Err(e) = connected {
                            warn!(error = %e, "pipe connect failed");
                            continue;
                        }
                        let next = match ServerOptions::new().create(&endpoint) {
                            Ok(next) => next,
                            Err(e) => {
                                warn!(error = %e, "could not create next pipe instance");
                                break;
                            }
                        };
                        let client = std::mem::replace(&mut server, next);
                        debug!("accepted connection");
                        let (reader, writer) = tokio::io::split(client);
                        spawn_connection(dispatcher.clone(), reader, writer);
                    }
                }
            }
        }))
    }
}
