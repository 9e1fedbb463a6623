// src/dispatcher/client.rs

//! Client side of the dispatcher endpoint.

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dispatcher::protocol::{
    ClientRequest, JobResponse, SubmitJobRequest, decode_frame, encode_frame,
};
use crate::dispatcher::server::endpoint_path;
use crate::errors::{OpenGeError, Result};

const RESPONSE_BUFFER: usize = 256;

/// Submit a job to the dispatcher listening on `pipe_name`.
///
/// Responses arrive on the returned channel, which closes after
/// `JobComplete` (or when the server drops the connection). Dropping the
/// receiver disconnects, which cancels the job server-side.
pub async fn submit_job(
    pipe_name: &str,
    request: SubmitJobRequest,
) -> Result<mpsc::Receiver<JobResponse>> {
    let (reader, writer) = platform::connect(pipe_name).await?;
    submit_over(reader, writer, request).await
}

/// Check that a dispatcher answers on `pipe_name`.
pub async fn ping(pipe_name: &str) -> Result<()> {
    let (reader, mut writer) = platform::connect(pipe_name).await?;
    writer.write_all(&encode_frame(&ClientRequest::Ping)?).await?;
    writer.flush().await?;

    let mut lines = BufReader::new(reader).lines();
    match lines.next_line().await? {
        Some(line) => match decode_frame::<JobResponse>(&line)? {
            JobResponse::Pong => Ok(()),
            other => Err(OpenGeError::Other(anyhow::anyhow!(
                "unexpected ping response: {other:?}"
            ))),
        },
        None => Err(OpenGeError::StreamClosed),
    }
}

/// Send a submission over an already connected transport.
pub async fn submit_over<R, W>(
    reader: R,
    mut writer: W,
    request: SubmitJobRequest,
) -> Result<mpsc::Receiver<JobResponse>>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let frame = encode_frame(&ClientRequest::SubmitJob(request))?;
    writer.write_all(&frame).await?;
    writer.flush().await?;

    let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
    tokio::spawn(async move {
        // The write half stays open until the job completes; closing it
        // would be read as a disconnect.
        let _writer = writer;
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "reading dispatcher response failed");
                    break;
                }
            };
            let response = match decode_frame::<JobResponse>(&line) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "undecodable dispatcher response");
                    continue;
                }
            };
            let terminal = response.is_terminal();
            if tx.send(response).await.is_err() {
                debug!("response receiver dropped; disconnecting");
                break;
            }
            if terminal {
                break;
            }
        }
    });

    Ok(rx)
}

#[cfg(unix)]
mod platform {
    use super::*;
    use tokio::net::UnixStream;
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};

    pub(super) async fn connect(pipe_name: &str) -> Result<(OwnedReadHalf, OwnedWriteHalf)> {
        let path = endpoint_path(pipe_name);
        let stream = UnixStream::connect(&path)
            .await
            .with_context(|| format!("connecting to dispatcher at '{}'", path.display()))?;
        Ok(stream.into_split())
    }
}

#[cfg(windows)]
mod platform {
    use super::*;
    use tokio::io::{ReadHalf, WriteHalf};
    use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient};

    pub(super) async fn connect(
        pipe_name: &str,
    ) -> Result<(ReadHalf<NamedPipeClient>, WriteHalf<NamedPipeClient>)> {
        let path = endpoint_path(pipe_name);
        let client = ClientOptions::new()
            .open(&path)
            .with_context(|| format!("connecting to dispatcher at '{}'", path.display()))?;
        Ok(tokio::io::split(client))
    }
}
