// src/stream.rs

//! Serialised access to a single outbound response stream.
//!
//! Many executing nodes report through one client connection. The
//! underlying sink allows only one writer at a time, so every write goes
//! through [`GuardedResponseStream`], which holds an async mutex for the
//! duration of one message.

use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::errors::{OpenGeError, Result};
use crate::exec::BoxFuture;

/// A single-writer message sink.
pub trait ResponseSink<T>: Send {
    fn send<'a>(&'a mut self, message: T) -> BoxFuture<'a, Result<()>>;
}

impl<T: Send + 'static> ResponseSink<T> for mpsc::Sender<T> {
    fn send<'a>(&'a mut self, message: T) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            mpsc::Sender::send(self, message)
                .await
                .map_err(|_| OpenGeError::StreamClosed)
        })
    }
}

/// Writes each message as one line of JSON.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<T, W> ResponseSink<T> for JsonLinesSink<W>
where
    T: Serialize + Send + 'static,
    W: AsyncWrite + Unpin + Send,
{
    fn send<'a>(&'a mut self, message: T) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut frame = serde_json::to_vec(&message)?;
            frame.push(b'\n');
            self.writer.write_all(&frame).await?;
            self.writer.flush().await?;
            Ok(())
        })
    }
}

/// Cloneable handle that serialises writers onto one sink.
#[derive(Debug)]
pub struct GuardedResponseStream<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for GuardedResponseStream<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> GuardedResponseStream<S> {
    pub fn new(sink: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    /// Write one message.
    ///
    /// The token is checked before contending for the lock, and a
    /// cancellation while waiting for it abandons the write.
    pub async fn write<T>(&self, message: T, cancel: &CancellationToken) -> Result<()>
    where
        S: ResponseSink<T>,
    {
        if cancel.is_cancelled() {
            return Err(OpenGeError::Cancelled);
        }
        let mut sink = tokio::select! {
            guard = self.inner.lock() => guard,
            _ = cancel.cancelled() => return Err(OpenGeError::Cancelled),
        };
        sink.send(message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_fails_before_locking() {
        let (tx, mut rx) = mpsc::channel::<u32>(4);
        let stream = GuardedResponseStream::new(tx);

        // Hold the lock; a write with a live token would block here.
        let _held = stream.inner.lock().await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = stream.write(1u32, &cancel).await.unwrap_err();
        assert!(matches!(err, OpenGeError::Cancelled));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn concurrent_writers_all_land() {
        let (tx, mut rx) = mpsc::channel::<u32>(64);
        let stream = GuardedResponseStream::new(tx);
        let cancel = CancellationToken::new();

        let mut writers = Vec::new();
        for i in 0..32u32 {
            let stream = stream.clone();
            let cancel = cancel.clone();
            writers.push(tokio::spawn(async move { stream.write(i, &cancel).await }));
        }
        for w in writers {
            w.await.unwrap().unwrap();
        }
        drop(stream);

        let mut got = Vec::new();
        while let Some(v) = rx.recv().await {
            got.push(v);
        }
        got.sort();
        assert_eq!(got, (0..32).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn json_lines_are_never_interleaved() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let stream = GuardedResponseStream::new(JsonLinesSink::new(client));
        let cancel = CancellationToken::new();

        let mut writers = Vec::new();
        for i in 0..16 {
            let stream = stream.clone();
            let cancel = cancel.clone();
            writers.push(tokio::spawn(async move {
                stream
                    .write(serde_json::json!({ "n": i, "pad": "x".repeat(200) }), &cancel)
                    .await
            }));
        }
        for w in writers {
            w.await.unwrap().unwrap();
        }
        drop(stream);

        use tokio::io::AsyncBufReadExt;
        let mut lines = tokio::io::BufReader::new(server).lines();
        let mut count = 0;
        while let Some(line) = lines.next_line().await.unwrap() {
            let value: serde_json::Value = serde_json::from_str(&line).unwrap();
            assert!(value["n"].is_number());
            count += 1;
        }
        assert_eq!(count, 16);
    }

    #[tokio::test]
    async fn closed_channel_reports_stream_closed() {
        let (tx, rx) = mpsc::channel::<u32>(1);
        drop(rx);
        let stream = GuardedResponseStream::new(tx);
        let err = stream.write(7u32, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, OpenGeError::StreamClosed));
    }
}
