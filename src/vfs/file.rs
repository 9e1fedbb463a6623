// src/vfs/file.rs

//! Portable file that issues positional I/O through [`AsyncIoProcessing`].
//!
//! Reads and writes run on the blocking pool and report back via the
//! registry, so callers see the same pending/complete contract a native
//! overlapped handle gives them.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use tracing::debug;

use crate::errors::Result;
use crate::vfs::overlapped::{
    AsyncIoProcessing, CompletionCallback, HandleId, OverlappedToken, status,
};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// An operation that was issued and has not necessarily finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedIo {
    /// Always [`status::IO_PENDING`]; the real status arrives via callback.
    pub status: i32,
    pub token: OverlappedToken,
}

#[derive(Debug)]
pub struct LocalVfsFile {
    handle: HandleId,
    path: PathBuf,
    file: Arc<File>,
    io: Arc<AsyncIoProcessing>,
}

impl LocalVfsFile {
    pub fn open(path: &Path, writable: bool, io: Arc<AsyncIoProcessing>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(writable)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(Self {
            handle: HandleId(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)),
            path: path.to_path_buf(),
            file: Arc::new(file),
            io,
        })
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Read up to `length` bytes at `offset`. A read starting at or past
    /// the end completes with [`status::EOF`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn read_file_async(
        &self,
        offset: u64,
        length: u32,
        request_hint: u64,
        callback: CompletionCallback,
    ) -> IssuedIo {
        let token = self
            .io
            .allocate_overlapped(self.handle, request_hint, callback);
        let file = self.file.clone();
        let io = self.io.clone();
        tokio::task::spawn_blocking(move || {
            let mut buffer = vec![0u8; length as usize];
            let (code, data) = match read_at(&file, &mut buffer, offset) {
                Ok(0) if length > 0 => (status::EOF, Vec::new()),
                Ok(n) => {
                    buffer.truncate(n);
                    (status::S_OK, buffer)
                }
                Err(e) => (io_error_status(&e), Vec::new()),
            };
            let transferred = data.len() as u32;
            io.complete_overlapped(token, code, transferred, data);
        });
        IssuedIo {
            status: status::IO_PENDING,
            token,
        }
    }

    /// Write all of `data` at `offset`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn write_file_async(
        &self,
        offset: u64,
        data: Vec<u8>,
        request_hint: u64,
        callback: CompletionCallback,
    ) -> IssuedIo {
        let token = self
            .io
            .allocate_overlapped(self.handle, request_hint, callback);
        let file = self.file.clone();
        let io = self.io.clone();
        tokio::task::spawn_blocking(move || {
            let (code, transferred) = match write_all_at(&file, &data, offset) {
                Ok(()) => (status::S_OK, data.len() as u32),
                Err(e) => (io_error_status(&e), 0),
            };
            io.complete_overlapped(token, code, transferred, Vec::new());
        });
        IssuedIo {
            status: status::IO_PENDING,
            token,
        }
    }

    /// Abandon an issued operation. Safe to call after it completed.
    pub fn cancel(&self, token: OverlappedToken) -> bool {
        let cancelled = self.io.cancel_overlapped(token);
        if cancelled {
            debug!(handle = ?self.handle, ?token, "cancelled pending io");
        }
        cancelled
    }
}

fn io_error_status(e: &io::Error) -> i32 {
    e.raw_os_error()
        .map(status::from_os_error)
        .unwrap_or(status::E_FAIL)
}

#[cfg(unix)]
fn read_at(file: &File, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buffer, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buffer: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buffer, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, data: &[u8], offset: u64) -> io::Result<()> {
    std::os::unix::fs::FileExt::write_all_at(file, data, offset)
}

#[cfg(windows)]
fn write_all_at(file: &File, mut data: &[u8], mut offset: u64) -> io::Result<()> {
    while !data.is_empty() {
        let n = std::os::windows::fs::FileExt::seek_write(file, data, offset)?;
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        data = &data[n..];
        offset += n as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::overlapped::IoCompletion;
    use tokio::sync::oneshot;

    fn completion_channel() -> (CompletionCallback, oneshot::Receiver<IoCompletion>) {
        let (tx, rx) = oneshot::channel();
        let callback: CompletionCallback = Box::new(move |c| {
            let _ = tx.send(c);
        });
        (callback, rx)
    }

    fn fixture(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn read_completes_with_data_and_hint() {
        let (_dir, path) = fixture(b"hello world");
        let file = LocalVfsFile::open(&path, false, Arc::new(AsyncIoProcessing::new())).unwrap();

        let (callback, rx) = completion_channel();
        let issued = file.read_file_async(6, 5, 99, callback);
        assert_eq!(issued.status, status::IO_PENDING);

        let completion = rx.await.unwrap();
        assert_eq!(completion.request_hint, 99);
        assert_eq!(completion.status, status::S_OK);
        assert_eq!(completion.data, b"world");
        assert_eq!(completion.bytes_transferred, 5);
    }

    #[tokio::test]
    async fn read_past_end_reports_eof() {
        let (_dir, path) = fixture(b"abc");
        let file = LocalVfsFile::open(&path, false, Arc::new(AsyncIoProcessing::new())).unwrap();

        let (callback, rx) = completion_channel();
        file.read_file_async(10, 4, 1, callback);
        let completion = rx.await.unwrap();
        assert_eq!(completion.status, status::EOF);
        assert_eq!(completion.bytes_transferred, 0);
    }

    #[tokio::test]
    async fn write_then_read_back() {
        let (_dir, path) = fixture(b"0000");
        let io = Arc::new(AsyncIoProcessing::new());
        let file = LocalVfsFile::open(&path, true, io.clone()).unwrap();

        let (callback, rx) = completion_channel();
        file.write_file_async(1, b"xy".to_vec(), 5, callback);
        let completion = rx.await.unwrap();
        assert_eq!(completion.status, status::S_OK);
        assert_eq!(completion.bytes_transferred, 2);

        assert_eq!(std::fs::read(&path).unwrap(), b"0xy0");
        assert_eq!(io.pending_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_read_never_calls_back() {
        let (_dir, path) = fixture(b"abc");
        let io = Arc::new(AsyncIoProcessing::new());
        let file = LocalVfsFile::open(&path, false, io.clone()).unwrap();

        let (callback, rx) = completion_channel();
        let issued = file.read_file_async(0, 3, 1, callback);
        let cancelled = file.cancel(issued.token);

        // Either the cancel won (the sender is dropped unfired) or the
        // read had already completed.
        match rx.await {
            Ok(completion) => assert!(!cancelled && completion.status == status::S_OK),
            Err(_) => assert!(cancelled),
        }
        assert!(!file.cancel(issued.token));
    }
}
