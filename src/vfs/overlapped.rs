// src/vfs/overlapped.rs

//! Registry for overlapped (completion-callback) I/O.
//!
//! An operation is allocated before it is issued and yields a token. Later,
//! on whatever thread finishes the I/O, [`AsyncIoProcessing::complete_overlapped`]
//! fires the callback with the caller's request hint. Exactly one of
//! completion and cancellation claims a given token; the loser is a no-op.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::trace;

/// HRESULT-style status codes passed to completion callbacks.
pub mod status {
    pub const S_OK: i32 = 0;
    pub const IO_PENDING: i32 = 0x8007_03E5_u32 as i32;
    pub const EOF: i32 = 0x8007_0026_u32 as i32;
    pub const OPERATION_ABORTED: i32 = 0x8007_03E3_u32 as i32;
    pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;

    /// Wrap a raw OS error code the way `HRESULT_FROM_WIN32` does.
    pub fn from_os_error(code: i32) -> i32 {
        if code <= 0 {
            code
        } else {
            ((code as u32 & 0xFFFF) | 0x8007_0000) as i32
        }
    }
}

/// Identifies the file a request was issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(pub u64);

/// Opaque token for one outstanding operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlappedToken(u64);

/// What a completion callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoCompletion {
    pub request_hint: u64,
    pub status: i32,
    pub bytes_transferred: u32,
    /// Bytes read; empty for writes.
    pub data: Vec<u8>,
}

pub type CompletionCallback = Box<dyn FnOnce(IoCompletion) + Send>;

struct PendingOperation {
    handle: HandleId,
    request_hint: u64,
    callback: CompletionCallback,
}

#[derive(Default)]
pub struct AsyncIoProcessing {
    next_token: AtomicU64,
    pending: Mutex<HashMap<OverlappedToken, PendingOperation>>,
}

impl fmt::Debug for AsyncIoProcessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncIoProcessing")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl AsyncIoProcessing {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<OverlappedToken, PendingOperation>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn allocate_overlapped(
        &self,
        handle: HandleId,
        request_hint: u64,
        callback: CompletionCallback,
    ) -> OverlappedToken {
        let token = OverlappedToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(
            token,
            PendingOperation {
                handle,
                request_hint,
                callback,
            },
        );
        trace!(?token, ?handle, request_hint, "overlapped allocated");
        token
    }

    /// Release `token` without firing its callback. Returns `false` if it
    /// had already completed or been cancelled.
    pub fn cancel_overlapped(&self, token: OverlappedToken) -> bool {
        let removed = self.lock().remove(&token);
        match removed {
            Some(op) => {
                trace!(?token, handle = ?op.handle, "overlapped cancelled");
                true
            }
            None => false,
        }
    }

    /// Fire the callback for `token`. The request hint is filled in from
    /// the allocation. Returns `false` if the token was already claimed.
    pub fn complete_overlapped(
        &self,
        token: OverlappedToken,
        status: i32,
        bytes_transferred: u32,
        data: Vec<u8>,
    ) -> bool {
        // The callback runs outside the lock; it may issue further I/O.
        let Some(op) = self.lock().remove(&token) else {
            trace!(?token, "completion for released overlapped ignored");
            return false;
        };
        (op.callback)(IoCompletion {
            request_hint: op.request_hint,
            status,
            bytes_transferred,
            data,
        });
        true
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback(fired: &Arc<AtomicUsize>) -> CompletionCallback {
        let fired = fired.clone();
        Box::new(move |c: IoCompletion| {
            assert_eq!(c.request_hint, 42);
            fired.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn completion_fires_once_with_hint() {
        let io = AsyncIoProcessing::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let token = io.allocate_overlapped(HandleId(1), 42, counting_callback(&fired));

        assert!(io.complete_overlapped(token, status::S_OK, 3, vec![1, 2, 3]));
        assert!(!io.complete_overlapped(token, status::S_OK, 3, Vec::new()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(io.pending_count(), 0);
    }

    #[test]
    fn cancel_is_idempotent_and_suppresses_completion() {
        let io = AsyncIoProcessing::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let token = io.allocate_overlapped(HandleId(1), 42, counting_callback(&fired));

        assert!(io.cancel_overlapped(token));
        assert!(!io.cancel_overlapped(token));
        assert!(!io.complete_overlapped(token, status::S_OK, 0, Vec::new()));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_after_completion_is_harmless() {
        let io = AsyncIoProcessing::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let token = io.allocate_overlapped(HandleId(7), 42, counting_callback(&fired));
        io.complete_overlapped(token, status::EOF, 0, Vec::new());
        assert!(!io.cancel_overlapped(token));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn os_errors_map_to_win32_facility() {
        assert_eq!(status::from_os_error(0x3E3), status::OPERATION_ABORTED);
        assert_eq!(status::from_os_error(0), 0);
    }

    #[test]
    fn racing_completion_and_cancel_claim_exactly_once() {
        for _ in 0..64 {
            let io = Arc::new(AsyncIoProcessing::new());
            let fired = Arc::new(AtomicUsize::new(0));
            let token = io.allocate_overlapped(HandleId(1), 42, counting_callback(&fired));

            let completer = {
                let io = io.clone();
                std::thread::spawn(move || io.complete_overlapped(token, status::S_OK, 0, Vec::new()))
            };
            let cancelled = io.cancel_overlapped(token);
            let completed = completer.join().unwrap();

            assert!(cancelled ^ completed);
            assert_eq!(fired.load(Ordering::SeqCst), usize::from(completed));
        }
    }
}
