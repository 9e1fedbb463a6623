// src/dispatcher/ledger.rs

//! Pure in-flight job accounting.
//!
//! Holds the in-flight counter and the shutting-down flag. No IO, no
//! channels: the [`accounting`](super::accounting) actor owns one ledger
//! and is the only thing that mutates it.

/// Result of trying to admit a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { in_flight: usize },
    /// Shutdown has begun; the job must not start.
    Rejected,
}

/// Result of a job leaving the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub in_flight: usize,
    /// `true` exactly once: when the last job leaves during shutdown.
    pub drained: bool,
}

/// Result of requesting shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownProgress {
    /// Nothing in flight; stop immediately.
    Idle,
    /// Wait for the drain signal.
    Draining { in_flight: usize },
}

#[derive(Debug, Default)]
pub struct JobLedger {
    in_flight: usize,
    shutting_down: bool,
    drain_signalled: bool,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub fn try_begin(&mut self) -> Admission {
        if self.shutting_down {
            return Admission::Rejected;
        }
        self.in_flight += 1;
        Admission::Admitted {
            in_flight: self.in_flight,
        }
    }

    pub fn end(&mut self) -> Departure {
        self.in_flight = self.in_flight.saturating_sub(1);
        let drained = self.shutting_down && self.in_flight == 0 && !self.drain_signalled;
        if drained {
            self.drain_signalled = true;
        }
        Departure {
            in_flight: self.in_flight,
            drained,
        }
    }

    pub fn begin_shutdown(&mut self) -> ShutdownProgress {
        self.shutting_down = true;
        if self.in_flight == 0 {
            ShutdownProgress::Idle
        } else {
            ShutdownProgress::Draining {
                in_flight: self.in_flight,
            }
        }
    }
}
