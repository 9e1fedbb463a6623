// src/dispatcher/accounting.rs

//! Actor that serialises all ledger operations.
//!
//! Admission, departure and shutdown are messages to a single task that
//! owns the [`JobLedger`]. Admitted jobs hold an [`InflightJob`] guard
//! whose `Drop` sends the departure, so every exit path (success, error,
//! cancellation, panic unwinding) is counted.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::dispatcher::ledger::{Admission, JobLedger, ShutdownProgress};

enum LedgerCommand {
    Begin {
        reply: oneshot::Sender<bool>,
    },
    End,
    Shutdown {
        reply: oneshot::Sender<oneshot::Receiver<()>>,
    },
    InFlight {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to the accounting actor.
#[derive(Debug, Clone)]
pub struct JobAccounting {
    tx: mpsc::UnboundedSender<LedgerCommand>,
}

impl std::fmt::Debug for LedgerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LedgerCommand::Begin { .. } => "Begin",
            LedgerCommand::End => "End",
            LedgerCommand::Shutdown { .. } => "Shutdown",
            LedgerCommand::InFlight { .. } => "InFlight",
        };
        f.write_str(name)
    }
}

/// Held by an admitted job; dropping it ends the job.
#[derive(Debug)]
pub struct InflightJob {
    tx: mpsc::UnboundedSender<LedgerCommand>,
}

impl Drop for InflightJob {
    fn drop(&mut self) {
        if self.tx.send(LedgerCommand::End).is_err() {
            warn!("job accounting actor is gone; departure not recorded");
        }
    }
}

impl JobAccounting {
    /// Spawn the actor on the current runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_ledger(rx));
        Self { tx }
    }

    /// Admit a job, or `None` once shutdown has begun.
    pub async fn try_begin(&self) -> Option<InflightJob> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(LedgerCommand::Begin { reply }).ok()?;
        match rx.await {
            Ok(true) => Some(InflightJob {
                tx: self.tx.clone(),
            }),
            _ => None,
        }
    }

    /// Mark shutting-down and wait until no job is in flight.
    pub async fn shutdown_and_drain(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(LedgerCommand::Shutdown { reply }).is_err() {
            return;
        }
        let Ok(drained) = rx.await else {
            return;
        };
        // A closed sender means the actor stopped, which also means nothing
        // is left to wait for.
        let _ = drained.await;
    }

    pub async fn in_flight(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(LedgerCommand::InFlight { reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

async fn run_ledger(mut rx: mpsc::UnboundedReceiver<LedgerCommand>) {
    let mut ledger = JobLedger::new();
    let mut drain_waiters: Vec<oneshot::Sender<()>> = Vec::new();

    while let Some(cmd) = rx.recv().await {
        trace!(?cmd, in_flight = ledger.in_flight(), "ledger command");
        match cmd {
            LedgerCommand::Begin { reply } => {
                let admitted = match ledger.try_begin() {
                    Admission::Admitted { in_flight } => {
                        debug!(in_flight, "job admitted");
                        true
                    }
                    Admission::Rejected => {
                        debug!("shutting down; job dropped");
                        false
                    }
                };
                if reply.send(admitted).is_err() && admitted {
                    // The submitter went away before getting its guard.
                    ledger.end();
                }
            }
            LedgerCommand::End => {
                let departure = ledger.end();
                debug!(in_flight = departure.in_flight, "job finished");
                if departure.drained {
                    debug!("all in-flight jobs drained");
                    for waiter in drain_waiters.drain(..) {
                        let _ = waiter.send(());
                    }
                }
            }
            LedgerCommand::Shutdown { reply } => {
                let (done_tx, done_rx) = oneshot::channel();
                match ledger.begin_shutdown() {
                    ShutdownProgress::Idle => {
                        let _ = done_tx.send(());
                    }
                    ShutdownProgress::Draining { in_flight } => {
                        debug!(in_flight, "waiting for in-flight jobs to drain");
                        drain_waiters.push(done_tx);
                    }
                }
                let _ = reply.send(done_rx);
            }
            LedgerCommand::InFlight { reply } => {
                let _ = reply.send(ledger.in_flight());
            }
        }
    }
}
