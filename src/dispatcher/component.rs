// src/dispatcher/component.rs

//! The long-lived dispatcher.
//!
//! Lifecycle: `NotStarted -> Running -> ShuttingDown -> Stopped`.
//!
//! Shutdown is graceful: new submissions are dropped silently, in-flight
//! jobs are drained, and only then is the endpoint closed.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DispatcherConfig;
use crate::dispatcher::accounting::JobAccounting;
use crate::dispatcher::job::{JobCancellation, JobContext, run_job};
use crate::dispatcher::protocol::{JobResponse, SubmitJobRequest};
use crate::dispatcher::server::{self, ServerHandle};
use crate::errors::{OpenGeError, Result};
use crate::exec::{FolderWorkspaceProvider, GraphExecutor, ProcessDescriptorExecutor};
use crate::graph::GraphGenerator;
use crate::stream::{GuardedResponseStream, ResponseSink};
use crate::types::JobCompletionStatus;

const RESPONSE_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Running,
    ShuttingDown,
    Stopped,
}

struct State {
    lifecycle: LifecycleState,
    accounting: Option<JobAccounting>,
    shutdown: CancellationToken,
    server: Option<ServerHandle>,
    pipe_name: Option<String>,
}

struct Inner {
    config: DispatcherConfig,
    ctx: Arc<JobContext>,
    state: Mutex<State>,
}

/// Cloneable handle to one dispatcher instance.
#[derive(Clone)]
pub struct DispatcherComponent {
    inner: Arc<Inner>,
}

impl DispatcherComponent {
    /// Dispatcher with the production executor and a folder workspace
    /// taken from `config`.
    pub fn new(config: DispatcherConfig) -> Self {
        let workspaces = Arc::new(FolderWorkspaceProvider::new(
            config.workspace.root.clone(),
            config.workspace.concurrent_writes,
        ));
        let executor = GraphExecutor::new(Arc::new(ProcessDescriptorExecutor), workspaces);
        Self::with_parts(config, GraphGenerator::default(), executor)
    }

    pub fn with_parts(
        config: DispatcherConfig,
        generator: GraphGenerator,
        executor: GraphExecutor,
    ) -> Self {
        let ctx = Arc::new(JobContext {
            generator,
            executor,
            concurrency_limit: config.dispatcher.concurrency_limit,
        });
        Self {
            inner: Arc::new(Inner {
                config,
                ctx,
                state: Mutex::new(State {
                    lifecycle: LifecycleState::NotStarted,
                    accounting: None,
                    shutdown: CancellationToken::new(),
                    server: None,
                    pipe_name: None,
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another thread panicked mid-update of
        // plain data; the data itself is still usable.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.state().lifecycle
    }

    /// Name of the bound endpoint, once started.
    pub fn pipe_name(&self) -> Option<String> {
        self.state().pipe_name.clone()
    }

    /// Start accepting jobs and bind the local endpoint.
    ///
    /// Fails with [`OpenGeError::AlreadyStarted`] on a second call.
    /// Cancelling `shutdown` cancels every job started afterwards.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<String> {
        {
            let mut state = self.state();
            if state.lifecycle != LifecycleState::NotStarted {
                return Err(OpenGeError::AlreadyStarted);
            }
            state.lifecycle = LifecycleState::Running;
            state.accounting = Some(JobAccounting::spawn());
            state.shutdown = shutdown.clone();
        }

        let pipe_name = self.inner.config.effective_pipe_name();
        let handle = match server::bind(self.clone(), &pipe_name, shutdown) {
            Ok(handle) => handle,
            Err(e) => {
                self.state().lifecycle = LifecycleState::Stopped;
                return Err(e);
            }
        };
        info!(pipe = %pipe_name, endpoint = %handle.endpoint(), "dispatcher listening");

        let mut state = self.state();
        state.server = Some(handle);
        state.pipe_name = Some(pipe_name.clone());
        Ok(pipe_name)
    }

    /// A fresh job cancellation linked to the dispatcher's shutdown token.
    pub fn new_job_cancellation(&self) -> JobCancellation {
        JobCancellation::new(self.state().shutdown.child_token())
    }

    /// Submit a job and receive its events on a channel.
    ///
    /// During shutdown the job is dropped: the returned channel closes
    /// without yielding any event.
    pub async fn submit(&self, request: SubmitJobRequest) -> Result<mpsc::Receiver<JobResponse>> {
        let (tx, rx) = mpsc::channel(RESPONSE_BUFFER);
        let cancellation = self.new_job_cancellation();
        self.submit_job(request, tx, cancellation).await?;
        Ok(rx)
    }

    /// Submit a job writing its events to `sink`.
    ///
    /// Returns `None` when the dispatcher is shutting down and the job was
    /// dropped, otherwise a handle resolving to the job's final status.
    pub async fn submit_job<S>(
        &self,
        request: SubmitJobRequest,
        sink: S,
        cancellation: JobCancellation,
    ) -> Result<Option<JoinHandle<JobCompletionStatus>>>
    where
        S: ResponseSink<JobResponse> + 'static,
    {
        let accounting = {
            let state = self.state();
            match state.lifecycle {
                LifecycleState::Running | LifecycleState::ShuttingDown => state.accounting.clone(),
                _ => None,
            }
        }
        .ok_or(OpenGeError::NotStarted)?;

        // Counted before anything is spawned.
        let Some(inflight) = accounting.try_begin().await else {
            debug!("dispatcher shutting down; submission dropped");
            return Ok(None);
        };

        let stream = GuardedResponseStream::new(sink);
        let supervisor_stream = stream.clone();
        let ctx = Arc::clone(&self.inner.ctx);

        // The supervisor owns the in-flight guard so the departure is
        // recorded only after a terminal event, even if the job panics.
        let handle = tokio::spawn(async move {
            let _inflight = inflight;
            let job = tokio::spawn(run_job(ctx, request, stream, cancellation));
            match job.await {
                Ok(status) => status,
                Err(e) => {
                    error!(error = %e, "job task aborted");
                    let complete = JobResponse::JobComplete {
                        status: JobCompletionStatus::Failure,
                        exit_code: JobCompletionStatus::Failure.exit_code(),
                        total_seconds: 0.0,
                        message: Some(format!("internal error: {e}")),
                    };
                    let _ = supervisor_stream
                        .write(complete, &CancellationToken::new())
                        .await;
                    JobCompletionStatus::Failure
                }
            }
        });

        Ok(Some(handle))
    }

    pub async fn in_flight(&self) -> usize {
        let accounting = self.state().accounting.clone();
        match accounting {
            Some(a) => a.in_flight().await,
            None => 0,
        }
    }

    /// Graceful shutdown: refuse new jobs, wait for in-flight jobs, then
    /// close the endpoint. Not abortable once requested.
    pub async fn stop(&self) -> Result<()> {
        let accounting = {
            let mut state = self.state();
            match state.lifecycle {
                LifecycleState::NotStarted => return Err(OpenGeError::NotStarted),
                LifecycleState::Stopped => return Ok(()),
                LifecycleState::Running | LifecycleState::ShuttingDown => {
                    state.lifecycle = LifecycleState::ShuttingDown;
                    state.accounting.clone()
                }
            }
        };

        info!("dispatcher shutting down; draining in-flight jobs");
        if let Some(accounting) = accounting {
            accounting.shutdown_and_drain().await;
        }

        let server = {
            let mut state = self.state();
            state.lifecycle = LifecycleState::Stopped;
            state.server.take()
        };
        if let Some(server) = server {
            server.stop().await;
        }
        info!("dispatcher stopped");
        Ok(())
    }
}

impl std::fmt::Debug for DispatcherComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherComponent")
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}
