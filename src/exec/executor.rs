// src/exec/executor.rs

//! The DAG walker.
//!
//! Every node gets a completion handle (a `watch` channel) before any work
//! is spawned, so dependents can hold "the future result" of nodes that
//! have not started yet. Nodes are then spawned in launch waves and each
//! node's routine:
//!
//! 1. awaits its dependencies' handles; any non-success resolves it to
//!    `NotRun` without doing work,
//! 2. acquires the concurrency gate when one is configured,
//! 3. resolves to `NotRun` if the build has already failed (fail-fast),
//! 4. emits `node_started`, executes its descriptor in a workspace and
//!    emits `node_finished`,
//! 5. publishes its terminal status on its handle.
//!
//! The only cross-node mutable state is the gate and the "build failed"
//! flag. Cancelled nodes do not trip fail-fast.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::errors::{OpenGeError, Result};
use crate::exec::backend::{DescriptorExecutor, OutputLine};
use crate::exec::events::{ExecutionEvents, ExecutionReport, NodeOutcome};
use crate::exec::schedule::launch_waves;
use crate::exec::workspace::WorkspaceProvider;
use crate::graph::{Graph, GraphTask};
use crate::types::BuildResultStatus;

const OUTPUT_BUFFER: usize = 256;

type Handle = watch::Receiver<Option<BuildResultStatus>>;

/// Executes graphs against a descriptor executor and workspace provider.
#[derive(Clone)]
pub struct GraphExecutor {
    executor: Arc<dyn DescriptorExecutor>,
    workspaces: Arc<dyn WorkspaceProvider>,
}

struct NodeContext {
    executor: Arc<dyn DescriptorExecutor>,
    workspaces: Arc<dyn WorkspaceProvider>,
    events: Arc<dyn ExecutionEvents>,
    gate: Option<Arc<Semaphore>>,
    build_failed: AtomicBool,
    cancel: CancellationToken,
}

impl GraphExecutor {
    pub fn new(
        executor: Arc<dyn DescriptorExecutor>,
        workspaces: Arc<dyn WorkspaceProvider>,
    ) -> Self {
        Self {
            executor,
            workspaces,
        }
    }

    /// Walk `graph` to completion.
    ///
    /// `concurrency_limit` bounds how many nodes run at once, unless the
    /// workspace provider supports concurrent writes. Returns `Err` only
    /// when the graph cannot be scheduled; node failures are reported in
    /// the [`ExecutionReport`].
    pub async fn execute(
        &self,
        graph: &Graph,
        concurrency_limit: Option<usize>,
        events: Arc<dyn ExecutionEvents>,
        cancel: CancellationToken,
    ) -> Result<ExecutionReport> {
        let started = Instant::now();
        let waves = launch_waves(graph)?;

        let gate = match concurrency_limit {
            Some(limit) if !self.workspaces.supports_concurrent_writes() => {
                debug!(limit, "concurrency gate enabled");
                Some(Arc::new(Semaphore::new(limit.max(1))))
            }
            _ => None,
        };

        let ctx = Arc::new(NodeContext {
            executor: Arc::clone(&self.executor),
            workspaces: Arc::clone(&self.workspaces),
            events,
            gate,
            build_failed: AtomicBool::new(false),
            cancel,
        });

        // All handles exist before anything is spawned.
        let mut senders = BTreeMap::new();
        let mut handles: BTreeMap<&str, Handle> = BTreeMap::new();
        for (key, _) in graph.tasks() {
            let (tx, rx) = watch::channel(None);
            senders.insert(key, tx);
            handles.insert(key, rx);
        }

        let mut running = JoinSet::new();
        for wave in waves {
            for key in wave {
                let Some(task) = graph.task(&key) else {
                    continue;
                };
                let deps: Vec<(String, Handle)> = graph
                    .dependencies_of(&key)
                    .iter()
                    .filter_map(|d| handles.get(d.as_str()).map(|h| (d.clone(), h.clone())))
                    .collect();
                let Some(tx) = senders.remove(key.as_str()) else {
                    continue;
                };
                trace!(task = %key, deps = deps.len(), "spawning node");
                running.spawn(run_node(Arc::clone(&ctx), Arc::clone(task), deps, tx));
            }
        }

        let mut statuses = BTreeMap::new();
        while let Some(joined) = running.join_next().await {
            match joined {
                Ok((key, status)) => {
                    statuses.insert(key, status);
                }
                Err(e) => error!(error = %e, "node routine aborted"),
            }
        }

        // A panicked node never reported; count it as failed.
        for (key, _) in graph.tasks() {
            statuses
                .entry(key.to_string())
                .or_insert(BuildResultStatus::Failed);
        }

        let report = ExecutionReport {
            statuses,
            elapsed: started.elapsed(),
        };
        info!(
            nodes = report.statuses.len(),
            success = report.is_success(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "graph execution finished"
        );
        Ok(report)
    }
}

async fn run_node(
    ctx: Arc<NodeContext>,
    task: Arc<GraphTask>,
    deps: Vec<(String, Handle)>,
    handle: watch::Sender<Option<BuildResultStatus>>,
) -> (String, BuildResultStatus) {
    let key = task.key();
    let status = node_body(&ctx, &task, deps).await;
    handle.send_replace(Some(status));
    (key, status)
}

async fn node_body(
    ctx: &NodeContext,
    task: &GraphTask,
    deps: Vec<(String, Handle)>,
) -> BuildResultStatus {
    let key = task.key();

    for (dep, mut rx) in deps {
        // The watch guard must not outlive the select; the node future is spawned.
        let resolved = tokio::select! {
            biased;
            r = async { rx.wait_for(|s| s.is_some()).await.ok().and_then(|s| *s) } => Some(r),
            _ = ctx.cancel.cancelled() => None,
        };
        let Some(resolved) = resolved else {
            return finish_skipped(ctx, task, BuildResultStatus::Cancelled).await;
        };
        if resolved != Some(BuildResultStatus::Success) {
            debug!(task = %key, dependency = %dep, status = ?resolved, "dependency did not succeed; skipping");
            return finish_skipped(ctx, task, BuildResultStatus::NotRun).await;
        }
    }

    if ctx.cancel.is_cancelled() {
        return finish_skipped(ctx, task, BuildResultStatus::Cancelled).await;
    }

    let _permit = match &ctx.gate {
        Some(gate) => {
            let acquired = tokio::select! {
                p = Arc::clone(gate).acquire_owned() => p.ok(),
                _ = ctx.cancel.cancelled() => None,
            };
            match acquired {
                Some(permit) => Some(permit),
                None => return finish_skipped(ctx, task, BuildResultStatus::Cancelled).await,
            }
        }
        None => None,
    };

    if ctx.build_failed.load(Ordering::SeqCst) {
        debug!(task = %key, "build already failed; not starting");
        return finish_skipped(ctx, task, BuildResultStatus::NotRun).await;
    }
    if ctx.cancel.is_cancelled() {
        return finish_skipped(ctx, task, BuildResultStatus::Cancelled).await;
    }

    let started = Instant::now();
    if let Err(e) = ctx.events.node_started(task).await {
        warn!(task = %key, error = %e, "failed to report node start");
    }

    let (status, exit_code) = match execute_descriptor(ctx, task).await {
        Ok(0) => (BuildResultStatus::Success, 0),
        Ok(code) => (BuildResultStatus::Failed, code),
        Err(OpenGeError::Cancelled) => (BuildResultStatus::Cancelled, -1),
        Err(e) => {
            error!(task = %key, error = %e, "node execution error");
            (BuildResultStatus::Failed, -1)
        }
    };

    if status == BuildResultStatus::Failed {
        ctx.build_failed.store(true, Ordering::SeqCst);
    }

    let outcome = NodeOutcome {
        status,
        exit_code,
        elapsed: started.elapsed(),
    };
    info!(task = %key, status = %status, exit_code, "node finished");
    if let Err(e) = ctx.events.node_finished(task, outcome).await {
        warn!(task = %key, error = %e, "failed to report node completion");
    }

    // The gate permit is released here, after the finish event.
    status
}

async fn execute_descriptor(ctx: &NodeContext, task: &GraphTask) -> Result<i32> {
    let descriptor = task.create_descriptor()?;
    let workspace = ctx.workspaces.acquire(&task.spec).await?;
    trace!(task = %task.key(), kind = descriptor.kind(), "executing descriptor");

    let (tx, mut rx) = mpsc::channel::<OutputLine>(OUTPUT_BUFFER);
    let run = ctx
        .executor
        .execute(descriptor, &workspace, tx, ctx.cancel.child_token());
    let forward = async {
        while let Some(OutputLine { line, stream }) = rx.recv().await {
            if let Err(e) = ctx.events.node_output(task, line, stream).await {
                trace!(task = %task.key(), error = %e, "dropping node output");
            }
        }
    };

    let (code, ()) = tokio::join!(run, forward);
    code
}

async fn finish_skipped(
    ctx: &NodeContext,
    task: &GraphTask,
    status: BuildResultStatus,
) -> BuildResultStatus {
    debug!(task = %task.key(), status = %status, "node resolved without running");
    if let Err(e) = ctx
        .events
        .node_finished(task, NodeOutcome::skipped(status))
        .await
    {
        warn!(task = %task.key(), error = %e, "failed to report node completion");
    }
    status
}
