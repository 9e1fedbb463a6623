use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use openge::errors::{OpenGeError, Result};
use openge::exec::{BoxFuture, DescriptorExecutor, OutputLine, Workspace, WorkspaceProvider};
use openge::factory::TaskDescriptor;
use openge::graph::GraphTaskSpec;
use openge::types::OutputStream;

/// How the fake reacts to one task.
#[derive(Debug, Clone, Default)]
pub struct FakeBehaviour {
    pub exit_code: i32,
    pub delay: Duration,
    pub output: Vec<String>,
    /// Return `Err` instead of an exit code.
    pub error: bool,
}

impl FakeBehaviour {
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

/// One execution observed by the fake.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub task: String,
    pub started: Instant,
    pub finished: Instant,
    pub cancelled: bool,
}

/// Descriptor executor that never spawns a process.
///
/// Tasks are identified by the descriptor's executable path (see
/// [`crate::builders::JobBuilder`]). Unknown tasks succeed after the
/// default delay.
#[derive(Debug, Default)]
pub struct FakeDescriptorExecutor {
    behaviours: Mutex<HashMap<String, FakeBehaviour>>,
    default_delay: Duration,
    records: Mutex<Vec<ExecutionRecord>>,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeDescriptorExecutor {
    pub fn new(default_delay: Duration) -> Self {
        Self {
            default_delay,
            ..Self::default()
        }
    }

    pub fn with(self, task: &str, behaviour: FakeBehaviour) -> Self {
        self.behaviours
            .lock()
            .unwrap()
            .insert(task.to_string(), behaviour);
        self
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Names of every task that was executed, in start order.
    pub fn executed(&self) -> Vec<String> {
        let mut records = self.records();
        records.sort_by_key(|r| r.started);
        records.into_iter().map(|r| r.task).collect()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    fn behaviour_for(&self, task: &str) -> FakeBehaviour {
        self.behaviours
            .lock()
            .unwrap()
            .get(task)
            .cloned()
            .unwrap_or_else(|| FakeBehaviour::delayed(self.default_delay))
    }
}

fn task_name(descriptor: &TaskDescriptor) -> String {
    match descriptor {
        TaskDescriptor::Copy { to, .. } => to.display().to_string(),
        TaskDescriptor::Local { path, .. } => path.display().to_string(),
        TaskDescriptor::Remote { tool_path, .. } => tool_path.display().to_string(),
    }
}

impl DescriptorExecutor for FakeDescriptorExecutor {
    fn execute<'a>(
        &'a self,
        descriptor: TaskDescriptor,
        _workspace: &'a Workspace,
        output: mpsc::Sender<OutputLine>,
        cancel: CancellationToken,
    ) -> BoxFuture<'a, Result<i32>> {
        Box::pin(async move {
            let task = task_name(&descriptor);
            let behaviour = self.behaviour_for(&task);
            let started = Instant::now();

            let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now_running, Ordering::SeqCst);

            for line in &behaviour.output {
                let _ = output
                    .send(OutputLine {
                        line: line.clone(),
                        stream: OutputStream::Stdout,
                    })
                    .await;
            }

            let cancelled = tokio::select! {
                _ = tokio::time::sleep(behaviour.delay) => false,
                _ = cancel.cancelled() => true,
            };

            self.running.fetch_sub(1, Ordering::SeqCst);
            self.records.lock().unwrap().push(ExecutionRecord {
                task,
                started,
                finished: Instant::now(),
                cancelled,
            });

            if cancelled {
                Err(OpenGeError::Cancelled)
            } else if behaviour.error {
                Err(OpenGeError::Other(anyhow::anyhow!("fake executor error")))
            } else {
                Ok(behaviour.exit_code)
            }
        })
    }
}

/// Workspace provider that hands out the system temp directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeWorkspaceProvider {
    pub concurrent_writes: bool,
}

impl WorkspaceProvider for FakeWorkspaceProvider {
    fn supports_concurrent_writes(&self) -> bool {
        self.concurrent_writes
    }

    fn acquire<'a>(&'a self, _spec: &'a GraphTaskSpec) -> BoxFuture<'a, Result<Workspace>> {
        Box::pin(async { Ok(Workspace::new(std::env::temp_dir())) })
    }
}

/// Shared handle convenient for building a `GraphExecutor`.
pub fn shared(executor: FakeDescriptorExecutor) -> Arc<FakeDescriptorExecutor> {
    Arc::new(executor)
}
