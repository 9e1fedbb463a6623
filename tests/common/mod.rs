#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use openge::exec::{ExecutionReport, GraphExecutor};
use openge::graph::Graph;
use openge_test_utils::fake_executor::{FakeDescriptorExecutor, FakeWorkspaceProvider};
use openge_test_utils::recording::RecordingEvents;

pub use openge_test_utils::builders::{JobBuilder, key};
pub use openge_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const SHORT: Duration = Duration::from_millis(20);

pub struct Run {
    pub report: ExecutionReport,
    pub events: Arc<RecordingEvents>,
    pub fake: Arc<FakeDescriptorExecutor>,
}

/// Execute `graph` against `fake` with a recording event sink.
pub async fn execute(
    graph: &Graph,
    fake: FakeDescriptorExecutor,
    concurrency_limit: Option<usize>,
    concurrent_writes: bool,
    cancel: CancellationToken,
) -> Run {
    let fake = Arc::new(fake);
    let events = Arc::new(RecordingEvents::new());
    let executor = GraphExecutor::new(
        fake.clone(),
        Arc::new(FakeWorkspaceProvider { concurrent_writes }),
    );
    let report = with_timeout(executor.execute(graph, concurrency_limit, events.clone(), cancel))
        .await
        .expect("graph should be schedulable");
    Run {
        report,
        events,
        fake,
    }
}
