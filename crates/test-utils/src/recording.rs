use std::sync::Mutex;
use std::time::Instant;

use openge::errors::Result;
use openge::exec::{BoxFuture, ExecutionEvents, NodeOutcome};
use openge::graph::GraphTask;
use openge::types::{BuildResultStatus, OutputStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    Started(String),
    Output(String, String),
    Finished(String, BuildResultStatus),
}

impl RecordedEvent {
    pub fn task(&self) -> &str {
        match self {
            RecordedEvent::Started(t) | RecordedEvent::Output(t, _) | RecordedEvent::Finished(t, _) => t,
        }
    }
}

/// Captures executor lifecycle events with their arrival time.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<(Instant, RecordedEvent)>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: RecordedEvent) {
        self.events.lock().unwrap().push((Instant::now(), event));
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn timed_events(&self) -> Vec<(Instant, RecordedEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Started(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    /// Events for one task, in order.
    pub fn for_task(&self, task: &str) -> Vec<RecordedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.task() == task)
            .collect()
    }
}

impl ExecutionEvents for RecordingEvents {
    fn node_started<'a>(&'a self, task: &'a GraphTask) -> BoxFuture<'a, Result<()>> {
        self.push(RecordedEvent::Started(task.key()));
        Box::pin(async { Ok(()) })
    }

    fn node_output<'a>(
        &'a self,
        task: &'a GraphTask,
        line: String,
        _stream: OutputStream,
    ) -> BoxFuture<'a, Result<()>> {
        self.push(RecordedEvent::Output(task.key(), line));
        Box::pin(async { Ok(()) })
    }

    fn node_finished<'a>(
        &'a self,
        task: &'a GraphTask,
        outcome: NodeOutcome,
    ) -> BoxFuture<'a, Result<()>> {
        self.push(RecordedEvent::Finished(task.key(), outcome.status));
        Box::pin(async { Ok(()) })
    }
}
