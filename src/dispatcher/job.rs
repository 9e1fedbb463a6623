// src/dispatcher/job.rs

//! Running one submitted job: parse, generate, execute, report.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::protocol::{JobResponse, SubmitJobRequest};
use crate::errors::{OpenGeError, Result};
use crate::exec::{BoxFuture, ExecutionEvents, ExecutionReport, GraphExecutor, NodeOutcome};
use crate::graph::{GraphExecutionEnvironment, GraphGenerator, GraphTask};
use crate::job::parse_job;
use crate::stream::{GuardedResponseStream, ResponseSink};
use crate::types::{CancelReason, JobCompletionStatus, OutputStream};

/// A job's cancellation token plus the reason it fired.
///
/// The first recorded reason wins. A token cancelled through its parent
/// (process shutdown) without a recorded reason counts as
/// [`CancelReason::Requested`].
#[derive(Debug, Clone)]
pub struct JobCancellation {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl JobCancellation {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::new(OnceLock::new()),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub fn reason(&self) -> Option<CancelReason> {
        match self.reason.get() {
            Some(r) => Some(*r),
            None if self.token.is_cancelled() => Some(CancelReason::Requested),
            None => None,
        }
    }
}

/// Shared, immutable pieces every job needs.
pub(crate) struct JobContext {
    pub generator: GraphGenerator,
    pub executor: GraphExecutor,
    pub concurrency_limit: Option<usize>,
}

/// Node events forwarded to the client stream.
struct StreamEvents<S> {
    stream: GuardedResponseStream<S>,
    cancellation: JobCancellation,
}

impl<S> StreamEvents<S>
where
    S: ResponseSink<JobResponse> + 'static,
{
    async fn send(&self, message: JobResponse) -> Result<()> {
        match self.stream.write(message, self.cancellation.token()).await {
            Ok(()) => Ok(()),
            Err(OpenGeError::Cancelled) => Err(OpenGeError::Cancelled),
            Err(e) => {
                warn!(error = %e, "response stream failed; cancelling job");
                self.cancellation.cancel(CancelReason::InternalFailure);
                Err(e)
            }
        }
    }

    /// Node completions are written even after the job is cancelled, so the
    /// client still gets the per-node breakdown before `JobComplete`.
    async fn send_completion(&self, message: JobResponse) -> Result<()> {
        if !self.cancellation.token().is_cancelled() {
            return self.send(message).await;
        }
        if let Err(e) = self.stream.write(message, &CancellationToken::new()).await {
            debug!(error = %e, "client did not receive node completion");
        }
        Ok(())
    }
}

impl<S> ExecutionEvents for StreamEvents<S>
where
    S: ResponseSink<JobResponse> + 'static,
{
    fn node_started<'a>(&'a self, task: &'a GraphTask) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.send(JobResponse::TaskStarted {
            id: task.key(),
            display_name: task.spec.display_name().to_string(),
        }))
    }

    fn node_output<'a>(
        &'a self,
        task: &'a GraphTask,
        line: String,
        stream: OutputStream,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.send(JobResponse::TaskOutput {
            id: task.key(),
            line,
            stream,
        }))
    }

    fn node_finished<'a>(
        &'a self,
        task: &'a GraphTask,
        outcome: NodeOutcome,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.send_completion(JobResponse::TaskCompleted {
            id: task.key(),
            status: outcome.status,
            exit_code: outcome.exit_code,
            total_seconds: outcome.elapsed.as_secs_f64(),
        }))
    }
}

/// Run a job to completion and write its terminal event.
pub(crate) async fn run_job<S>(
    ctx: Arc<JobContext>,
    request: SubmitJobRequest,
    stream: GuardedResponseStream<S>,
    cancellation: JobCancellation,
) -> JobCompletionStatus
where
    S: ResponseSink<JobResponse> + 'static,
{
    let started = Instant::now();

    let (status, message) = match execute_job(&ctx, request, &stream, &cancellation).await {
        Ok(report) => (completion_status(&report, &cancellation), None),
        Err(e) if e.is_configuration_error() => {
            warn!(error = %e, "job rejected");
            (JobCompletionStatus::Failure, Some(e.to_string()))
        }
        Err(OpenGeError::Cancelled) => {
            let status = match cancellation.reason() {
                Some(CancelReason::InternalFailure) => JobCompletionStatus::CancelledDueToFailure,
                _ => JobCompletionStatus::Cancelled,
            };
            (status, None)
        }
        Err(e) => {
            error!(error = %e, "job failed with an internal error");
            let status = match cancellation.reason() {
                Some(CancelReason::InternalFailure) => JobCompletionStatus::CancelledDueToFailure,
                Some(CancelReason::Requested) => JobCompletionStatus::Cancelled,
                None => JobCompletionStatus::Failure,
            };
            (status, Some(e.to_string()))
        }
    };

    let total_seconds = started.elapsed().as_secs_f64();
    info!(status = ?status, total_seconds, "job complete");

    // The terminal event must not be refused by the job's own token.
    let complete = JobResponse::JobComplete {
        status,
        exit_code: status.exit_code(),
        total_seconds,
        message,
    };
    if let Err(e) = stream.write(complete, &CancellationToken::new()).await {
        debug!(error = %e, "client did not receive job completion");
    }
    status
}

async fn execute_job<S>(
    ctx: &JobContext,
    request: SubmitJobRequest,
    stream: &GuardedResponseStream<S>,
    cancellation: &JobCancellation,
) -> Result<ExecutionReport>
where
    S: ResponseSink<JobResponse> + 'static,
{
    let job = Arc::new(parse_job(&request.job_document)?);
    stream
        .write(
            JobResponse::JobParsed {
                total_tasks: job.task_count(),
            },
            cancellation.token(),
        )
        .await?;

    let environment = Arc::new(
        GraphExecutionEnvironment::new(&request.working_directory)
            .with_variables(request.environment_variables),
    );
    let graph = ctx.generator.generate(job, environment).await?;
    info!(
        tasks = graph.len(),
        frontier = graph.immediately_schedulable().len(),
        node = request.build_node_name.as_deref().unwrap_or("-"),
        "executing job graph"
    );

    let events = Arc::new(StreamEvents {
        stream: stream.clone(),
        cancellation: cancellation.clone(),
    });
    ctx.executor
        .execute(
            &graph,
            ctx.concurrency_limit,
            events,
            cancellation.token().clone(),
        )
        .await
}

fn completion_status(report: &ExecutionReport, cancellation: &JobCancellation) -> JobCompletionStatus {
    if report.is_success() {
        return JobCompletionStatus::Success;
    }
    match cancellation.reason() {
        Some(CancelReason::InternalFailure) => JobCompletionStatus::CancelledDueToFailure,
        Some(CancelReason::Requested) => JobCompletionStatus::Cancelled,
        None => JobCompletionStatus::Failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let c = JobCancellation::new(CancellationToken::new());
        assert_eq!(c.reason(), None);
        c.cancel(CancelReason::InternalFailure);
        c.cancel(CancelReason::Requested);
        assert_eq!(c.reason(), Some(CancelReason::InternalFailure));
        assert!(c.token().is_cancelled());
    }

    #[test]
    fn parent_cancellation_reads_as_requested() {
        let parent = CancellationToken::new();
        let c = JobCancellation::new(parent.child_token());
        parent.cancel();
        assert_eq!(c.reason(), Some(CancelReason::Requested));
    }

    #[test]
    fn completion_status_distinguishes_cancel_reasons() {
        let mut report = ExecutionReport::default();
        report
            .statuses
            .insert("p:a".into(), crate::types::BuildResultStatus::Cancelled);

        let c = JobCancellation::new(CancellationToken::new());
        assert_eq!(completion_status(&report, &c), JobCompletionStatus::Failure);

        c.cancel(CancelReason::InternalFailure);
        assert_eq!(
            completion_status(&report, &c),
            JobCompletionStatus::CancelledDueToFailure
        );
    }
}
