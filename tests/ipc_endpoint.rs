mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use common::{JobBuilder, SHORT, TestResult, init_tracing, with_timeout};
use openge::config::parse_and_validate;
use openge::dispatcher::protocol::{ClientRequest, decode_frame, encode_frame};
use openge::dispatcher::server::serve_connection;
use openge::dispatcher::{DispatcherComponent, JobResponse, SubmitJobRequest, client};
use openge::exec::GraphExecutor;
use openge::graph::GraphGenerator;
use openge::types::JobCompletionStatus;
use openge_test_utils::builders::dispatcher_config_toml;
use openge_test_utils::fake_executor::{FakeDescriptorExecutor, FakeWorkspaceProvider};

fn dispatcher(delay: Duration) -> DispatcherComponent {
    let pipe = format!("openge-ipc-{}", uuid::Uuid::new_v4().simple());
    let config = parse_and_validate(&dispatcher_config_toml(&pipe, Some(2))).expect("config");
    let executor = GraphExecutor::new(
        Arc::new(FakeDescriptorExecutor::new(delay)),
        Arc::new(FakeWorkspaceProvider::default()),
    );
    DispatcherComponent::with_parts(config, GraphGenerator::default(), executor)
}

#[tokio::test]
async fn ping_and_submit_over_the_local_endpoint() -> TestResult {
    init_tracing();
    let d = dispatcher(SHORT);
    let pipe = d.start(CancellationToken::new()).await?;

    with_timeout(client::ping(&pipe)).await?;

    let request = SubmitJobRequest {
        job_document: JobBuilder::new().task("A", &[]).task("B", &["A"]).to_toml(),
        working_directory: std::env::temp_dir().display().to_string(),
        ..SubmitJobRequest::default()
    };
    let mut rx = client::submit_job(&pipe, request).await?;

    let mut responses = Vec::new();
    while let Some(r) = with_timeout(rx.recv()).await {
        responses.push(r);
    }

    assert!(matches!(responses.first(), Some(JobResponse::JobParsed { total_tasks: 2 })));
    assert!(matches!(
        responses.last(),
        Some(JobResponse::JobComplete {
            status: JobCompletionStatus::Success,
            ..
        })
    ));

    d.stop().await?;
    Ok(())
}

#[tokio::test]
async fn client_disconnect_cancels_the_job() -> TestResult {
    init_tracing();
    let d = dispatcher(Duration::from_secs(30));
    d.start(CancellationToken::new()).await?;

    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_side);
    let serving = tokio::spawn(serve_connection(d.clone(), server_read, server_write));

    let (client_read, mut client_write) = tokio::io::split(client_side);
    let request = ClientRequest::SubmitJob(SubmitJobRequest {
        job_document: JobBuilder::new().task("Forever", &[]).to_toml(),
        ..SubmitJobRequest::default()
    });
    client_write.write_all(&encode_frame(&request)?).await?;
    client_write.flush().await?;

    let mut lines = BufReader::new(client_read).lines();
    loop {
        let line = with_timeout(lines.next_line()).await?.expect("server hung up early");
        if matches!(decode_frame::<JobResponse>(&line)?, JobResponse::TaskStarted { .. }) {
            break;
        }
    }

    // Hang up our write half; the server reads EOF and cancels.
    client_write.shutdown().await?;
    drop(client_write);

    let mut terminal = None;
    while let Some(line) = with_timeout(lines.next_line()).await? {
        if let JobResponse::JobComplete { status, .. } = decode_frame::<JobResponse>(&line)? {
            terminal = Some(status);
        }
    }
    assert_eq!(terminal, Some(JobCompletionStatus::Cancelled));

    with_timeout(serving).await??;
    with_timeout(d.stop()).await?;
    Ok(())
}
