// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod exec;
pub mod factory;
pub mod fs;
pub mod graph;
pub mod job;
pub mod logging;
pub mod stream;
pub mod types;
pub mod vfs;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::load_and_validate;
use crate::dispatcher::{DispatcherComponent, JobResponse, SubmitJobRequest, client};
use crate::graph::{GraphExecutionEnvironment, GraphGenerator};
use crate::job::load_job;
use crate::types::OutputStream;

/// High-level entry point used by `main.rs`. Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    match args.command {
        Command::Serve { config, pipe } => serve(&config, pipe).await,
        Command::Submit {
            pipe,
            job,
            working_dir,
            env,
            node,
        } => submit(&pipe, &job, working_dir, env, node).await,
        Command::Validate { job } => validate(&job).await,
    }
}

async fn serve(config_path: &Path, pipe: Option<String>) -> Result<i32> {
    let mut config = load_and_validate(config_path)?;
    if pipe.is_some() {
        config.dispatcher.pipe_name = pipe;
    }

    let dispatcher = DispatcherComponent::new(config);
    let shutdown = CancellationToken::new();
    let pipe_name = dispatcher.start(shutdown.clone()).await?;
    println!("{pipe_name}");

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    info!("shutdown requested; draining in-flight jobs");
    dispatcher.stop().await?;
    Ok(0)
}

async fn submit(
    pipe: &str,
    job_path: &Path,
    working_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    node: Option<String>,
) -> Result<i32> {
    let job_document = std::fs::read_to_string(job_path)
        .with_context(|| format!("reading job document {}", job_path.display()))?;
    let working_directory = match working_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let request = SubmitJobRequest {
        job_document,
        working_directory: working_directory.display().to_string(),
        environment_variables: env.into_iter().collect::<BTreeMap<_, _>>(),
        build_node_name: node,
    };

    let mut responses = client::submit_job(pipe, request).await?;
    while let Some(response) = responses.recv().await {
        match response {
            JobResponse::JobParsed { total_tasks } => {
                debug!(total_tasks, "job accepted");
            }
            JobResponse::TaskStarted { display_name, .. } => println!("[start] {display_name}"),
            JobResponse::TaskOutput { line, stream, .. } => match stream {
                OutputStream::Stdout => println!("{line}"),
                OutputStream::Stderr => eprintln!("{line}"),
            },
            JobResponse::TaskCompleted {
                id,
                status,
                exit_code,
                total_seconds,
            } => println!("[{status}] {id} (exit {exit_code}, {total_seconds:.2}s)"),
            JobResponse::JobComplete {
                status,
                exit_code,
                total_seconds,
                message,
            } => {
                if let Some(message) = message {
                    eprintln!("{message}");
                }
                println!("job finished: {status:?} in {total_seconds:.2}s");
                return Ok(exit_code);
            }
            JobResponse::Pong => {}
        }
    }

    warn!("dispatcher closed the connection before the job completed");
    Ok(1)
}

/// Dry run: build the graph and print it.
async fn validate(job_path: &Path) -> Result<i32> {
    let job = load_job(job_path)?;
    let environment = GraphExecutionEnvironment::new(std::env::current_dir()?);
    let graph = GraphGenerator::default()
        .generate(Arc::new(job), Arc::new(environment))
        .await?;

    println!("openge dry-run");
    println!("tasks ({}):", graph.len());
    for (key, task) in graph.tasks() {
        println!("  - {key}");
        println!("      factory: {}", task.factory.name());
        let deps = graph.dependencies_of(key);
        if !deps.is_empty() {
            println!("      depends on: {deps:?}");
        }
    }
    println!("immediately schedulable: {:?}", graph.immediately_schedulable());

    debug!("dry-run complete (no execution)");
    Ok(0)
}
