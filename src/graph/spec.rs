// src/graph/spec.rs

//! Immutable per-task specifications produced during graph generation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use crate::graph::args::LogicalArgument;
use crate::job::{Job, JobTask, JobTool};

/// Where and with what environment a submitted job runs.
#[derive(Debug, Clone)]
pub struct GraphExecutionEnvironment {
    pub working_directory: PathBuf,
    pub environment_variables: BTreeMap<String, String>,
    pub build_start: SystemTime,
}

impl GraphExecutionEnvironment {
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            environment_variables: BTreeMap::new(),
            build_start: SystemTime::now(),
        }
    }

    pub fn with_variables(mut self, vars: BTreeMap<String, String>) -> Self {
        self.environment_variables = vars;
        self
    }
}

/// Everything known about one task instance: the task itself, the project
/// and environment it belongs to, the tool it invokes, the parsed
/// arguments and the execution environment.
///
/// Created once during graph generation and never mutated.
#[derive(Debug, Clone)]
pub struct GraphTaskSpec {
    pub project_name: String,
    pub task_name: String,
    pub environment_name: String,
    pub tool_name: String,
    pub task: JobTask,
    pub tool: JobTool,
    /// Variables from the job environment the task's project uses.
    pub environment_variables: BTreeMap<String, String>,
    pub arguments: Vec<LogicalArgument>,
    pub job: Arc<Job>,
    pub execution_environment: Arc<GraphExecutionEnvironment>,
}

impl GraphTaskSpec {
    /// Graph identity key: `"{project}:{task}"`.
    pub fn key(&self) -> String {
        task_key(&self.project_name, &self.task_name)
    }

    /// Human readable label used in events.
    pub fn display_name(&self) -> &str {
        self.task.caption.as_deref().unwrap_or(&self.task_name)
    }

    /// The task's working directory, resolved against the job's working
    /// directory when relative.
    pub fn working_directory(&self) -> PathBuf {
        let base = &self.execution_environment.working_directory;
        match self.task.working_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => base.join(dir),
            _ => base.clone(),
        }
    }

    /// Submission variables overlaid with the job environment's variables.
    pub fn effective_environment(&self) -> BTreeMap<String, String> {
        let mut env = self.execution_environment.environment_variables.clone();
        for (k, v) in &self.environment_variables {
            env.insert(k.clone(), v.clone());
        }
        env
    }

    /// Logical argument values.
    pub fn logical_arguments(&self) -> Vec<String> {
        self.arguments.iter().map(|a| a.logical.clone()).collect()
    }
}

pub fn task_key(project: &str, task: &str) -> String {
    format!("{project}:{task}")
}
