use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use openge::graph::{Graph, GraphExecutionEnvironment, GraphGenerator};
use openge::job::{Job, parse_job};

/// Project every builder task lives in.
pub const PROJECT: &str = "P";

/// Graph key of a builder task.
pub fn key(task: &str) -> String {
    openge::graph::task_key(PROJECT, task)
}

/// Builds job documents with one project, one environment, and one tool
/// per task whose executable path is the task name.
///
/// With a local factory the resulting descriptor's path identifies the
/// task, which is what [`crate::fake_executor::FakeDescriptorExecutor`]
/// keys its behaviour on.
#[derive(Debug, Default, Clone)]
pub struct JobBuilder {
    tasks: BTreeMap<String, (Vec<String>, String)>,
    variables: BTreeMap<String, String>,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(mut self, name: &str, depends_on: &[&str]) -> Self {
        self.tasks.insert(
            name.to_string(),
            (depends_on.iter().map(|d| d.to_string()).collect(), String::new()),
        );
        self
    }

    pub fn task_with_params(mut self, name: &str, depends_on: &[&str], params: &str) -> Self {
        self.tasks.insert(
            name.to_string(),
            (
                depends_on.iter().map(|d| d.to_string()).collect(),
                params.to_string(),
            ),
        );
        self
    }

    pub fn variable(mut self, name: &str, value: &str) -> Self {
        self.variables.insert(name.to_string(), value.to_string());
        self
    }

    pub fn to_toml(&self) -> String {
        let mut doc = String::new();
        let _ = writeln!(doc, "[environments.Env.variables]");
        for (k, v) in &self.variables {
            let _ = writeln!(doc, "{k} = {v:?}");
        }
        for (name, (_, params)) in &self.tasks {
            let _ = writeln!(doc, "\n[environments.Env.tools.{name}]");
            let _ = writeln!(doc, "path = {name:?}");
            let _ = writeln!(doc, "params = {params:?}");
        }
        let _ = writeln!(doc, "\n[projects.{PROJECT}]\nenv = \"Env\"");
        for (name, (deps, _)) in &self.tasks {
            let _ = writeln!(doc, "\n[projects.{PROJECT}.tasks.{name}]");
            let _ = writeln!(doc, "tool = {name:?}");
            if !deps.is_empty() {
                let _ = writeln!(doc, "depends_on = {:?}", deps.join(";"));
            }
        }
        doc
    }

    pub fn build(&self) -> Job {
        parse_job(&self.to_toml()).expect("builder produced an invalid job document")
    }

    /// Generate the graph with the default factories.
    pub async fn build_graph(&self) -> Graph {
        let environment = GraphExecutionEnvironment::new(std::env::temp_dir());
        GraphGenerator::default()
            .generate(Arc::new(self.build()), Arc::new(environment))
            .await
            .expect("builder produced an invalid graph")
    }
}

/// Dispatcher settings document.
pub fn dispatcher_config_toml(pipe_name: &str, concurrency_limit: Option<usize>) -> String {
    let mut doc = format!("[dispatcher]\npipe_name = {pipe_name:?}\n");
    if let Some(limit) = concurrency_limit {
        let _ = writeln!(doc, "concurrency_limit = {limit}");
    }
    doc
}
