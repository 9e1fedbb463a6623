// src/graph/generator.rs

//! Turns a parsed [`Job`] into an immutable [`Graph`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::errors::{OpenGeError, Result};
use crate::factory::{TaskDescriptorFactory, default_factories, select_factory};
use crate::graph::args::split_arguments;
use crate::graph::model::{Graph, GraphTask};
use crate::graph::spec::{GraphExecutionEnvironment, GraphTaskSpec, task_key};
use crate::job::Job;

#[derive(Debug, Clone)]
pub struct GraphGenerator {
    factories: Arc<Vec<Arc<dyn TaskDescriptorFactory>>>,
}

impl Default for GraphGenerator {
    fn default() -> Self {
        Self::new(default_factories())
    }
}

impl GraphGenerator {
    /// `factories` must be in registration order; it decides tie-breaks.
    pub fn new(factories: Vec<Arc<dyn TaskDescriptorFactory>>) -> Self {
        Self {
            factories: Arc::new(factories),
        }
    }

    pub fn factories(&self) -> &[Arc<dyn TaskDescriptorFactory>] {
        &self.factories
    }

    /// Build the graph for `job`.
    ///
    /// Fails with a configuration error on duplicate task keys, references
    /// to unknown environments, tools or dependencies, tasks no factory can
    /// handle, and dependency cycles.
    pub async fn generate(
        &self,
        job: Arc<Job>,
        environment: Arc<GraphExecutionEnvironment>,
    ) -> Result<Graph> {
        let specs = build_specs(&job, &environment)?;
        debug!(tasks = specs.len(), "generated task specifications");

        // Factory scoring is independent per task.
        let mut scoring = JoinSet::new();
        for spec in specs.into_values() {
            let factories = Arc::clone(&self.factories);
            scoring.spawn(async move {
                let factory = select_factory(&factories, &spec);
                (spec, factory)
            });
        }

        let mut tasks: BTreeMap<String, Arc<GraphTask>> = BTreeMap::new();
        while let Some(joined) = scoring.join_next().await {
            let (spec, factory) = joined.map_err(|e| OpenGeError::Other(e.into()))?;
            let Some(factory) = factory else {
                return Err(OpenGeError::NoCapableFactory(spec.key()));
            };
            trace!(task = %spec.key(), factory = factory.name(), "selected factory");
            tasks.insert(spec.key(), Arc::new(GraphTask::new(spec, factory)));
        }

        let dependencies = resolve_dependencies(&job, &tasks)?;
        Graph::new(tasks, dependencies)
    }
}

fn build_specs(
    job: &Arc<Job>,
    environment: &Arc<GraphExecutionEnvironment>,
) -> Result<BTreeMap<String, GraphTaskSpec>> {
    let mut specs = BTreeMap::new();

    for (project_name, project) in &job.projects {
        let env = job.environments.get(&project.env).ok_or_else(|| {
            OpenGeError::ConfigError(format!(
                "project '{project_name}' references unknown environment '{}'",
                project.env
            ))
        })?;

        for (task_name, task) in &project.tasks {
            let tool = env.tools.get(&task.tool).ok_or_else(|| {
                OpenGeError::ConfigError(format!(
                    "task '{}' references unknown tool '{}' in environment '{}'",
                    task_key(project_name, task_name),
                    task.tool,
                    project.env
                ))
            })?;

            let spec = GraphTaskSpec {
                project_name: project_name.clone(),
                task_name: task_name.clone(),
                environment_name: project.env.clone(),
                tool_name: task.tool.clone(),
                task: task.clone(),
                tool: tool.clone(),
                environment_variables: env.variables.clone(),
                arguments: split_arguments(&tool.params),
                job: Arc::clone(job),
                execution_environment: Arc::clone(environment),
            };

            let key = spec.key();
            if specs.insert(key.clone(), spec).is_some() {
                return Err(OpenGeError::DuplicateTaskKey(key));
            }
        }
    }

    Ok(specs)
}

fn resolve_dependencies(
    job: &Job,
    tasks: &BTreeMap<String, Arc<GraphTask>>,
) -> Result<BTreeMap<String, Vec<String>>> {
    let mut dependencies = BTreeMap::new();

    for (project_name, project) in &job.projects {
        for (task_name, task) in &project.tasks {
            let key = task_key(project_name, task_name);
            let mut deps = Vec::new();
            for name in task.dependency_names() {
                let dep = task_key(project_name, name);
                if !tasks.contains_key(&dep) {
                    return Err(OpenGeError::UnknownDependency {
                        task: key,
                        dependency: dep,
                    });
                }
                deps.push(dep);
            }
            dependencies.insert(key, deps);
        }
    }

    Ok(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::parse_job;

    const JOB: &str = r#"
[environments.Env.tools.Compile]
path = "/usr/bin/clang"
params = "-c main.c -o main.o"
allow_remote = true

[environments.Env.tools.Link]
path = "/usr/bin/ld"
params = "main.o -o app"

[environments.Env.tools.Copy]
path = "/bin/cp"
params = "app out/app"

[projects.Game]
env = "Env"

[projects.Game.tasks.Compile]
tool = "Compile"

[projects.Game.tasks.Link]
tool = "Link"
depends_on = "Compile"

[projects.Game.tasks.Stage]
tool = "Copy"
depends_on = "Link"
"#;

    async fn generate(doc: &str) -> Result<Graph> {
        let job = Arc::new(parse_job(doc)?);
        GraphGenerator::default()
            .generate(job, Arc::new(GraphExecutionEnvironment::new("/work")))
            .await
    }

    #[tokio::test]
    async fn builds_tasks_dependencies_and_frontier() {
        let graph = generate(JOB).await.unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.immediately_schedulable(), ["Game:Compile".to_string()]);
        assert_eq!(graph.dependencies_of("Game:Stage"), ["Game:Link".to_string()]);

        let factory = |key: &str| graph.task(key).unwrap().factory.name();
        assert_eq!(factory("Game:Compile"), "remote-compiler");
        assert_eq!(factory("Game:Link"), "local-process");
        assert_eq!(factory("Game:Stage"), "file-copy");
    }

    #[tokio::test]
    async fn unknown_dependency_is_a_configuration_error() {
        let doc = JOB.replace("depends_on = \"Link\"", "depends_on = \"Missing\"");
        let err = generate(&doc).await.unwrap_err();
        assert!(matches!(err, OpenGeError::UnknownDependency { .. }));
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn cycle_is_rejected() {
        let doc = JOB.replace(
            "[projects.Game.tasks.Compile]\ntool = \"Compile\"",
            "[projects.Game.tasks.Compile]\ntool = \"Compile\"\ndepends_on = \"Stage\"",
        );
        let err = generate(&doc).await.unwrap_err();
        assert!(matches!(err, OpenGeError::DagCycle(_)));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let doc = JOB.replace("tool = \"Copy\"", "tool = \"Nope\"");
        let err = generate(&doc).await.unwrap_err();
        assert!(matches!(err, OpenGeError::ConfigError(msg) if msg.contains("Nope")));
    }

    #[tokio::test]
    async fn colliding_keys_are_rejected() {
        let doc = r#"
[environments.E.tools.T]
path = "/bin/true"

[projects."a:b"]
env = "E"
[projects."a:b".tasks.c]
tool = "T"

[projects.a]
env = "E"
[projects.a.tasks."b:c"]
tool = "T"
"#;
        let err = generate(doc).await.unwrap_err();
        assert!(matches!(err, OpenGeError::DuplicateTaskKey(key) if key == "a:b:c"));
    }

    #[tokio::test]
    async fn no_capable_factory_is_rejected() {
        let job = Arc::new(parse_job(JOB).unwrap());
        let err = GraphGenerator::new(Vec::new())
            .generate(job, Arc::new(GraphExecutionEnvironment::new("/work")))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenGeError::NoCapableFactory(_)));
    }
}
