// src/graph/validate.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{OpenGeError, Result};
use crate::graph::model::GraphTask;

/// Reject dependencies on unknown tasks and dependency cycles.
///
/// The executor's scheduling scan would otherwise never make progress on
/// such graphs.
pub fn validate_dependencies(
    tasks: &BTreeMap<String, Arc<GraphTask>>,
    dependencies: &BTreeMap<String, Vec<String>>,
) -> Result<()> {
    for (task, deps) in dependencies {
        if !tasks.contains_key(task) {
            return Err(OpenGeError::ConfigError(format!(
                "dependency entry for unknown task '{task}'"
            )));
        }
        for dep in deps {
            if !tasks.contains_key(dep) {
                return Err(OpenGeError::UnknownDependency {
                    task: task.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    validate_acyclic(dependencies)
}

fn validate_acyclic(dependencies: &BTreeMap<String, Vec<String>>) -> Result<()> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in dependencies.keys() {
        graph.add_node(name.as_str());
    }
    for (task, deps) in dependencies {
        for dep in deps {
            graph.add_edge(dep.as_str(), task.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(OpenGeError::DagCycle(format!(
            "dependency cycle detected involving task '{}'",
            cycle.node_id()
        ))),
    }
}
