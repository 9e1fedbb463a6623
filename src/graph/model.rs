// src/graph/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::Result;
use crate::factory::{TaskDescriptor, TaskDescriptorFactory};
use crate::graph::spec::GraphTaskSpec;
use crate::graph::validate::validate_dependencies;

/// A task spec paired with the factory chosen to execute it.
#[derive(Clone)]
pub struct GraphTask {
    pub spec: Arc<GraphTaskSpec>,
    pub factory: Arc<dyn TaskDescriptorFactory>,
}

impl GraphTask {
    pub fn new(spec: GraphTaskSpec, factory: Arc<dyn TaskDescriptorFactory>) -> Self {
        Self {
            spec: Arc::new(spec),
            factory,
        }
    }

    pub fn key(&self) -> String {
        self.spec.key()
    }

    pub fn create_descriptor(&self) -> Result<TaskDescriptor> {
        self.factory.create_descriptor(&self.spec)
    }
}

impl fmt::Debug for GraphTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphTask")
            .field("key", &self.spec.key())
            .field("factory", &self.factory.name())
            .finish()
    }
}

/// Immutable task graph for one job.
///
/// Built once per submission and discarded after execution. Construction
/// validates that every dependency names a task in the graph and that the
/// dependency relation is acyclic.
#[derive(Debug, Clone)]
pub struct Graph {
    tasks: BTreeMap<String, Arc<GraphTask>>,
    /// task -> tasks it depends on
    dependencies: BTreeMap<String, Vec<String>>,
    immediately_schedulable: Vec<String>,
}

impl Graph {
    pub fn new(
        tasks: BTreeMap<String, Arc<GraphTask>>,
        mut dependencies: BTreeMap<String, Vec<String>>,
    ) -> Result<Self> {
        for key in tasks.keys() {
            dependencies.entry(key.clone()).or_default();
        }
        for deps in dependencies.values_mut() {
            deps.sort();
            deps.dedup();
        }

        validate_dependencies(&tasks, &dependencies)?;

        let immediately_schedulable = dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(key, _)| key.clone())
            .collect();

        Ok(Self {
            tasks,
            dependencies,
            immediately_schedulable,
        })
    }

    pub fn tasks(&self) -> impl Iterator<Item = (&str, &Arc<GraphTask>)> {
        self.tasks.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn task(&self, key: &str) -> Option<&Arc<GraphTask>> {
        self.tasks.get(key)
    }

    pub fn dependencies_of(&self, key: &str) -> &[String] {
        self.dependencies
            .get(key)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks with zero dependencies.
    pub fn immediately_schedulable(&self) -> &[String] {
        &self.immediately_schedulable
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
