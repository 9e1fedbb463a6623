// src/factory/local.rs

use std::path::PathBuf;

use crate::errors::Result;
use crate::factory::{DECLINE, TaskDescriptor, TaskDescriptorFactory};
use crate::graph::GraphTaskSpec;

/// Catch-all factory: runs the tool as a local child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTaskDescriptorFactory;

impl LocalTaskDescriptorFactory {
    pub(crate) fn descriptor_for(spec: &GraphTaskSpec) -> TaskDescriptor {
        TaskDescriptor::Local {
            path: PathBuf::from(&spec.tool.path),
            arguments: spec.logical_arguments(),
            working_directory: spec.working_directory(),
            environment: spec.effective_environment(),
        }
    }
}

impl TaskDescriptorFactory for LocalTaskDescriptorFactory {
    fn name(&self) -> &'static str {
        "local-process"
    }

    fn score(&self, spec: &GraphTaskSpec) -> i32 {
        if spec.tool.path.trim().is_empty() {
            DECLINE
        } else {
            0
        }
    }

    fn create_descriptor(&self, spec: &GraphTaskSpec) -> Result<TaskDescriptor> {
        Ok(Self::descriptor_for(spec))
    }
}
