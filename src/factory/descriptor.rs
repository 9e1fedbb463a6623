// src/factory/descriptor.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

/// An executable description of one task, produced by a
/// [`TaskDescriptorFactory`](super::TaskDescriptorFactory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDescriptor {
    /// Copy a single file.
    Copy { from: PathBuf, to: PathBuf },

    /// Run a process on the local machine.
    Local {
        path: PathBuf,
        arguments: Vec<String>,
        working_directory: PathBuf,
        environment: BTreeMap<String, String>,
    },

    /// A compiler invocation that may run on any worker. The inputs and the
    /// output are listed so a worker can synchronise them.
    Remote {
        tool_path: PathBuf,
        arguments: Vec<String>,
        working_directory: PathBuf,
        environment: BTreeMap<String, String>,
        input_files: Vec<PathBuf>,
        output_file: Option<PathBuf>,
    },
}

impl TaskDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskDescriptor::Copy { .. } => "copy",
            TaskDescriptor::Local { .. } => "local",
            TaskDescriptor::Remote { .. } => "remote",
        }
    }
}
