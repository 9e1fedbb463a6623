// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// Dispatcher settings as read from a TOML file.
///
/// ```toml
/// [dispatcher]
/// pipe_name = "openge-build-agent"
/// concurrency_limit = 8
///
/// [workspace]
/// concurrent_writes = false
/// root = "/builds/checkout"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDispatcherConfig {
    #[serde(default)]
    pub dispatcher: DispatcherSection,

    #[serde(default)]
    pub workspace: WorkspaceSection,
}

/// Validated settings. Only constructed through `TryFrom<RawDispatcherConfig>`.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub dispatcher: DispatcherSection,
    pub workspace: WorkspaceSection,
}

impl DispatcherConfig {
    pub(crate) fn new_unchecked(dispatcher: DispatcherSection, workspace: WorkspaceSection) -> Self {
        Self {
            dispatcher,
            workspace,
        }
    }

    /// Pipe name to bind, generating a unique per-user name when none is set.
    pub fn effective_pipe_name(&self) -> String {
        match &self.dispatcher.pipe_name {
            Some(name) => name.clone(),
            None => format!("openge-{}", uuid::Uuid::new_v4().simple()),
        }
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new_unchecked(DispatcherSection::default(), WorkspaceSection::default())
    }
}

/// `[dispatcher]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DispatcherSection {
    /// Name of the local endpoint. If `None`, a random name is generated at
    /// startup.
    #[serde(default)]
    pub pipe_name: Option<String>,

    /// Maximum number of graph nodes doing real work at the same time.
    ///
    /// `None` means no concurrency gate at all.
    #[serde(default)]
    pub concurrency_limit: Option<usize>,
}

/// `[workspace]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WorkspaceSection {
    /// Whether the workspace backend supports fully concurrent writes. When
    /// true the concurrency gate is skipped.
    #[serde(default)]
    pub concurrent_writes: bool,

    /// Folder that every node executes in. Defaults to the job's working
    /// directory.
    #[serde(default)]
    pub root: Option<PathBuf>,
}
