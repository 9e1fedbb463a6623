// src/exec/workspace.rs

//! Scoped workspaces handed to descriptor execution.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::errors::{OpenGeError, Result};
use crate::exec::BoxFuture;
use crate::graph::GraphTaskSpec;

/// Supplies a filesystem location for a task.
pub trait WorkspaceProvider: Send + Sync + fmt::Debug {
    /// When `true` the executor skips its concurrency gate.
    fn supports_concurrent_writes(&self) -> bool;

    fn acquire<'a>(&'a self, spec: &'a GraphTaskSpec) -> BoxFuture<'a, Result<Workspace>>;
}

/// A workspace lease. Released when dropped, whatever the node outcome.
pub struct Workspace {
    path: PathBuf,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            release: None,
        }
    }

    pub fn with_release(path: impl Into<PathBuf>, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            path: path.into(),
            release: Some(Box::new(release)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The directory a process should start in: `requested` if it exists,
    /// otherwise the workspace root.
    pub fn directory_for(&self, requested: &Path) -> PathBuf {
        if requested.is_dir() {
            requested.to_path_buf()
        } else {
            self.path.clone()
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        trace!(path = %self.path.display(), "workspace released");
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace").field("path", &self.path).finish()
    }
}

/// Aliases an existing folder: the configured root, or the task's own
/// working directory.
#[derive(Debug, Clone, Default)]
pub struct FolderWorkspaceProvider {
    root: Option<PathBuf>,
    concurrent_writes: bool,
}

impl FolderWorkspaceProvider {
    pub fn new(root: Option<PathBuf>, concurrent_writes: bool) -> Self {
        Self {
            root,
            concurrent_writes,
        }
    }
}

impl WorkspaceProvider for FolderWorkspaceProvider {
    fn supports_concurrent_writes(&self) -> bool {
        self.concurrent_writes
    }

    fn acquire<'a>(&'a self, spec: &'a GraphTaskSpec) -> BoxFuture<'a, Result<Workspace>> {
        Box::pin(async move {
            let path = match &self.root {
                Some(root) => root.clone(),
                None => spec.working_directory(),
            };
            if !tokio::fs::try_exists(&path).await? {
                return Err(OpenGeError::ConfigError(format!(
                    "workspace folder '{}' for task '{}' does not exist",
                    path.display(),
                    spec.key()
                )));
            }
            trace!(task = %spec.key(), path = %path.display(), "workspace acquired");
            Ok(Workspace::new(path))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn release_runs_on_drop() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);
        let ws = Workspace::with_release("/tmp", move || flag.store(true, Ordering::SeqCst));
        assert!(!released.load(Ordering::SeqCst));
        drop(ws);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn missing_directory_falls_back_to_root() {
        let ws = Workspace::new("/root-of-workspace");
        assert_eq!(
            ws.directory_for(Path::new("/definitely/not/here")),
            PathBuf::from("/root-of-workspace")
        );
    }
}
