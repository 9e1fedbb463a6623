// src/vfs/folder.rs

//! Layer backed by a real directory, stacked over an optional next layer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::vfs::aggregate::aggregate;
use crate::vfs::compare::sort_entries;
use crate::vfs::entry::{VfsEntry, VfsEntryExistence};
use crate::vfs::layer::{VfsLayer, path_components};

#[derive(Debug)]
pub struct FolderVfsLayer {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    next: Option<Arc<dyn VfsLayer>>,
    enable_correctness_checks: bool,
}

impl FolderVfsLayer {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        next: Option<Arc<dyn VfsLayer>>,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            next,
            enable_correctness_checks: false,
        }
    }

    /// Validate ordering of every listing merged by this layer.
    pub fn with_correctness_checks(mut self, enabled: bool) -> Self {
        self.enable_correctness_checks = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path_components(path).fold(self.root.clone(), |p, c| p.join(c))
    }

    fn local_entry(&self, path: &str) -> Option<VfsEntry> {
        let components: Vec<&str> = path_components(path).collect();
        let name = components.last()?;
        let resolved = self.resolve(path);
        match self.fs.metadata(&resolved) {
            Ok(Some(metadata)) => Some(VfsEntry::from(crate::fs::FsDirEntry {
                name: (*name).to_string(),
                metadata,
            })),
            Ok(None) => None,
            Err(e) => {
                warn!(path = %resolved.display(), error = %e, "metadata lookup failed");
                None
            }
        }
    }
}

impl VfsLayer for FolderVfsLayer {
    fn list(&self, path: &str) -> Result<Option<Vec<VfsEntry>>> {
        let resolved = self.resolve(path);
        if !self.fs.is_dir(&resolved) {
            return match &self.next {
                Some(next) => next.list(path),
                None => Ok(None),
            };
        }

        let mut local: Vec<VfsEntry> = self
            .fs
            .read_dir(&resolved)?
            .into_iter()
            .map(VfsEntry::from)
            .collect();
        sort_entries(&mut local);

        let upstream = match &self.next {
            Some(next) => next.list(path)?,
            None => None,
        };
        trace!(
            path,
            local = local.len(),
            upstream = upstream.as_ref().map(Vec::len),
            "merging directory listing"
        );

        aggregate(upstream, local, self.enable_correctness_checks)
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn exists(&self, path: &str) -> VfsEntryExistence {
        let resolved = self.resolve(path);
        match self.fs.metadata(&resolved) {
            Ok(Some(m)) if m.is_dir => VfsEntryExistence::DirectoryExists,
            Ok(Some(_)) => VfsEntryExistence::FileExists,
            _ => match &self.next {
                Some(next) => next.exists(path),
                None => VfsEntryExistence::DoesNotExist,
            },
        }
    }

    fn get_info(&self, path: &str) -> Option<VfsEntry> {
        self.local_entry(path)
            .or_else(|| self.next.as_ref().and_then(|next| next.get_info(path)))
    }
}
