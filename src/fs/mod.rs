// src/fs/mod.rs

//! Filesystem access used by the folder VFS layer.
//!
//! Abstracted so directory listings can be served from memory in tests.

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{Context, Result};

pub mod mock;

/// What the VFS needs to know about one filesystem object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsMetadata {
    pub is_dir: bool,
    pub len: u64,
    pub readonly: bool,
    pub created: SystemTime,
    pub accessed: SystemTime,
    pub modified: SystemTime,
}

/// One child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsDirEntry {
    pub name: String,
    pub metadata: FsMetadata,
}

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// `Ok(None)` when nothing exists at `path`.
    fn metadata(&self, path: &Path) -> Result<Option<FsMetadata>>;

    /// Children of a directory, in no particular order.
    fn read_dir(&self, path: &Path) -> Result<Vec<FsDirEntry>>;

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.metadata(path), Ok(Some(m)) if m.is_dir)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.metadata(path), Ok(Some(m)) if !m.is_dir)
    }
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

fn convert(meta: &fs::Metadata) -> FsMetadata {
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    FsMetadata {
        is_dir: meta.is_dir(),
        len: if meta.is_dir() { 0 } else { meta.len() },
        readonly: meta.permissions().readonly(),
        // Not every platform records creation time.
        created: meta.created().unwrap_or(modified),
        accessed: meta.accessed().unwrap_or(modified),
        modified,
    }
}

impl FileSystem for RealFileSystem {
    fn metadata(&self, path: &Path) -> Result<Option<FsMetadata>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(convert(&meta))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading metadata of {:?}", path)),
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<FsDirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            let meta = entry
                .metadata()
                .with_context(|| format!("reading metadata of {:?}", entry.path()))?;
            entries.push(FsDirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                metadata: convert(&meta),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_filesystem_lists_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let mut entries = RealFileSystem.read_dir(dir.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[0].metadata.len, 5);
        assert!(entries[1].metadata.is_dir);
        assert!(RealFileSystem.is_dir(&dir.path().join("sub")));
        assert!(RealFileSystem.metadata(&dir.path().join("missing")).unwrap().is_none());
    }
}
