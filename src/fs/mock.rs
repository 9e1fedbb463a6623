// src/fs/mock.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use anyhow::{Result, anyhow};

use super::{FileSystem, FsDirEntry, FsMetadata};

#[derive(Debug, Clone)]
enum MockEntry {
    File { len: u64, modified: SystemTime },
    Dir,
}

/// In-memory filesystem. Parent directories are created implicitly.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_file(&self, path: impl AsRef<Path>, len: u64) {
        let path = path.as_ref();
        let mut entries = self.lock();
        ensure_parents(&mut entries, path);
        entries.insert(
            path.to_path_buf(),
            MockEntry::File {
                len,
                modified: SystemTime::UNIX_EPOCH,
            },
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        ensure_parents(&mut entries, path);
        entries.insert(path.to_path_buf(), MockEntry::Dir);
    }
}

fn ensure_parents(entries: &mut BTreeMap<PathBuf, MockEntry>, path: &Path) {
    let mut parent = path.parent();
    while let Some(p) = parent {
        if p.as_os_str().is_empty() {
            break;
        }
        entries.entry(p.to_path_buf()).or_insert(MockEntry::Dir);
        parent = p.parent();
    }
}

fn metadata_of(entry: &MockEntry) -> FsMetadata {
    match entry {
        MockEntry::File { len, modified } => FsMetadata {
            is_dir: false,
            len: *len,
            readonly: false,
            created: *modified,
            accessed: *modified,
            modified: *modified,
        },
        MockEntry::Dir => FsMetadata {
            is_dir: true,
            len: 0,
            readonly: false,
            created: SystemTime::UNIX_EPOCH,
            accessed: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
        },
    }
}

impl FileSystem for MockFileSystem {
    fn metadata(&self, path: &Path) -> Result<Option<FsMetadata>> {
        Ok(self.lock().get(path).map(metadata_of))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<FsDirEntry>> {
        let entries = self.lock();
        match entries.get(path) {
            Some(MockEntry::Dir) => Ok(entries
                .iter()
                .filter(|(p, _)| p.parent() == Some(path))
                .filter_map(|(p, e)| {
                    let name = p.file_name()?.to_string_lossy().into_owned();
                    Some(FsDirEntry {
                        name,
                        metadata: metadata_of(e),
                    })
                })
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
