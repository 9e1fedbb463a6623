// src/vfs/memory.rs

//! In-memory layer, used as an upstream in tests and for synthetic trees.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::errors::Result;
use crate::vfs::compare::{compare_names, sort_entries};
use crate::vfs::entry::{VfsEntry, VfsEntryExistence};
use crate::vfs::layer::{VfsLayer, path_components};

#[derive(Debug, Default)]
pub struct MemoryVfsLayer {
    directories: Mutex<BTreeMap<String, Vec<VfsEntry>>>,
}

/// Case-folded `a/b/c` key for a layer path.
fn directory_key(path: &str) -> String {
    path_components(path)
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("/")
}

fn split_parent(path: &str) -> Option<(String, &str)> {
    let components: Vec<&str> = path_components(path).collect();
    let (name, parents) = components.split_last()?;
    Some((directory_key(&parents.join("/")), name))
}

impl MemoryVfsLayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<VfsEntry>>> {
        self.directories.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Store a listing for `path`, sorting it first.
    pub fn insert_directory(&self, path: &str, mut entries: Vec<VfsEntry>) {
        sort_entries(&mut entries);
        self.lock().insert(directory_key(path), entries);
    }

    /// Store a listing exactly as given, even if it is out of order.
    pub fn insert_unsorted(&self, path: &str, entries: Vec<VfsEntry>) {
        self.lock().insert(directory_key(path), entries);
    }

    fn is_directory(&self, key: &str) -> bool {
        let prefix = format!("{key}/");
        self.lock()
            .keys()
            .any(|k| k == key || key.is_empty() || k.starts_with(&prefix))
    }
}

impl VfsLayer for MemoryVfsLayer {
    fn list(&self, path: &str) -> Result<Option<Vec<VfsEntry>>> {
        Ok(self.lock().get(&directory_key(path)).cloned())
    }

    fn exists(&self, path: &str) -> VfsEntryExistence {
        if self.is_directory(&directory_key(path)) {
            return VfsEntryExistence::DirectoryExists;
        }
        match self.get_info(path) {
            Some(entry) if entry.is_directory() => VfsEntryExistence::DirectoryExists,
            Some(_) => VfsEntryExistence::FileExists,
            None => VfsEntryExistence::DoesNotExist,
        }
    }

    fn get_info(&self, path: &str) -> Option<VfsEntry> {
        let (parent, name) = split_parent(path)?;
        self.lock()
            .get(&parent)?
            .iter()
            .find(|e| compare_names(&e.name, name) == Ordering::Equal)
            .cloned()
    }
}
