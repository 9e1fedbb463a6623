// src/vfs/layer.rs

use std::fmt::Debug;

use crate::errors::Result;
use crate::vfs::entry::{VfsEntry, VfsEntryExistence};

/// One layer of a virtual filesystem stack.
///
/// Paths are relative to the layer root, `/` or `\` separated; an empty
/// path names the root itself.
pub trait VfsLayer: Send + Sync + Debug {
    /// Sorted listing of a directory, or `None` if no layer has it.
    fn list(&self, path: &str) -> Result<Option<Vec<VfsEntry>>>;

    fn exists(&self, path: &str) -> VfsEntryExistence;

    fn get_info(&self, path: &str) -> Option<VfsEntry>;
}

/// Split a layer path into its non-empty components.
pub fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\']).filter(|c| !c.is_empty() && *c != ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_accept_both_separators() {
        let parts: Vec<_> = path_components(r"\a/b\\c/./").collect();
        assert_eq!(parts, vec!["a", "b", "c"]);
        assert_eq!(path_components("").count(), 0);
    }
}
