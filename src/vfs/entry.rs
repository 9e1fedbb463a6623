// src/vfs/entry.rs

//! Directory entries as seen through a VFS layer.

use std::time::SystemTime;

use crate::fs::FsDirEntry;

/// Win32-style file attribute bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileAttributes(u32);

impl FileAttributes {
    pub const READONLY: FileAttributes = FileAttributes(0x1);
    pub const HIDDEN: FileAttributes = FileAttributes(0x2);
    pub const DIRECTORY: FileAttributes = FileAttributes(0x10);
    pub const ARCHIVE: FileAttributes = FileAttributes(0x20);
    pub const NORMAL: FileAttributes = FileAttributes(0x80);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        FileAttributes(bits)
    }

    pub const fn contains(self, other: FileAttributes) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: FileAttributes) -> Self {
        FileAttributes(self.0 | other.0)
    }
}

/// Immutable record for one name in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsEntry {
    pub name: String,
    pub attributes: FileAttributes,
    pub creation_time: SystemTime,
    pub last_access_time: SystemTime,
    pub last_write_time: SystemTime,
    pub change_time: SystemTime,
    /// Always zero for directories.
    pub size: u64,
}

impl VfsEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self::with_times(name, FileAttributes::ARCHIVE, size, SystemTime::UNIX_EPOCH)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::with_times(name, FileAttributes::DIRECTORY, 0, SystemTime::UNIX_EPOCH)
    }

    fn with_times(
        name: impl Into<String>,
        attributes: FileAttributes,
        size: u64,
        time: SystemTime,
    ) -> Self {
        VfsEntry {
            name: name.into(),
            attributes,
            creation_time: time,
            last_access_time: time,
            last_write_time: time,
            change_time: time,
            size,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.attributes.contains(FileAttributes::DIRECTORY)
    }
}

impl From<FsDirEntry> for VfsEntry {
    fn from(entry: FsDirEntry) -> Self {
        let meta = entry.metadata;
        let mut attributes = if meta.is_dir {
            FileAttributes::DIRECTORY
        } else {
            FileAttributes::ARCHIVE
        };
        if meta.readonly {
            attributes = attributes.with(FileAttributes::READONLY);
        }
        VfsEntry {
            name: entry.name,
            attributes,
            creation_time: meta.created,
            last_access_time: meta.accessed,
            last_write_time: meta.modified,
            // No separate change time is exposed portably.
            change_time: meta.modified,
            size: if meta.is_dir { 0 } else { meta.len },
        }
    }
}

/// Result of probing a path through a layer stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsEntryExistence {
    DoesNotExist,
    FileExists,
    DirectoryExists,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FsMetadata;

    #[test]
    fn directory_flag_is_derived_from_attributes() {
        assert!(VfsEntry::directory("d").is_directory());
        assert!(!VfsEntry::file("f", 3).is_directory());

        let mut entry = VfsEntry::file("f", 3);
        entry.attributes = entry.attributes.with(FileAttributes::DIRECTORY);
        assert!(entry.is_directory());
    }

    #[test]
    fn directories_from_disk_have_zero_size() {
        let entry = VfsEntry::from(FsDirEntry {
            name: "sub".into(),
            metadata: FsMetadata {
                is_dir: true,
                len: 4096,
                readonly: true,
                created: SystemTime::UNIX_EPOCH,
                accessed: SystemTime::UNIX_EPOCH,
                modified: SystemTime::UNIX_EPOCH,
            },
        });
        assert_eq!(entry.size, 0);
        assert!(entry.attributes.contains(FileAttributes::READONLY));
    }
}
