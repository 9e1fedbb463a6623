// src/vfs/mod.rs

//! Layered virtual filesystem.
//!
//! - [`aggregate`] merges sorted listings from two layers.
//! - [`folder`] and [`memory`] are the concrete layers.
//! - [`overlapped`] and [`file`] model completion-callback I/O.

pub mod aggregate;
pub mod compare;
pub mod entry;
pub mod file;
pub mod folder;
pub mod layer;
pub mod memory;
pub mod overlapped;

pub use aggregate::{DirectoryAggregation, SCRATCH_DATABASE_NAME, aggregate, aggregate_entries};
pub use compare::compare_names;
pub use entry::{FileAttributes, VfsEntry, VfsEntryExistence};
pub use file::{IssuedIo, LocalVfsFile};
pub use folder::FolderVfsLayer;
pub use layer::VfsLayer;
pub use memory::MemoryVfsLayer;
pub use overlapped::{AsyncIoProcessing, CompletionCallback, HandleId, IoCompletion, OverlappedToken};
