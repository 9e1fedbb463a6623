// src/vfs/compare.rs

//! Filesystem name ordering.
//!
//! Ordinal comparison ignoring case (both sides upper-cased per char), with
//! `.` and `..` always first, in that order.

use std::cmp::Ordering;

fn rank(name: &str) -> u8 {
    match name {
        "." => 0,
        ".." => 1,
        _ => 2,
    }
}

pub fn compare_names(a: &str, b: &str) -> Ordering {
    match rank(a).cmp(&rank(b)) {
        Ordering::Equal if rank(a) < 2 => Ordering::Equal,
        Ordering::Equal => a
            .chars()
            .flat_map(char::to_uppercase)
            .cmp(b.chars().flat_map(char::to_uppercase)),
        other => other,
    }
}

/// Sort a listing in place by [`compare_names`].
pub fn sort_entries(entries: &mut [super::VfsEntry]) {
    entries.sort_by(|a, b| compare_names(&a.name, &b.name));
}
