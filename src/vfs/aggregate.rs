// src/vfs/aggregate.rs

//! Sorted merge of an upstream listing with a local listing.
//!
//! Both inputs must already be ordered by [`compare_names`]. When a name
//! appears on both sides the local entry shadows the upstream one. The
//! scratch database file is never yielded from the local side.

use std::cmp::Ordering;
use std::iter::{Filter, Peekable};

use crate::errors::{OpenGeError, Result};
use crate::vfs::compare::compare_names;
use crate::vfs::entry::VfsEntry;

/// File kept by the scratch layer next to the files it tracks.
pub const SCRATCH_DATABASE_NAME: &str = ".uefs.db";

fn is_visible(entry: &VfsEntry) -> bool {
    compare_names(&entry.name, SCRATCH_DATABASE_NAME) != Ordering::Equal
}

type LocalEntries<L> = Peekable<Filter<L, fn(&VfsEntry) -> bool>>;

#[derive(Debug, Clone, Copy)]
enum Side {
    Upstream,
    Local,
}

/// Lazy merge produced by [`aggregate`].
///
/// Yields `Err` once and then stops if correctness checks are enabled and an
/// input turns out not to be sorted.
pub struct DirectoryAggregation<U: Iterator<Item = VfsEntry>, L: Iterator<Item = VfsEntry>> {
    upstream: Option<Peekable<U>>,
    local: LocalEntries<L>,
    enable_correctness_checks: bool,
    last_upstream: Option<String>,
    last_local: Option<String>,
    failed: bool,
}

/// Merge `upstream` (if any) with `local`.
///
/// Call again with fresh iterators to restart the merge; nothing is shared
/// between two aggregations.
pub fn aggregate<U, L>(
    upstream: Option<U>,
    local: L,
    enable_correctness_checks: bool,
) -> DirectoryAggregation<U::IntoIter, L::IntoIter>
where
    U: IntoIterator<Item = VfsEntry>,
    L: IntoIterator<Item = VfsEntry>,
{
    DirectoryAggregation {
        upstream: upstream.map(|u| u.into_iter().peekable()),
        local: local
            .into_iter()
            .filter(is_visible as fn(&VfsEntry) -> bool)
            .peekable(),
        enable_correctness_checks,
        last_upstream: None,
        last_local: None,
        failed: false,
    }
}

/// Collect a merge of two slices.
pub fn aggregate_entries(
    upstream: Option<&[VfsEntry]>,
    local: &[VfsEntry],
    enable_correctness_checks: bool,
) -> Result<Vec<VfsEntry>> {
    aggregate(
        upstream.map(|u| u.iter().cloned()),
        local.iter().cloned(),
        enable_correctness_checks,
    )
    .collect()
}

impl<U, L> DirectoryAggregation<U, L>
where
    U: Iterator<Item = VfsEntry>,
    L: Iterator<Item = VfsEntry>,
{
    /// Record `entry` as the latest taken from `side`, rejecting it if it
    /// does not sort strictly after its predecessor.
    fn check(&mut self, side: Side, entry: &VfsEntry) -> Result<()> {
        if !self.enable_correctness_checks {
            return Ok(());
        }
        let last = match side {
            Side::Upstream => &mut self.last_upstream,
            Side::Local => &mut self.last_local,
        };
        if let Some(previous) = last.as_deref()
            && compare_names(previous, &entry.name) != Ordering::Less
        {
            return Err(OpenGeError::Correctness(format!(
                "{side:?} listing is not sorted: '{previous}' is followed by '{}'",
                entry.name
            )));
        }
        *last = Some(entry.name.clone());
        Ok(())
    }

    fn take(&mut self, side: Side) -> Option<VfsEntry> {
        match side {
            Side::Upstream => self.upstream.as_mut().and_then(Iterator::next),
            Side::Local => self.local.next(),
        }
    }
}

impl<U, L> Iterator for DirectoryAggregation<U, L>
where
    U: Iterator<Item = VfsEntry>,
    L: Iterator<Item = VfsEntry>,
{
    type Item = Result<VfsEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let order = {
            let upstream = self.upstream.as_mut().and_then(Peekable::peek);
            let local = self.local.peek();
            match (upstream, local) {
                (None, None) => return None,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(u), Some(l)) => compare_names(&u.name, &l.name),
            }
        };

        let result = match order {
            Ordering::Less => self.take(Side::Upstream).map(|entry| {
                self.check(Side::Upstream, &entry)?;
                Ok(entry)
            }),
            Ordering::Greater => self.take(Side::Local).map(|entry| {
                self.check(Side::Local, &entry)?;
                Ok(entry)
            }),
            Ordering::Equal => {
                let shadowed = self.take(Side::Upstream);
                self.take(Side::Local).map(|entry| {
                    if let Some(shadowed) = &shadowed {
                        self.check(Side::Upstream, shadowed)?;
                    }
                    self.check(Side::Local, &entry)?;
                    Ok(entry)
                })
            }
        };

        if matches!(result, Some(Err(_))) {
            self.failed = true;
        }
        result
    }
}
