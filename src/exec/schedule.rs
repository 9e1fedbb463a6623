// src/exec/schedule.rs

//! Launch ordering for the graph executor.
//!
//! Pure logic, no IO: decides in which waves node handles are spawned. A
//! node becomes eligible once every dependency has been *launched*; it
//! does not wait for them to complete here. Waiting happens inside each
//! node's own routine.

use std::collections::BTreeSet;

use crate::errors::{OpenGeError, Result};
use crate::graph::Graph;

/// Compute launch waves. The first wave is the graph's frontier.
///
/// A scan that moves nothing while nodes remain means an unresolved or
/// cyclic dependency and is reported as [`OpenGeError::DagCycle`] instead
/// of looping forever.
pub fn launch_waves(graph: &Graph) -> Result<Vec<Vec<String>>> {
    let mut remaining: Vec<&str> = graph.tasks().map(|(key, _)| key).collect();
    let mut launched: BTreeSet<&str> = BTreeSet::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (eligible, blocked): (Vec<&str>, Vec<&str>) = remaining.into_iter().partition(|key| {
            graph
                .dependencies_of(key)
                .iter()
                .all(|dep| launched.contains(dep.as_str()))
        });

        if eligible.is_empty() {
            return Err(OpenGeError::DagCycle(format!(
                "no progress scheduling remaining tasks: {}",
                blocked.join(", ")
            )));
        }

        launched.extend(eligible.iter().copied());
        waves.push(eligible.into_iter().map(str::to_string).collect());
        remaining = blocked;
    }

    Ok(waves)
}
