// src/factory/mod.rs

//! Task descriptor factories.
//!
//! Each factory looks at one [`GraphTaskSpec`] and returns a suitability
//! score, or [`DECLINE`] if it cannot handle the task. The graph generator
//! asks every factory in registration order and keeps the highest score;
//! ties go to the factory registered first.
//!
//! Registration order is fixed: file copy, local process, remote compiler.

use std::fmt::Debug;
use std::sync::Arc;

use crate::errors::Result;
use crate::graph::GraphTaskSpec;

pub mod copy;
pub mod descriptor;
pub mod local;
pub mod remote;

pub use copy::FileCopyTaskDescriptorFactory;
pub use descriptor::TaskDescriptor;
pub use local::LocalTaskDescriptorFactory;
pub use remote::RemoteCompilerTaskDescriptorFactory;

/// Score returned by a factory that cannot handle a task.
pub const DECLINE: i32 = -1;

/// Capability interface implemented by every descriptor factory.
pub trait TaskDescriptorFactory: Send + Sync + Debug {
    /// Short name used in logs and dry-run output.
    fn name(&self) -> &'static str;

    /// `DECLINE` to refuse, otherwise a non-negative score.
    fn score(&self, spec: &GraphTaskSpec) -> i32;

    /// Build the executable descriptor. Only called on the chosen factory.
    fn create_descriptor(&self, spec: &GraphTaskSpec) -> Result<TaskDescriptor>;
}

/// The built-in factories in their fixed priority order.
pub fn default_factories() -> Vec<Arc<dyn TaskDescriptorFactory>> {
    vec![
        Arc::new(FileCopyTaskDescriptorFactory),
        Arc::new(LocalTaskDescriptorFactory),
        Arc::new(RemoteCompilerTaskDescriptorFactory::default()),
    ]
}

/// Pick the best factory for `spec`.
///
/// Iterates in registration order and only replaces the current pick on a
/// strictly higher score, so ties keep the earlier factory.
pub fn select_factory(
    factories: &[Arc<dyn TaskDescriptorFactory>],
    spec: &GraphTaskSpec,
) -> Option<Arc<dyn TaskDescriptorFactory>> {
    let mut best: Option<(i32, &Arc<dyn TaskDescriptorFactory>)> = None;
    for factory in factories {
        let score = factory.score(spec);
        if score == DECLINE || score < 0 {
            continue;
        }
        match best {
            Some((current, _)) if score <= current => {}
            _ => best = Some((score, factory)),
        }
    }
    best.map(|(_, f)| Arc::clone(f))
}


#[cfg(test)]
mod tests {
    use super::test_support::spec_for;
    use super::*;

    #[derive(Debug)]
    struct Fixed(&'static str, i32);

    impl TaskDescriptorFactory for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn score(&self, _spec: &GraphTaskSpec) -> i32 {
            self.1
        }
        fn create_descriptor(&self, _spec: &GraphTaskSpec) -> Result<TaskDescriptor> {
            unreachable!()
        }
    }

    #[test]
    fn highest_score_wins() {
        let factories: Vec<Arc<dyn TaskDescriptorFactory>> = vec![
            Arc::new(Fixed("a", 1)),
            Arc::new(Fixed("b", 5)),
            Arc::new(Fixed("c", 3)),
        ];
        let spec = spec_for("/bin/true", "", false);
        assert_eq!(select_factory(&factories, &spec).unwrap().name(), "b");
    }

    #[test]
    fn ties_go_to_first_registered() {
        let factories: Vec<Arc<dyn TaskDescriptorFactory>> = vec![
            Arc::new(Fixed("first", 7)),
            Arc::new(Fixed("second", 7)),
        ];
        let spec = spec_for("/bin/true", "", false);
        assert_eq!(select_factory(&factories, &spec).unwrap().name(), "first");
    }

    #[test]
    fn all_declining_yields_none() {
        let factories: Vec<Arc<dyn TaskDescriptorFactory>> =
            vec![Arc::new(Fixed("a", DECLINE)), Arc::new(Fixed("b", DECLINE))];
        let spec = spec_for("/bin/true", "", false);
        assert!(select_factory(&factories, &spec).is_none());
    }

    #[test]
    fn default_order_prefers_copy_over_local() {
        let factories = default_factories();
        let names: Vec<_> = factories.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["file-copy", "local-process", "remote-compiler"]);

        let spec = spec_for("/bin/cp", "a.txt b.txt", false);
        assert_eq!(select_factory(&factories, &spec).unwrap().name(), "file-copy");

        let spec = spec_for("/usr/bin/make", "all", false);
        assert_eq!(select_factory(&factories, &spec).unwrap().name(), "local-process");
    }
}
