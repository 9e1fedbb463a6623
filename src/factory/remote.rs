// src/factory/remote.rs

//! Compiler invocations that can be shipped to another worker.
//!
//! A remote descriptor lists its input source (plus any `@response` files)
//! and its output object so the worker can synchronise them, and carries an
//! environment with machine-specific variables removed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::errors::Result;
use crate::factory::copy::tool_stem;
use crate::factory::local::LocalTaskDescriptorFactory;
use crate::factory::{DECLINE, TaskDescriptor, TaskDescriptorFactory};
use crate::graph::GraphTaskSpec;

const REMOTE_SCORE: i32 = 1000;

const COMPILERS: &[&str] = &["clang", "clang++", "clang-cl", "cl"];

const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++", "m", "mm"];

/// Variables that describe the submitting machine and must not leak to a
/// worker.
pub const MACHINE_SPECIFIC_VARIABLES: &[&str] = &[
    "COMPUTERNAME",
    "USERDOMAIN",
    "USERDOMAIN_ROAMINGPROFILE",
    "USERNAME",
    "USERPROFILE",
    "LOGONSERVER",
    "HOMEDRIVE",
    "HOMEPATH",
    "APPDATA",
    "LOCALAPPDATA",
    "TEMP",
    "TMP",
    "HOME",
    "USER",
    "HOSTNAME",
    "TMPDIR",
];

#[derive(Debug, Clone)]
pub struct RemoteCompilerTaskDescriptorFactory {
    compilers: Vec<String>,
}

impl Default for RemoteCompilerTaskDescriptorFactory {
    fn default() -> Self {
        Self {
            compilers: COMPILERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RemoteCompilerTaskDescriptorFactory {
    fn is_compiler(&self, spec: &GraphTaskSpec) -> bool {
        tool_stem(&spec.tool.path)
            .map(|stem| self.compilers.iter().any(|c| c == &stem))
            .unwrap_or(false)
    }
}

fn is_source_file(arg: &str) -> bool {
    if arg.starts_with('-') || arg.starts_with('@') {
        return false;
    }
    // MSVC style switches carry no path separator after the leading slash.
    if arg.starts_with('/') && !arg[1..].contains('/') && !arg.contains('\\') {
        return false;
    }
    match arg.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => SOURCE_EXTENSIONS
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

fn source_file(arguments: &[String]) -> Option<&String> {
    arguments.iter().find(|a| is_source_file(a))
}

/// The object file named by `-o X`, `-oX`, `/FoX` or `-FoX`.
fn output_file(arguments: &[String]) -> Option<String> {
    let mut iter = arguments.iter();
    while let Some(arg) = iter.next() {
        if arg == "-o" {
            return iter.next().cloned();
        }
        for prefix in ["/Fo", "-Fo"] {
            if let Some(rest) = arg.strip_prefix(prefix) {
                if !rest.is_empty() {
                    return Some(rest.to_string());
                }
            }
        }
        if let Some(rest) = arg.strip_prefix("-o") {
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }
    None
}

pub fn strip_machine_specific(env: BTreeMap<String, String>) -> BTreeMap<String, String> {
    env.into_iter()
        .filter(|(k, _)| {
            !MACHINE_SPECIFIC_VARIABLES
                .iter()
                .any(|m| m.eq_ignore_ascii_case(k))
        })
        .collect()
}

impl TaskDescriptorFactory for RemoteCompilerTaskDescriptorFactory {
    fn name(&self) -> &'static str {
        "remote-compiler"
    }

    fn score(&self, spec: &GraphTaskSpec) -> i32 {
        if !spec.tool.allow_remote || !self.is_compiler(spec) {
            return DECLINE;
        }
        if source_file(&spec.logical_arguments()).is_none() {
            return DECLINE;
        }
        REMOTE_SCORE
    }

    fn create_descriptor(&self, spec: &GraphTaskSpec) -> Result<TaskDescriptor> {
        let arguments = spec.logical_arguments();
        let working_directory = spec.working_directory();

        let Some(source) = source_file(&arguments) else {
            debug!(task = %spec.key(), "no remotable input found, running locally");
            return Ok(LocalTaskDescriptorFactory::descriptor_for(spec));
        };

        let mut input_files = vec![working_directory.join(source)];
        input_files.extend(
            arguments
                .iter()
                .filter_map(|a| a.strip_prefix('@'))
                .map(|rsp| working_directory.join(rsp)),
        );

        Ok(TaskDescriptor::Remote {
            tool_path: PathBuf::from(&spec.tool.path),
            output_file: output_file(&arguments).map(|o| working_directory.join(o)),
            arguments,
            environment: strip_machine_specific(spec.effective_environment()),
            working_directory,
            input_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::test_support::spec_for;

    #[test]
    fn scores_remotable_compile() {
        let spec = spec_for("/usr/bin/clang", "-c main.cpp -o main.o", true);
        assert_eq!(
            RemoteCompilerTaskDescriptorFactory::default().score(&spec),
            REMOTE_SCORE
        );
    }

    #[test]
    fn declines_when_remoting_not_allowed() {
        let spec = spec_for("/usr/bin/clang", "-c main.cpp -o main.o", false);
        assert_eq!(RemoteCompilerTaskDescriptorFactory::default().score(&spec), DECLINE);
    }

    #[test]
    fn declines_unknown_tools_and_links() {
        let factory = RemoteCompilerTaskDescriptorFactory::default();
        assert_eq!(factory.score(&spec_for("/usr/bin/ld", "main.o -o app", true)), DECLINE);
        assert_eq!(factory.score(&spec_for("/usr/bin/clang", "main.o -o app", true)), DECLINE);
    }

    #[test]
    fn descriptor_lists_inputs_and_output() {
        let mut spec = spec_for(r"C:\VS\cl.exe", "/c Game.cpp /FoGame.obj @Game.rsp", true);
        spec.environment_variables
            .insert("COMPUTERNAME".into(), "BUILD01".into());
        spec.environment_variables.insert("INCLUDE".into(), "x".into());

        let descriptor = RemoteCompilerTaskDescriptorFactory::default()
            .create_descriptor(&spec)
            .unwrap();
        match descriptor {
            TaskDescriptor::Remote {
                input_files,
                output_file,
                environment,
                ..
            } => {
                assert_eq!(
                    input_files,
                    vec![PathBuf::from("/work/Game.cpp"), PathBuf::from("/work/Game.rsp")]
                );
                assert_eq!(output_file, Some(PathBuf::from("/work/Game.obj")));
                assert!(environment.contains_key("INCLUDE"));
                assert!(!environment.contains_key("COMPUTERNAME"));
            }
            other => panic!("unexpected descriptor {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_local_without_source() {
        let spec = spec_for("/usr/bin/clang", "--version", true);
        let descriptor = RemoteCompilerTaskDescriptorFactory::default()
            .create_descriptor(&spec)
            .unwrap();
        assert_eq!(descriptor.kind(), "local");
    }
}
