// src/factory/copy.rs

use std::path::{Path, PathBuf};

use crate::errors::{OpenGeError, Result};
use crate::factory::{DECLINE, TaskDescriptor, TaskDescriptorFactory};
use crate::graph::GraphTaskSpec;

const COPY_SCORE: i32 = 100;

/// Recognises plain single-file copies (`cmd.exe /C copy SRC DST` or
/// `cp SRC DST`) and runs them in-process instead of spawning a shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCopyTaskDescriptorFactory;

impl FileCopyTaskDescriptorFactory {
    fn copy_operands(spec: &GraphTaskSpec) -> Option<(String, String)> {
        let stem = tool_stem(&spec.tool.path)?;
        let args = spec.logical_arguments();

        let operands: &[String] = match stem.as_str() {
            "cmd" => {
                let rest = match args.as_slice() {
                    [c, copy, rest @ ..]
                        if c.eq_ignore_ascii_case("/c") && copy.eq_ignore_ascii_case("copy") =>
                    {
                        rest
                    }
                    _ => return None,
                };
                match rest {
                    [y, rest @ ..] if y.eq_ignore_ascii_case("/y") => rest,
                    rest => rest,
                }
            }
            "cp" => args.as_slice(),
            _ => return None,
        };

        match operands {
            [from, to] => Some((from.clone(), to.clone())),
            _ => None,
        }
    }
}

// Wildcards and option-looking operands need the real tool.
fn is_plain(from: &str, to: &str) -> bool {
    !from.starts_with('-') && !to.starts_with('-') && !from.contains('*') && !from.contains('?')
}

pub(crate) fn tool_stem(path: &str) -> Option<String> {
    let name = path.rsplit(['/', '\\']).next()?;
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case("exe") => stem,
        _ => name,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_ascii_lowercase())
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    base.join(path)
}

impl TaskDescriptorFactory for FileCopyTaskDescriptorFactory {
    fn name(&self) -> &'static str {
        "file-copy"
    }

    fn score(&self, spec: &GraphTaskSpec) -> i32 {
        match Self::copy_operands(spec) {
            Some((from, to)) if is_plain(&from, &to) => COPY_SCORE,
            _ => DECLINE,
        }
    }

    fn create_descriptor(&self, spec: &GraphTaskSpec) -> Result<TaskDescriptor> {
        let (from, to) = Self::copy_operands(spec).ok_or_else(|| {
            OpenGeError::NoCapableFactory(format!("{} is not a single-file copy", spec.key()))
        })?;
        let base = spec.working_directory();
        Ok(TaskDescriptor::Copy {
            from: resolve(&base, &from),
            to: resolve(&base, &to),
        })
    }
}
