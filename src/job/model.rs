// src/job/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// A submitted build job: a set of tool environments and the projects whose
/// tasks invoke those tools.
///
/// ```toml
/// [environments.Env_0.tools.Compile]
/// path = "/usr/bin/clang"
/// params = "-c main.c -o main.o"
///
/// [projects.Game]
/// env = "Env_0"
///
/// [projects.Game.tasks.CompileMain]
/// tool = "Compile"
/// caption = "main.c"
///
/// [projects.Game.tasks.Link]
/// tool = "Link"
/// depends_on = "CompileMain"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Job {
    #[serde(default)]
    pub environments: BTreeMap<String, JobEnvironment>,

    #[serde(default)]
    pub projects: BTreeMap<String, JobProject>,
}

impl Job {
    /// Total number of tasks across all projects.
    pub fn task_count(&self) -> usize {
        self.projects.values().map(|p| p.tasks.len()).sum()
    }
}

/// `[environments.<name>]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobEnvironment {
    #[serde(default)]
    pub tools: BTreeMap<String, JobTool>,

    /// Environment variables applied on top of the submission's variables.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// `[environments.<env>.tools.<name>]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobTool {
    /// Executable to run.
    pub path: String,

    /// Raw parameter string; split into arguments during graph generation.
    #[serde(default)]
    pub params: String,

    /// Whether this tool may be executed on a remote worker.
    #[serde(default)]
    pub allow_remote: bool,

    // The fields below are accepted so existing job documents load; the
    // dispatcher does not interpret them.
    #[serde(default)]
    pub group_prefix: Option<String>,

    #[serde(default)]
    pub output_prefix: Option<String>,

    #[serde(default)]
    pub auto_recover: Vec<String>,

    #[serde(default)]
    pub skip_if_project_failed: bool,
}

/// `[projects.<name>]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobProject {
    /// Name of the environment whose tools the tasks use.
    pub env: String,

    #[serde(default)]
    pub tasks: BTreeMap<String, JobTask>,
}

/// `[projects.<project>.tasks.<name>]`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobTask {
    /// Name of the tool (within the project's environment) to invoke.
    pub tool: String,

    #[serde(default)]
    pub caption: Option<String>,

    /// Accepted for document compatibility; not interpreted.
    #[serde(default)]
    pub source_file: Option<String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    /// Semicolon-separated names of tasks in the same project.
    #[serde(default)]
    pub depends_on: Option<String>,

    /// Accepted for document compatibility; fail-fast already covers it.
    #[serde(default)]
    pub skip_if_project_failed: bool,
}

impl JobTask {
    /// Dependency names, trimmed, with empty entries removed.
    pub fn dependency_names(&self) -> Vec<&str> {
        self.depends_on
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_names_ignore_blank_segments() {
        let task = JobTask {
            tool: "t".into(),
            depends_on: Some(" A ;;B; ".into()),
            ..Default::default()
        };
        assert_eq!(task.dependency_names(), vec!["A", "B"]);
    }

    #[test]
    fn missing_depends_on_means_no_dependencies() {
        let task = JobTask {
            tool: "t".into(),
            ..Default::default()
        };
        assert!(task.dependency_names().is_empty());
    }
}
