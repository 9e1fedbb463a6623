// src/job/loader.rs

use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::job::model::Job;

/// Parse a job document from its textual form.
///
/// Only deserialization happens here. Reference checks (unknown
/// environments, tools, dependencies) and cycle detection are the graph
/// generator's job because they need the whole task set.
pub fn parse_job(document: &str) -> Result<Job> {
    let job: Job = toml::from_str(document)?;
    Ok(job)
}

/// Read and parse a job document from disk.
pub fn load_job(path: impl AsRef<Path>) -> Result<Job> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_job(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::OpenGeError;

    #[test]
    fn parses_environments_projects_and_tasks() {
        let job = parse_job(
            r#"
[environments.Env_0.tools.Tool1_0]
path = "/bin/echo"
params = "ok1"
allow_remote = true
group_prefix = "Test1"

[environments.Env_0.variables]
FOO = "bar"

[projects.Env_0]
env = "Env_0"

[projects.Env_0.tasks.Action1_0]
tool = "Tool1_0"
caption = "Test1"

[projects.Env_0.tasks.Action2_0]
tool = "Tool1_0"
depends_on = "Action1_0"
"#,
        )
        .unwrap();

        assert_eq!(job.task_count(), 2);
        let env = &job.environments["Env_0"];
        assert_eq!(env.variables["FOO"], "bar");
        assert!(env.tools["Tool1_0"].allow_remote);
        let project = &job.projects["Env_0"];
        assert_eq!(project.tasks["Action2_0"].dependency_names(), vec!["Action1_0"]);
    }

    #[test]
    fn uninterpreted_fields_are_accepted() {
        let job = parse_job(
            r#"
[environments.E.tools.Cl]
path = "cl.exe"
output_prefix = "cl: "
auto_recover = ["C1060", "C1076"]
skip_if_project_failed = true

[projects.P]
env = "E"

[projects.P.tasks.A]
tool = "Cl"
source_file = "main.cpp"
skip_if_project_failed = true
"#,
        )
        .unwrap();

        let tool = &job.environments["E"].tools["Cl"];
        assert_eq!(tool.auto_recover.len(), 2);
        assert_eq!(job.projects["P"].tasks["A"].source_file.as_deref(), Some("main.cpp"));
    }

    #[test]
    fn task_without_tool_is_a_toml_error() {
        let err = parse_job(
            r#"
[projects.P]
env = "E"

[projects.P.tasks.A]
caption = "no tool"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, OpenGeError::TomlError(_)));
        assert!(err.is_configuration_error());
    }
}
