// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `openge`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "openge",
    version,
    about = "Build-graph dispatcher: accepts job graphs and executes them locally.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `OPENGE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Start the dispatcher and serve until Ctrl-C.
    Serve {
        /// Path to the dispatcher settings (TOML).
        #[arg(long, value_name = "PATH", default_value = "openge.toml")]
        config: PathBuf,

        /// Endpoint name; overrides `[dispatcher] pipe_name`.
        #[arg(long, value_name = "NAME")]
        pipe: Option<String>,
    },

    /// Submit a job to a running dispatcher and stream its output.
    Submit {
        #[arg(long, value_name = "NAME")]
        pipe: String,

        /// Job document (TOML).
        #[arg(long, value_name = "FILE")]
        job: PathBuf,

        /// Working directory for tasks. Defaults to the current directory.
        #[arg(long, value_name = "DIR")]
        working_dir: Option<PathBuf>,

        /// Extra environment variable for every task, as `KEY=VALUE`.
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        env: Vec<(String, String)>,

        /// Name reported as the build node.
        #[arg(long, value_name = "NAME")]
        node: Option<String>,
    },

    /// Parse a job and print its graph without executing anything.
    Validate {
        #[arg(long, value_name = "FILE")]
        job: PathBuf,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
