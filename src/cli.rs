// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The trigger flags fall back to the environment variables a GitHub Actions
//! runner exports, so inside a workflow `capsule-ci` needs no arguments.

use clap::{Parser, ValueEnum};

use crate::types::EventKind;

/// Command-line arguments for `capsule-ci`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "capsule-ci",
    version,
    about = "Build, test, package, release and measure coverage for the capsule CLI.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "capsule-ci.toml")]
    pub config: String,

    /// Kind of the triggering event (push, pull_request).
    #[arg(long, value_name = "KIND", env = "GITHUB_EVENT_NAME", default_value = "push")]
    pub event: EventKind,

    /// Triggering reference, e.g. `refs/heads/main` or `refs/tags/v1.2.3`.
    #[arg(long = "ref", value_name = "REF", env = "GITHUB_REF")]
    pub git_ref: String,

    /// Target branch of a pull request.
    #[arg(long, value_name = "BRANCH", env = "GITHUB_BASE_REF")]
    pub base: Option<String>,

    /// Commit being built; needed for coverage uploads.
    #[arg(long, value_name = "SHA", env = "GITHUB_SHA")]
    pub sha: Option<String>,

    /// Only consider these pipelines (repeatable).
    #[arg(long = "pipeline", value_name = "NAME")]
    pub pipelines: Vec<String>,

    /// Only run these matrix platforms (repeatable).
    #[arg(long = "platform", value_name = "ID")]
    pub platforms: Vec<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `CAPSULE_CI_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate, plan and print the runs and their commands without executing
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
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
