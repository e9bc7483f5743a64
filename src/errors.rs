// src/errors.rs

//! Crate-wide error types.
//!
//! [`CapsuleCiError`] covers everything that stops the tool before or around
//! a run (bad config, bad trigger input). [`StageFailure`] is the typed
//! outcome of a single failed stage inside one platform execution; it never
//! escapes that execution.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CapsuleCiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CapsuleCiError>;

/// Why a stage failed. Fatal to the execution it happened in, and only to it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    #[error("toolchain provisioning failed: {0}")]
    Provisioning(String),

    #[error("build failed: {0}")]
    Build(String),

    /// The suite ran to completion; `failed` lists every failing test that
    /// could be read from the output.
    #[error("{} failing test(s) (exit code {exit_code}): {}", failed.len(), failed.join(", "))]
    Test { failed: Vec<String>, exit_code: i32 },

    #[error("packaging failed: {0}")]
    Packaging(String),

    #[error("publication failed: {0}")]
    Publication(String),

    #[error("coverage failed: {0}")]
    Coverage(String),

    #[error("cancelled before completion")]
    Cancelled,
}
