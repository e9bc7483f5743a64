// src/config/mod.rs

//! Configuration loading and validation for capsule-ci.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate pipelines, platforms and trigger patterns (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{
    ConfigFile, CoverageSection, PipelineConfig, PlatformEntry, ProjectSection,
    PullRequestTrigger, PushTrigger, RawConfigFile, ReleaseSection, ToolchainSection,
    TriggerSection,
};
