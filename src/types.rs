// src/types.rs

//! Small closed enumerations shared by config, planning and execution.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Operating-system family of a matrix platform.
///
/// This is the only branching rule in the pipelines: it decides which binary
/// file name gets packaged. Keep every `.exe` decision behind this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Linux, macOS and anything else producing extension-less binaries.
    #[serde(alias = "linux", alias = "macos", alias = "unix")]
    Posix,
    Windows,
}

impl PlatformKind {
    /// Infer the kind from a platform identifier such as `windows-latest`.
    pub fn infer(platform_id: &str) -> Self {
        if platform_id.to_ascii_lowercase().contains("windows") {
            PlatformKind::Windows
        } else {
            PlatformKind::Posix
        }
    }

    /// File name of the built executable for `tool` on this platform.
    pub fn binary_name(self, tool: &str) -> String {
        match self {
            PlatformKind::Windows => format!("{tool}.exe"),
            PlatformKind::Posix => tool.to_string(),
        }
    }
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::Posix => f.write_str("posix"),
            PlatformKind::Windows => f.write_str("windows"),
        }
    }
}

/// The three pipeline shapes. Each kind has a fixed stage sequence, see
/// [`crate::plan::Stage::sequence_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Ci,
    Release,
    Coverage,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Ci => f.write_str("ci"),
            PipelineKind::Release => f.write_str("release"),
            PipelineKind::Coverage => f.write_str("coverage"),
        }
    }
}

/// Kind of event that may trigger a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    PullRequest,
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "push" => Ok(EventKind::Push),
            "pull_request" | "pull-request" | "pr" => Ok(EventKind::PullRequest),
            other => Err(format!(
                "invalid event kind: {other} (expected \"push\" or \"pull_request\")"
            )),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => f.write_str("push"),
            EventKind::PullRequest => f.write_str("pull_request"),
        }
    }
}

/// What the publisher does when the release already carries an asset with the
/// archive's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateAssetPolicy {
    /// Report a publication failure and leave the existing asset untouched.
    Fail,
    /// Delete the existing asset, then upload.
    Overwrite,
}

impl Default for DuplicateAssetPolicy {
    fn default() -> Self {
        DuplicateAssetPolicy::Fail
    }
}
