// src/plan/execution.rs

//! A single (run, platform) unit of work.

use std::fmt;
use std::path::PathBuf;

use crate::package;
use crate::plan::stage::Stage;
use crate::toolchain::ToolchainSpec;
use crate::trigger::VersionTag;
use crate::types::{PipelineKind, PlatformKind};

/// `<pipeline>/<platform>`, unique across everything planned for one event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId {
    pub pipeline: String,
    pub platform: String,
}

impl ExecutionId {
    pub fn new(pipeline: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            platform: platform.into(),
        }
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pipeline, self.platform)
    }
}

/// A matrix platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Identifier as written in the config, e.g. `windows-latest`.
    pub id: String,
    pub kind: PlatformKind,
    /// Cross-compilation triple for the release build.
    pub target: Option<String>,
}

/// Everything one isolated execution needs. Built once by the matrix and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PlatformExecution {
    pub id: ExecutionId,
    pub kind: PipelineKind,
    pub platform: Platform,
    pub toolchain: ToolchainSpec,
    /// Set for release executions only.
    pub version: Option<VersionTag>,
    /// Short name of the triggering tag (`v1.2.3`), addressing the release.
    pub tag: Option<String>,
    pub tool: String,
    pub artifact_prefix: String,
    /// `owner/name` of the project repository.
    pub repository: Option<String>,
    pub source_dir: PathBuf,
    /// Private directory of this execution.
    pub work_dir: PathBuf,
    pub revision: Option<String>,
    pub branch: Option<String>,
}

impl PlatformExecution {
    pub fn stages(&self) -> &'static [Stage] {
        Stage::sequence_for(self.kind)
    }

    pub fn target_dir(&self) -> PathBuf {
        self.work_dir.join("target")
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.work_dir.join("dist")
    }

    pub fn coverage_dir(&self) -> PathBuf {
        self.work_dir.join("coverage")
    }

    pub fn lcov_path(&self) -> PathBuf {
        self.coverage_dir().join("lcov.info")
    }

    pub fn binary_name(&self) -> String {
        self.platform.kind.binary_name(&self.tool)
    }

    /// Where `cargo build --release` leaves the executable.
    pub fn binary_path(&self) -> PathBuf {
        let mut dir = self.target_dir();
        if let Some(target) = &self.platform.target {
            dir.push(target);
        }
        dir.join("release").join(self.binary_name())
    }

    /// Archive file name; `None` outside release executions.
    pub fn archive_name(&self) -> Option<String> {
        self.version
            .as_ref()
            .map(|v| package::archive_name(&self.artifact_prefix, &self.platform.id, v))
    }

    pub fn archive_path(&self) -> Option<PathBuf> {
        self.archive_name().map(|name| self.dist_dir().join(name))
    }
}
