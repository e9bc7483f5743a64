// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{DuplicateAssetPolicy, PipelineKind, PlatformKind};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [project]
/// tool = "capsule"
/// repository = "capsule-app/capsule-cli"
///
/// [pipeline.release]
/// kind = "release"
/// platforms = ["ubuntu-latest", "macos-latest", "windows-latest"]
/// on.push.tags = ["v*"]
/// ```
///
/// Only `[project].tool` and at least one `[pipeline.<name>]` are required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    pub project: ProjectSection,

    #[serde(default)]
    pub toolchain: ToolchainSection,

    #[serde(default)]
    pub release: ReleaseSection,

    #[serde(default)]
    pub coverage: CoverageSection,

    /// Keys are the pipeline names (e.g. `"ci"`, `"release"`).
    #[serde(default)]
    pub pipeline: BTreeMap<String, PipelineConfig>,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub toolchain: ToolchainSection,
    pub release: ReleaseSection,
    pub coverage: CoverageSection,
    pub pipeline: BTreeMap<String, PipelineConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            project: raw.project,
            toolchain: raw.toolchain,
            release: raw.release,
            coverage: raw.coverage,
            pipeline: raw.pipeline,
        }
    }
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Name of the executable being built, e.g. `capsule`.
    pub tool: String,

    /// Archive name prefix. Defaults to `<tool>-cli`.
    #[serde(default)]
    pub artifact_prefix: Option<String>,

    /// `owner/name` slug used by publication and coverage upload.
    #[serde(default)]
    pub repository: Option<String>,

    /// Cargo project to build, relative to the working directory.
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Root under which every execution gets its private directory.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl ProjectSection {
    pub fn effective_artifact_prefix(&self) -> String {
        self.artifact_prefix
            .clone()
            .unwrap_or_else(|| format!("{}-cli", self.tool))
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("target/capsule-ci")
}

/// `[toolchain]` section: the pinned compiler toolchain.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainSection {
    #[serde(default = "default_channel")]
    pub channel: String,

    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default)]
    pub components: Vec<String>,
}

/// Dated nightly the pipelines are pinned to unless configured otherwise.
pub const DEFAULT_CHANNEL: &str = "nightly-2025-06-01";

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_profile() -> String {
    "minimal".to_string()
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            profile: default_profile(),
            components: Vec::new(),
        }
    }
}

/// `[release]` section: where and how archives are published.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_uploads_url")]
    pub uploads_url: String,

    /// Name of the environment variable holding the API token.
    #[serde(default = "default_release_token_env")]
    pub token_env: String,

    /// Regex applied to the tag reference; capture group 1 is the version.
    #[serde(default = "default_version_pattern")]
    pub version_pattern: String,

    #[serde(default)]
    pub on_duplicate_asset: DuplicateAssetPolicy,

    #[serde(default = "default_true")]
    pub create_missing_release: bool,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_uploads_url() -> String {
    "https://uploads.github.com".to_string()
}

fn default_release_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

pub(crate) fn default_version_pattern() -> String {
    r"^(?:refs/tags/)?v(.+)$".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ReleaseSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            uploads_url: default_uploads_url(),
            token_env: default_release_token_env(),
            version_pattern: default_version_pattern(),
            on_duplicate_asset: DuplicateAssetPolicy::default(),
            create_missing_release: true,
        }
    }
}

/// `[coverage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CoverageSection {
    #[serde(default = "default_coverage_url")]
    pub service_url: String,

    #[serde(default = "default_coverage_token_env")]
    pub token_env: String,

    /// Aggregator executable (grcov-compatible command line).
    #[serde(default = "default_aggregator")]
    pub aggregator: String,
}

fn default_coverage_url() -> String {
    "https://codecov.io".to_string()
}

fn default_coverage_token_env() -> String {
    "CODECOV_TOKEN".to_string()
}

fn default_aggregator() -> String {
    "grcov".to_string()
}

impl Default for CoverageSection {
    fn default() -> Self {
        Self {
            service_url: default_coverage_url(),
            token_env: default_coverage_token_env(),
            aggregator: default_aggregator(),
        }
    }
}

/// `[pipeline.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub kind: PipelineKind,

    /// Per-pipeline toolchain channel; falls back to `[toolchain].channel`.
    #[serde(default)]
    pub toolchain: Option<String>,

    /// The environment matrix.
    #[serde(default)]
    pub platforms: Vec<PlatformEntry>,

    /// Trigger predicates.
    #[serde(default)]
    pub on: TriggerSection,
}

impl PipelineConfig {
    pub fn effective_toolchain<'a>(&'a self, default: &'a ToolchainSection) -> &'a str {
        self.toolchain.as_deref().unwrap_or(&default.channel)
    }
}

/// One matrix entry: either a bare identifier or a table.
///
/// ```toml
/// platforms = [
///   "ubuntu-latest",
///   { id = "windows-latest", os = "windows", target = "x86_64-pc-windows-gnu" },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PlatformEntry {
    Name(String),
    Detailed {
        id: String,
        #[serde(default)]
        os: Option<PlatformKind>,
        #[serde(default)]
        target: Option<String>,
    },
}

impl PlatformEntry {
    pub fn id(&self) -> &str {
        match self {
            PlatformEntry::Name(id) => id,
            PlatformEntry::Detailed { id, .. } => id,
        }
    }

    /// Declared OS family, or inferred from the identifier.
    pub fn kind(&self) -> PlatformKind {
        match self {
            PlatformEntry::Detailed { os: Some(kind), .. } => *kind,
            other => PlatformKind::infer(other.id()),
        }
    }

    pub fn target(&self) -> Option<&str> {
        match self {
            PlatformEntry::Name(_) => None,
            PlatformEntry::Detailed { target, .. } => target.as_deref(),
        }
    }
}

/// `[pipeline.<name>.on]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerSection {
    #[serde(default)]
    pub push: Option<PushTrigger>,

    #[serde(default)]
    pub pull_request: Option<PullRequestTrigger>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushTrigger {
    #[serde(default)]
    pub branches: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestTrigger {
    /// Patterns matched against the pull request's target branch.
    #[serde(default)]
    pub branches: Vec<String>,
}
