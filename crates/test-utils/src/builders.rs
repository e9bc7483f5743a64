#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use capsule_ci::config::{
    ConfigFile, CoverageSection, PipelineConfig, PlatformEntry, ProjectSection,
    PullRequestTrigger, PushTrigger, RawConfigFile, ReleaseSection, ToolchainSection,
    TriggerSection,
};
use capsule_ci::config::model::DEFAULT_CHANNEL;
use capsule_ci::plan::{ExecutionId, Platform, PlatformExecution};
use capsule_ci::toolchain::ToolchainSpec;
use capsule_ci::trigger::VersionExtractor;
use capsule_ci::types::{DuplicateAssetPolicy, PipelineKind, PlatformKind};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(tool: &str) -> Self {
        Self {
            config: RawConfigFile {
                project: ProjectSection {
                    tool: tool.to_string(),
                    artifact_prefix: None,
                    repository: Some("acme/capsule".to_string()),
                    source_dir: PathBuf::from("."),
                    work_dir: PathBuf::from("target/capsule-ci"),
                },
                toolchain: ToolchainSection::default(),
                release: ReleaseSection::default(),
                coverage: CoverageSection::default(),
                pipeline: BTreeMap::new(),
            },
        }
    }

    pub fn with_pipeline(mut self, name: &str, pipeline: PipelineConfig) -> Self {
        self.config.pipeline.insert(name.to_string(), pipeline);
        self
    }

    pub fn with_artifact_prefix(mut self, prefix: &str) -> Self {
        self.config.project.artifact_prefix = Some(prefix.to_string());
        self
    }

    pub fn with_repository(mut self, slug: Option<&str>) -> Self {
        self.config.project.repository = slug.map(str::to_string);
        self
    }

    pub fn with_work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.project.work_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_version_pattern(mut self, pattern: &str) -> Self {
        self.config.release.version_pattern = pattern.to_string();
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicateAssetPolicy) -> Self {
        self.config.release.on_duplicate_asset = policy;
        self
    }

    /// The unvalidated config, for tests that expect validation to fail.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `PipelineConfig`.
pub struct PipelineBuilder {
    pipeline: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new(kind: PipelineKind) -> Self {
        Self {
            pipeline: PipelineConfig {
                kind,
                toolchain: None,
                platforms: Vec::new(),
                on: TriggerSection::default(),
            },
        }
    }

    pub fn platform(mut self, id: &str) -> Self {
        self.pipeline.platforms.push(PlatformEntry::Name(id.to_string()));
        self
    }

    pub fn cross_platform(mut self, id: &str, os: PlatformKind, target: &str) -> Self {
        self.pipeline.platforms.push(PlatformEntry::Detailed {
            id: id.to_string(),
            os: Some(os),
            target: Some(target.to_string()),
        });
        self
    }

    pub fn toolchain(mut self, channel: &str) -> Self {
        self.pipeline.toolchain = Some(channel.to_string());
        self
    }

    pub fn on_push_branches(mut self, patterns: &[&str]) -> Self {
        let push = self.pipeline.on.push.get_or_insert_with(PushTrigger::default);
        push.branches = patterns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn on_push_tags(mut self, patterns: &[&str]) -> Self {
        let push = self.pipeline.on.push.get_or_insert_with(PushTrigger::default);
        push.tags = patterns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn on_pull_request(mut self, patterns: &[&str]) -> Self {
        self.pipeline.on.pull_request = Some(PullRequestTrigger {
            branches: patterns.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.pipeline
    }
}

/// Builder for a single `PlatformExecution`, bypassing config and planning.
pub struct ExecutionBuilder {
    exec: PlatformExecution,
}

impl ExecutionBuilder {
    pub fn new(pipeline: &str, platform_id: &str, kind: PipelineKind) -> Self {
        Self {
            exec: PlatformExecution {
                id: ExecutionId::new(pipeline, platform_id),
                kind,
                platform: Platform {
                    id: platform_id.to_string(),
                    kind: PlatformKind::infer(platform_id),
                    target: None,
                },
                toolchain: ToolchainSpec {
                    channel: DEFAULT_CHANNEL.to_string(),
                    profile: "minimal".to_string(),
                    components: Vec::new(),
                },
                version: None,
                tag: None,
                tool: "capsule".to_string(),
                artifact_prefix: "capsule-cli".to_string(),
                repository: Some("acme/capsule".to_string()),
                source_dir: PathBuf::from("."),
                work_dir: PathBuf::from("target/capsule-ci")
                    .join(pipeline)
                    .join(platform_id),
                revision: None,
                branch: None,
            },
        }
    }

    /// Release version, as if derived from tag `v<version>`.
    pub fn version(mut self, version: &str) -> Self {
        let tag = format!("v{version}");
        self.exec.version = VersionExtractor::new(r"^v(.+)$")
            .expect("literal pattern")
            .derive(&tag);
        self.exec.tag = Some(tag);
        self
    }

    pub fn target(mut self, triple: &str) -> Self {
        self.exec.platform.target = Some(triple.to_string());
        self
    }

    pub fn work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.exec.work_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn revision(mut self, sha: &str) -> Self {
        self.exec.revision = Some(sha.to_string());
        self
    }

    pub fn build(self) -> PlatformExecution {
        self.exec
    }
}
