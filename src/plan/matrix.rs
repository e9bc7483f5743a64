// src/plan/matrix.rs

//! Environment matrix: expand admitted pipelines into platform executions.

use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, PipelineConfig, PlatformEntry};
use crate::errors::{CapsuleCiError, Result};
use crate::plan::execution::{ExecutionId, Platform, PlatformExecution};
use crate::toolchain::ToolchainSpec;
use crate::trigger::{GitRef, TriggerEvent, TriggerGate, VersionExtractor, VersionTag};
use crate::types::PipelineKind;

/// One pipeline invocation for one event.
#[derive(Debug, Clone)]
pub struct Run {
    pub pipeline: String,
    pub kind: PipelineKind,
    pub event: TriggerEvent,
    pub executions: Vec<PlatformExecution>,
}

/// Optional narrowing of what gets planned (CLI `--pipeline` / `--platform`).
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub pipelines: Vec<String>,
    pub platforms: Vec<String>,
}

impl PlanFilter {
    fn wants_pipeline(&self, name: &str) -> bool {
        self.pipelines.is_empty() || self.pipelines.iter().any(|p| p == name)
    }

    fn wants_platform(&self, id: &str) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|p| p == id)
    }
}

/// Evaluate every pipeline's trigger gate against `event` and expand the
/// admitted ones into runs.
///
/// Pipelines whose gate rejects the event are skipped silently (info log).
/// An empty result means nothing should run.
pub fn plan_runs(cfg: &ConfigFile, event: &TriggerEvent, filter: &PlanFilter) -> Result<Vec<Run>> {
    for name in filter.pipelines.iter() {
        if !cfg.pipeline.contains_key(name) {
            return Err(CapsuleCiError::PipelineNotFound(name.clone()));
        }
    }

    let extractor = VersionExtractor::new(&cfg.release.version_pattern)?;
    let mut runs = Vec::new();

    for (name, pipeline) in cfg.pipeline.iter() {
        if !filter.wants_pipeline(name) {
            continue;
        }

        let gate = TriggerGate::from_pipeline(pipeline)?;
        if !gate.admits(event) {
            info!(pipeline = %name, event = %event.kind, git_ref = %event.git_ref, "trigger gate closed; pipeline not started");
            continue;
        }

        let version = match pipeline.kind {
            PipelineKind::Release => match release_version(&extractor, event) {
                Some(v) => Some(v),
                None => {
                    warn!(
                        pipeline = %name,
                        git_ref = %event.git_ref,
                        pattern = %cfg.release.version_pattern,
                        "tag matched the trigger but no version could be derived; pipeline not started"
                    );
                    continue;
                }
            },
            _ => None,
        };

        let executions = expand_matrix(cfg, name, pipeline, event, version.as_ref(), filter);
        if executions.is_empty() {
            info!(pipeline = %name, "no matrix entries left after --platform filter");
            continue;
        }

        debug!(pipeline = %name, count = executions.len(), "expanded matrix");
        runs.push(Run {
            pipeline: name.clone(),
            kind: pipeline.kind,
            event: event.clone(),
            executions,
        });
    }

    Ok(runs)
}

fn release_version(extractor: &VersionExtractor, event: &TriggerEvent) -> Option<VersionTag> {
    match &event.git_ref {
        GitRef::Tag(_) => extractor.derive(&event.git_ref.full_name()),
        _ => None,
    }
}

fn expand_matrix(
    cfg: &ConfigFile,
    pipeline_name: &str,
    pipeline: &PipelineConfig,
    event: &TriggerEvent,
    version: Option<&VersionTag>,
    filter: &PlanFilter,
) -> Vec<PlatformExecution> {
    let toolchain = ToolchainSpec::for_pipeline(pipeline, &cfg.toolchain);
    let tag = match (&event.git_ref, version) {
        (GitRef::Tag(name), Some(_)) => Some(name.clone()),
        _ => None,
    };

    pipeline
        .platforms
        .iter()
        .filter(|entry| filter.wants_platform(entry.id()))
        .map(|entry| PlatformExecution {
            id: ExecutionId::new(pipeline_name, entry.id()),
            kind: pipeline.kind,
            platform: platform_from_entry(entry),
            toolchain: toolchain.clone(),
            version: version.cloned(),
            tag: tag.clone(),
            tool: cfg.project.tool.clone(),
            artifact_prefix: cfg.project.effective_artifact_prefix(),
            repository: cfg.project.repository.clone(),
            source_dir: cfg.project.source_dir.clone(),
            work_dir: cfg.project.work_dir.join(pipeline_name).join(entry.id()),
            revision: event.revision.clone(),
            branch: event.branch().map(str::to_string),
        })
        .collect()
}

fn platform_from_entry(entry: &PlatformEntry) -> Platform {
    Platform {
        id: entry.id().to_string(),
        kind: entry.kind(),
        target: entry.target().map(str::to_string),
    }
}
