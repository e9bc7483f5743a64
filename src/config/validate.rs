// src/config/validate.rs

use std::collections::HashSet;

use regex::Regex;

use crate::config::model::{ConfigFile, PipelineConfig, RawConfigFile, ToolchainSection};
use crate::coverage::channel_supports_instrumentation;
use crate::errors::{CapsuleCiError, Result};
use crate::trigger::patterns::RefPatternSet;
use crate::types::PipelineKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = CapsuleCiError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_project(cfg)?;
    ensure_has_pipelines(cfg)?;
    validate_version_pattern(&cfg.release.version_pattern)?;
    for (name, pipeline) in cfg.pipeline.iter() {
        validate_platforms(name, pipeline)?;
        validate_triggers(name, pipeline)?;
        validate_coverage_toolchain(name, pipeline, &cfg.toolchain)?;
    }
    Ok(())
}

fn config_error(msg: impl Into<String>) -> CapsuleCiError {
    CapsuleCiError::ConfigError(msg.into())
}

fn validate_project(cfg: &RawConfigFile) -> Result<()> {
    if cfg.project.tool.trim().is_empty() {
        return Err(config_error("[project].tool must not be empty"));
    }
    if let Some(prefix) = &cfg.project.artifact_prefix {
        if !is_file_name_safe(prefix) {
            return Err(config_error(format!(
                "[project].artifact_prefix '{prefix}' is not usable in a file name"
            )));
        }
    }
    if let Some(repo) = &cfg.project.repository {
        let parts: Vec<_> = repo.split('/').collect();
        if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(config_error(format!(
                "[project].repository must look like 'owner/name' (got '{repo}')"
            )));
        }
    }
    Ok(())
}

fn ensure_has_pipelines(cfg: &RawConfigFile) -> Result<()> {
    if cfg.pipeline.is_empty() {
        return Err(config_error(
            "config must contain at least one [pipeline.<name>] section",
        ));
    }
    Ok(())
}

fn validate_version_pattern(pattern: &str) -> Result<()> {
    let re = Regex::new(pattern).map_err(|e| {
        config_error(format!("[release].version_pattern does not compile: {e}"))
    })?;
    if re.captures_len() < 2 {
        return Err(config_error(
            "[release].version_pattern needs a capture group for the version",
        ));
    }
    Ok(())
}

fn validate_platforms(name: &str, pipeline: &PipelineConfig) -> Result<()> {
    if pipeline.platforms.is_empty() {
        return Err(config_error(format!(
            "pipeline '{name}' must list at least one platform"
        )));
    }

    let mut seen = HashSet::new();
    for entry in pipeline.platforms.iter() {
        let id = entry.id();
        if !is_file_name_safe(id) {
            return Err(config_error(format!(
                "pipeline '{name}' has platform '{id}' which is not usable in a file name"
            )));
        }
        if !seen.insert(id) {
            return Err(config_error(format!(
                "pipeline '{name}' lists platform '{id}' more than once"
            )));
        }
    }
    Ok(())
}

fn validate_triggers(name: &str, pipeline: &PipelineConfig) -> Result<()> {
    let push = pipeline.on.push.clone().unwrap_or_default();
    let pr = pipeline.on.pull_request.clone().unwrap_or_default();

    for patterns in [&push.branches, &push.tags, &pr.branches] {
        RefPatternSet::compile(patterns).map_err(|e| {
            config_error(format!("pipeline '{name}' has an invalid trigger pattern: {e}"))
        })?;
    }

    if push.branches.is_empty() && push.tags.is_empty() && pr.branches.is_empty() {
        return Err(config_error(format!(
            "pipeline '{name}' has no trigger in [pipeline.{name}.on]"
        )));
    }

    if pipeline.kind == PipelineKind::Release {
        if push.tags.is_empty() {
            return Err(config_error(format!(
                "release pipeline '{name}' must trigger on pushed tags (on.push.tags)"
            )));
        }
        if !push.branches.is_empty() || !pr.branches.is_empty() {
            return Err(config_error(format!(
                "release pipeline '{name}' may only trigger on pushed tags"
            )));
        }
    }

    Ok(())
}

fn validate_coverage_toolchain(
    name: &str,
    pipeline: &PipelineConfig,
    defaults: &ToolchainSection,
) -> Result<()> {
    if pipeline.kind != PipelineKind::Coverage {
        return Ok(());
    }
    let channel = pipeline.effective_toolchain(defaults);
    if !channel_supports_instrumentation(channel) {
        return Err(config_error(format!(
            "coverage pipeline '{name}' needs a nightly toolchain for its instrumentation flags (got '{channel}')"
        )));
    }
    Ok(())
}

/// Platform ids and prefixes end up verbatim in archive names.
fn is_file_name_safe(s: &str) -> bool {
    !s.is_empty()
        && !s
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
}
