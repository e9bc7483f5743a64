// src/toolchain.rs

//! Toolchain provisioner.
//!
//! Installs the pinned channel with `rustup` and pins every later command of
//! the execution to it through `RUSTUP_TOOLCHAIN`, which takes precedence over
//! any default or directory override already present on the host.

use crate::config::model::{PipelineConfig, ToolchainSection};
use crate::coverage::LLVM_TOOLS_COMPONENT;
use crate::exec::CommandSpec;
use crate::types::PipelineKind;

/// Environment variable rustup reads to select the active toolchain.
pub const TOOLCHAIN_ENV: &str = "RUSTUP_TOOLCHAIN";

/// Pinned toolchain for one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSpec {
    pub channel: String,
    pub profile: String,
    pub components: Vec<String>,
}

impl ToolchainSpec {
    /// Coverage pipelines always get the llvm tools their aggregation needs.
    pub fn for_pipeline(pipeline: &PipelineConfig, defaults: &ToolchainSection) -> Self {
        let mut components = defaults.components.clone();
        if pipeline.kind == PipelineKind::Coverage
            && !components.iter().any(|c| c == LLVM_TOOLS_COMPONENT)
        {
            components.push(LLVM_TOOLS_COMPONENT.to_string());
        }
        Self {
            channel: pipeline.effective_toolchain(defaults).to_string(),
            profile: defaults.profile.clone(),
            components,
        }
    }

    /// `rustup toolchain install`, which is a no-op when already installed.
    ///
    /// `target` adds the standard library for a cross-compilation triple.
    pub fn install_command(&self, target: Option<&str>) -> CommandSpec {
        let mut cmd = CommandSpec::new("rustup")
            .arg("toolchain")
            .arg("install")
            .arg(&self.channel)
            .arg("--profile")
            .arg(&self.profile)
            .arg("--no-self-update");

        for component in &self.components {
            cmd = cmd.arg("--component").arg(component);
        }
        if let Some(target) = target {
            cmd = cmd.arg("--target").arg(target);
        }
        cmd
    }
}
