// src/cargo.rs

//! Cargo invocations for the build/test stage.
//!
//! Every command runs in the project's source directory with the execution's
//! private `CARGO_TARGET_DIR` and pinned toolchain, so sibling executions never
//! share build outputs.

use std::sync::OnceLock;

use regex::Regex;

use crate::exec::CommandSpec;
use crate::plan::PlatformExecution;
use crate::toolchain::TOOLCHAIN_ENV;

/// Base `cargo <subcommand>` for an execution.
pub fn cargo(exec: &PlatformExecution, subcommand: &str) -> CommandSpec {
    CommandSpec::new("cargo")
        .arg(subcommand)
        .current_dir(&exec.source_dir)
        .env(TOOLCHAIN_ENV, &exec.toolchain.channel)
        .env("CARGO_TARGET_DIR", exec.target_dir().to_string_lossy())
}

/// `cargo clean`: purge stale outputs before anything is built.
pub fn clean_command(exec: &PlatformExecution) -> CommandSpec {
    cargo(exec, "clean")
}

/// `cargo test` with every optional feature, running the whole suite even
/// after failures.
///
/// Tests always run for the host; a cross-compilation target only applies to
/// the release build.
pub fn test_command(exec: &PlatformExecution) -> CommandSpec {
    cargo(exec, "test").arg("--all-features").arg("--no-fail-fast")
}

/// Optimized build of the executable.
pub fn build_command(exec: &PlatformExecution) -> CommandSpec {
    let mut cmd = cargo(exec, "build").arg("--release");
    if let Some(target) = exec.platform.target.as_deref() {
        cmd = cmd.arg("--target").arg(target);
    }
    cmd
}

fn failed_test_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^test (.+?) \.\.\. FAILED$").expect("literal regex"))
}

/// Names of failing tests reported by libtest, in output order, deduplicated.
pub fn failed_tests<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let re = failed_test_line();
    let mut failed: Vec<String> = Vec::new();
    for line in lines {
        if let Some(caps) = re.captures(line.trim_end()) {
            let name = caps[1].to_string();
            if !failed.contains(&name) {
                failed.push(name);
            }
        }
    }
    failed
}
