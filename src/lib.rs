// src/lib.rs

pub mod cargo;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod package;
pub mod plan;
pub mod publish;
pub mod toolchain;
pub mod trigger;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::coverage::CodecovUploader;
use crate::engine::{CoreRuntime, RunReport, Runtime, RuntimeEvent};
use crate::exec::{RealStageBackend, StageServices, command_for};
use crate::fs::RealFileSystem;
use crate::plan::{PlanFilter, Run, plan_runs};
use crate::publish::GithubPublisher;
use crate::trigger::TriggerEvent;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - trigger evaluation and matrix planning
/// - core runtime / stage backend
/// - Ctrl-C handling
///
/// Returns one report per started run; empty when no pipeline was admitted
/// or in `--dry-run` mode.
pub async fn run(args: CliArgs) -> Result<Vec<RunReport>> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    anchor_paths(&mut cfg, &config_root_dir(&config_path));

    let event = TriggerEvent::from_parts(
        args.event,
        &args.git_ref,
        args.base.as_deref(),
        args.sha.as_deref(),
    )?;
    let filter = PlanFilter {
        pipelines: args.pipelines.clone(),
        platforms: args.platforms.clone(),
    };

    let runs = plan_runs(&cfg, &event, &filter)?;
    if runs.is_empty() {
        info!(event = %event.kind, git_ref = %event.git_ref, "no pipeline admitted this event");
        return Ok(Vec::new());
    }

    if args.dry_run {
        print_dry_run(&cfg, &event, &runs);
        return Ok(Vec::new());
    }

    let services = Arc::new(StageServices {
        fs: Arc::new(RealFileSystem),
        publisher: Arc::new(GithubPublisher::from_config(&cfg.release)?),
        uploader: Arc::new(CodecovUploader::from_config(&cfg.coverage)?),
        coverage: cfg.coverage.clone(),
    });

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let backend = RealStageBackend::new(rt_tx.clone(), services);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    let core = CoreRuntime::new(runs);
    let runtime = Runtime::new(core, rt_rx, backend);
    let reports = runtime.run().await?;

    print_summary(&reports);
    Ok(reports)
}

/// Directory that relative `source_dir`/`work_dir` are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "ci/capsule-ci.toml"),
///   we use that directory.
/// - If it's just a bare filename (parent = ""), we fall back to the current
///   working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Make project paths independent of the directory each command runs in.
fn anchor_paths(cfg: &mut ConfigFile, root: &Path) {
    let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    for dir in [&mut cfg.project.source_dir, &mut cfg.project.work_dir] {
        if dir.is_relative() {
            *dir = root.join(&*dir);
        }
    }
    debug!(
        source_dir = %cfg.project.source_dir.display(),
        work_dir = %cfg.project.work_dir.display(),
        "resolved project paths"
    );
}

/// Print the planned runs, their executions and what every stage would do.
fn print_dry_run(cfg: &ConfigFile, event: &TriggerEvent, runs: &[Run]) {
    println!("capsule-ci dry-run");
    println!("  event = {} {}", event.kind, event.git_ref);
    if let Some(base) = &event.base {
        println!("  base = {base}");
    }
    println!();

    for run in runs {
        println!("run {} ({}, {} platform(s)):", run.pipeline, run.kind, run.executions.len());
        for exec in &run.executions {
            println!("  - {}", exec.id);
            println!("      toolchain: {}", exec.toolchain.channel);
            println!("      work_dir: {}", exec.work_dir.display());
            if let Some(version) = &exec.version {
                println!("      version: {version}");
            }
            if let Some(name) = exec.archive_name() {
                println!("      archive: {name}");
            }
            for stage in exec.stages() {
                match command_for(exec, *stage, &cfg.coverage) {
                    Some(cmd) => println!("      {stage}: {cmd}"),
                    None => println!("      {stage}: (in-process)"),
                }
            }
        }
    }

    debug!("dry-run complete (no execution)");
}

fn print_summary(reports: &[RunReport]) {
    for run in reports {
        let verdict = if run.succeeded() { "succeeded" } else { "FAILED" };
        println!("{} ({}): {verdict}", run.pipeline, run.kind);
        for exec in &run.executions {
            println!("  {}: {}", exec.id, exec.status);
            if let Some(artifact) = &exec.artifact {
                println!("    artifact: {}", artifact.display());
            }
        }
    }
}
