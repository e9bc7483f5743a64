// src/exec/command.rs

//! External command description and runner.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::plan::{ExecutionId, Stage};

/// A program invocation: argv, extra environment, working directory.
///
/// Built by the stage modules as plain data so the exact command lines can
/// be unit tested and printed by `--dry-run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={} ", quote(value))?;
        }
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) || s.contains('"') {
        format!("{s:?}")
    } else {
        s.to_string()
    }
}

/// Result of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub success: bool,
    pub stdout: Vec<String>,
}

/// Run a command to completion, streaming its output into the log.
///
/// stdout is also captured (the test stage scans it for failures). The child
/// is killed if this future is dropped, e.g. on Ctrl-C.
pub async fn run_command(
    spec: &CommandSpec,
    execution: &ExecutionId,
    stage: Stage,
) -> Result<CommandOutput> {
    info!(%execution, %stage, cmd = %spec, "starting process");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{}' for {execution} ({stage})", spec.program))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let execution = execution.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(%execution, %stage, "stderr: {}", line);
            }
        });
    }

    let stdout_task = child.stdout.take().map(|stdout| {
        let execution = execution.to_string();
        tokio::spawn(async move {
            let mut captured = Vec::new();
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(%execution, %stage, "stdout: {}", line);
                captured.push(line);
            }
            captured
        })
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for '{}' ({execution}, {stage})", spec.program))?;

    let stdout = match stdout_task {
        Some(task) => task.await.context("joining stdout reader")?,
        None => Vec::new(),
    };

    let exit_code = status.code().unwrap_or(-1);
    info!(
        %execution,
        %stage,
        exit_code,
        success = status.success(),
        "process exited"
    );

    Ok(CommandOutput {
        exit_code,
        success: status.success(),
        stdout,
    })
}
