// src/engine/event_handlers.rs

//! Per-execution transitions of the core runtime.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::engine::report::{ExecutionReport, ExecutionStatus, StageRecord};
use crate::engine::{StageJob, StageOutcome};
use crate::plan::{PlatformExecution, Stage};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these stages to the backend.
    DispatchStages(Vec<StageJob>),
    /// Every execution reached a terminal state.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Mutable progress of one execution through its stage sequence.
#[derive(Debug)]
pub struct ExecutionProgress {
    pub execution: Arc<PlatformExecution>,
    /// Index of the next stage to dispatch.
    next: usize,
    pub status: ExecutionStatus,
    pub stages: Vec<StageRecord>,
    pub artifact: Option<PathBuf>,
}

impl ExecutionProgress {
    pub fn new(execution: Arc<PlatformExecution>) -> Self {
        Self {
            execution,
            next: 0,
            status: ExecutionStatus::Pending,
            stages: Vec::new(),
            artifact: None,
        }
    }

    /// Move to the next stage and return the job for it, or mark the
    /// execution succeeded when the sequence is exhausted.
    pub fn advance(&mut self) -> Option<StageJob> {
        match self.execution.stages().get(self.next) {
            Some(&stage) => {
                self.next += 1;
                self.status = ExecutionStatus::Running(stage);
                debug!(execution = %self.execution.id, %stage, "dispatching stage");
                Some(StageJob {
                    execution: Arc::clone(&self.execution),
                    stage,
                })
            }
            None => {
                self.status = ExecutionStatus::Succeeded;
                info!(execution = %self.execution.id, "execution succeeded");
                None
            }
        }
    }

    pub fn to_report(&self) -> ExecutionReport {
        ExecutionReport {
            id: self.execution.id.clone(),
            status: self.status.clone(),
            stages: self.stages.clone(),
            artifact: self.artifact.clone(),
        }
    }
}

/// Handle a finished stage.
///
/// - Success moves on to the next stage (or finishes the execution).
/// - Failure is terminal for this execution only.
/// - Events for a stage that is not the one in flight are ignored.
pub fn handle_stage_finished(
    progress: &mut ExecutionProgress,
    stage: Stage,
    outcome: StageOutcome,
) -> Option<StageJob> {
    match progress.status {
        ExecutionStatus::Running(current) if current == stage => {}
        ref other => {
            warn!(
                execution = %progress.execution.id,
                %stage,
                status = %other,
                "stage completion does not match execution state; ignoring"
            );
            return None;
        }
    }

    progress.stages.push(StageRecord {
        stage,
        outcome: outcome.clone(),
    });

    match outcome {
        StageOutcome::Success => {
            info!(execution = %progress.execution.id, %stage, "stage succeeded");
            if stage == Stage::Package {
                progress.artifact = progress.execution.archive_path();
            }
            progress.advance()
        }
        StageOutcome::Failed(failure) => {
            error!(
                execution = %progress.execution.id,
                %stage,
                error = %failure,
                "stage failed; execution aborted"
            );
            progress.status = ExecutionStatus::Failed { stage, failure };
            None
        }
    }
}

/// Mark an unfinished execution as cancelled.
pub fn handle_shutdown(progress: &mut ExecutionProgress) {
    let in_flight = match progress.status {
        ExecutionStatus::Running(stage) => Some(stage),
        ExecutionStatus::Pending => None,
        _ => return,
    };
    warn!(execution = %progress.execution.id, "shutdown requested; execution cancelled");
    progress.status = ExecutionStatus::Cancelled { stage: in_flight };
}
