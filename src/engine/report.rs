// src/engine/report.rs

//! Outcome of runs and executions, as shown to the user at the end.

use std::fmt;
use std::path::PathBuf;

use crate::engine::StageOutcome;
use crate::errors::StageFailure;
use crate::plan::{ExecutionId, Stage};
use crate::types::PipelineKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// No stage dispatched yet.
    Pending,
    Running(Stage),
    Succeeded,
    Failed { stage: Stage, failure: StageFailure },
    /// Stopped by shutdown; `stage` is the one that was in flight.
    Cancelled { stage: Option<Stage> },
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Succeeded
                | ExecutionStatus::Failed { .. }
                | ExecutionStatus::Cancelled { .. }
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Pending => f.write_str("pending"),
            ExecutionStatus::Running(stage) => write!(f, "running {stage}"),
            ExecutionStatus::Succeeded => f.write_str("succeeded"),
            ExecutionStatus::Failed { stage, failure } => {
                write!(f, "failed at {stage}: {failure}")
            }
            ExecutionStatus::Cancelled { stage: Some(stage) } => {
                write!(f, "cancelled during {stage}")
            }
            ExecutionStatus::Cancelled { stage: None } => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub id: ExecutionId,
    pub status: ExecutionStatus,
    pub stages: Vec<StageRecord>,
    /// Archive produced by a successful package stage.
    pub artifact: Option<PathBuf>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    pub fn completed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|r| r.outcome.is_success())
            .map(|r| r.stage)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline: String,
    pub kind: PipelineKind,
    pub executions: Vec<ExecutionReport>,
}

impl RunReport {
    /// A run fails as soon as any of its executions did not succeed.
    pub fn succeeded(&self) -> bool {
        self.executions.iter().all(ExecutionReport::succeeded)
    }

    pub fn execution(&self, platform: &str) -> Option<&ExecutionReport> {
        self.executions.iter().find(|e| e.id.platform == platform)
    }
}
