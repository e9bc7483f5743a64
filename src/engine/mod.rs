// src/engine/mod.rs

//! Orchestration engine for capsule-ci.
//!
//! Every platform execution of every planned run walks its fixed stage
//! sequence one stage at a time. Executions are independent: they progress
//! concurrently, in no particular order, and a failure in one never stops
//! another.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]; final outcomes are collected in [`report`].

use std::sync::Arc;

use crate::errors::StageFailure;
use crate::plan::{ExecutionId, PlatformExecution, Stage};

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failed(StageFailure),
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success)
    }
}

/// A stage the core wants performed now.
#[derive(Debug, Clone)]
pub struct StageJob {
    pub execution: Arc<PlatformExecution>,
    pub stage: Stage,
}

impl StageJob {
    pub fn id(&self) -> &ExecutionId {
        &self.execution.id
    }
}

/// Events flowing into the runtime from stage workers and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A dispatched stage finished.
    StageFinished {
        execution: ExecutionId,
        stage: Stage,
        outcome: StageOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod report;
pub mod runtime;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use report::{ExecutionReport, ExecutionStatus, RunReport, StageRecord};
pub use runtime::Runtime;
