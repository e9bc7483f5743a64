// src/plan/mod.rs

//! Planning: from a validated config and a trigger event to concrete work.
//!
//! - [`stage`] defines the fixed stage sequences per pipeline kind.
//! - [`execution`] holds the immutable per-platform execution description.
//! - [`matrix`] runs the trigger gates and expands the environment matrix.

pub mod execution;
pub mod matrix;
pub mod stage;

pub use execution::{ExecutionId, Platform, PlatformExecution};
pub use matrix::{PlanFilter, Run, plan_runs};
pub use stage::Stage;
