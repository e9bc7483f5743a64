// src/exec/mod.rs

//! Stage execution layer.
//!
//! Turns a dispatched [`StageJob`](crate::engine::StageJob) into real work
//! (processes, archives, HTTP calls) and reports the outcome back to the
//! orchestration runtime via `RuntimeEvent`s.
//!
//! - [`command`] describes and runs external processes.
//! - [`stages`] maps each stage to its work and its failure kind.
//! - [`backend`] provides the `StageBackend` trait and the production
//!   `RealStageBackend`; tests replace it with a fake.

use std::future::Future;
use std::pin::Pin;

pub mod backend;
pub mod command;
pub mod stages;

pub use backend::{RealStageBackend, StageBackend};
pub use command::{CommandOutput, CommandSpec, run_command};
pub use stages::{StageServices, command_for, run_stage};

/// Boxed `Send` future, used at the trait seams that must stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
