// src/exec/backend.rs

//! Pluggable stage backend abstraction.
//!
//! The runtime talks to a `StageBackend` instead of doing work itself. This
//! keeps the production implementation (processes, archives, HTTP) swappable
//! for a fake in tests.
//!
//! - `RealStageBackend` spawns one Tokio task per stage job and reports the
//!   outcome back as `RuntimeEvent::StageFinished`.
//! - Tests can provide their own `StageBackend` that records jobs and
//!   reports scripted outcomes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::{RuntimeEvent, StageJob};
use crate::errors::Result;

use super::BoxFuture;
use super::stages::{StageServices, run_stage};

/// Trait abstracting how dispatched stages are executed.
pub trait StageBackend: Send {
    /// Start the given stages. Completion is reported asynchronously through
    /// the runtime event channel, not through the returned future.
    fn spawn_stages(
        &mut self,
        jobs: Vec<StageJob>,
    ) -> BoxFuture<'_, Result<()>>;
}

/// Production backend.
pub struct RealStageBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    services: Arc<StageServices>,
}

impl RealStageBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, services: Arc<StageServices>) -> Self {
        Self {
            runtime_tx,
            services,
        }
    }
}

impl StageBackend for RealStageBackend {
    fn spawn_stages(
        &mut self,
        jobs: Vec<StageJob>,
    ) -> BoxFuture<'_, Result<()>> {
        let tx = self.runtime_tx.clone();
        let services = Arc::clone(&self.services);

        Box::pin(async move {
            for job in jobs {
                let tx = tx.clone();
                let services = Arc::clone(&services);
                tokio::spawn(async move {
                    let outcome = run_stage(&services, &job).await;
                    let event = RuntimeEvent::StageFinished {
                        execution: job.id().clone(),
                        stage: job.stage,
                        outcome,
                    };
                    if tx.send(event).await.is_err() {
                        warn!(execution = %job.id(), stage = %job.stage, "runtime gone; dropping stage result");
                    }
                });
            }
            Ok(())
        })
    }
}
