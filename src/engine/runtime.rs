// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::report::RunReport;
use crate::engine::StageJob;
use crate::errors::Result;
use crate::exec::StageBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the core runtime in response to `RuntimeEvent`s and delegates the
/// actual stage work to a `StageBackend`.
///
/// All semantics live in `CoreRuntime`; this struct only moves events in and
/// jobs out.
pub struct Runtime<B: StageBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
}

impl<B: StageBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: StageBackend> Runtime<B> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, backend: B) -> Self {
        Self {
            core,
            event_rx,
            backend,
        }
    }

    /// Main event loop. Returns the per-run reports once every execution is
    /// terminal, shutdown was requested, or the event channel closed.
    pub async fn run(mut self) -> Result<Vec<RunReport>> {
        info!("capsule-ci runtime started");

        let start = self.core.start();
        let mut keep_running = start.keep_running;
        for command in start.commands {
            self.execute_command(command).await?;
        }

        while keep_running {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }
            keep_running = step.keep_running;
        }

        info!("runtime exiting");
        Ok(self.core.report())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchStages(jobs) => self.dispatch(jobs).await,
            CoreCommand::RequestExit => {
                info!("all executions finished");
                Ok(())
            }
        }
    }

    async fn dispatch(&mut self, jobs: Vec<StageJob>) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = jobs
            .iter()
            .map(|j| format!("{}:{}", j.id(), j.stage))
            .collect();
        debug!(?names, "dispatching stages");

        self.backend.spawn_stages(jobs).await
    }
}
