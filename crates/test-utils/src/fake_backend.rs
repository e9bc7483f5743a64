use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use capsule_ci::engine::{RuntimeEvent, StageJob, StageOutcome};
use capsule_ci::errors::{Result, StageFailure};
use capsule_ci::exec::{BoxFuture, StageBackend};
use capsule_ci::plan::{ExecutionId, Stage};
use tokio::sync::mpsc;

/// Shared log of `(execution, stage)` pairs in dispatch order.
pub type StageLog = Arc<Mutex<Vec<(ExecutionId, Stage)>>>;

/// A fake backend that:
/// - records which stages were dispatched
/// - immediately reports `StageFinished` for each, `Success` unless a failure
///   was scripted for that execution and stage.
///
/// Stages listed in `held` are recorded but never finished, which keeps the
/// runtime waiting (used to exercise shutdown).
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: StageLog,
    failures: HashMap<(ExecutionId, Stage), StageFailure>,
    held: Vec<(ExecutionId, Stage)>,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, dispatched: StageLog) -> Self {
        Self {
            runtime_tx,
            dispatched,
            failures: HashMap::new(),
            held: Vec::new(),
        }
    }

    pub fn fail(mut self, execution: ExecutionId, stage: Stage, failure: StageFailure) -> Self {
        self.failures.insert((execution, stage), failure);
        self
    }

    pub fn hold(mut self, execution: ExecutionId, stage: Stage) -> Self {
        self.held.push((execution, stage));
        self
    }
}

impl StageBackend for FakeBackend {
    fn spawn_stages(
        &mut self,
        jobs: Vec<StageJob>,
    ) -> BoxFuture<'_, Result<()>> {
        let tx = self.runtime_tx.clone();
        let dispatched = Arc::clone(&self.dispatched);

        Box::pin(async move {
            for job in jobs {
                let key = (job.id().clone(), job.stage);
                {
                    let mut guard = dispatched.lock().unwrap();
                    guard.push(key.clone());
                }

                if self.held.contains(&key) {
                    continue;
                }

                let outcome = match self.failures.get(&key) {
                    Some(failure) => StageOutcome::Failed(failure.clone()),
                    None => StageOutcome::Success,
                };

                tx.send(RuntimeEvent::StageFinished {
                    execution: key.0,
                    stage: key.1,
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Snapshot of the dispatch log.
pub fn dispatched(log: &StageLog) -> Vec<(ExecutionId, Stage)> {
    log.lock().unwrap().clone()
}

/// Stages dispatched for one execution, in order.
pub fn stages_of(log: &StageLog, id: &ExecutionId) -> Vec<Stage> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(exec, _)| exec == id)
        .map(|(_, stage)| *stage)
        .collect()
}
