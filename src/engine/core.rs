// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from channels,
//! hands stage jobs to the backend and handles Ctrl+C. The core itself has
//! no Tokio types, channels, filesystem or processes, so it can be tested
//! step by step.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::engine::event_handlers::{
    CoreCommand, CoreStep, ExecutionProgress, handle_shutdown, handle_stage_finished,
};
use crate::engine::report::{ExecutionStatus, RunReport};
use crate::engine::RuntimeEvent;
use crate::plan::{ExecutionId, Run};
use crate::types::PipelineKind;

#[derive(Debug)]
struct RunSlot {
    pipeline: String,
    kind: PipelineKind,
    executions: Vec<ExecutionId>,
}

/// Pure core runtime state over all executions of all planned runs.
#[derive(Debug)]
pub struct CoreRuntime {
    runs: Vec<RunSlot>,
    executions: BTreeMap<ExecutionId, ExecutionProgress>,
}

impl CoreRuntime {
    pub fn new(runs: Vec<Run>) -> Self {
        let mut slots = Vec::new();
        let mut executions = BTreeMap::new();

        for run in runs {
            let mut ids = Vec::new();
            for exec in run.executions {
                ids.push(exec.id.clone());
                executions.insert(exec.id.clone(), ExecutionProgress::new(Arc::new(exec)));
            }
            slots.push(RunSlot {
                pipeline: run.pipeline,
                kind: run.kind,
                executions: ids,
            });
        }

        Self {
            runs: slots,
            executions,
        }
    }

    /// Dispatch the first stage of every execution.
    pub fn start(&mut self) -> CoreStep {
        let jobs: Vec<_> = self
            .executions
            .values_mut()
            .filter(|p| p.status == ExecutionStatus::Pending)
            .filter_map(ExecutionProgress::advance)
            .collect();

        let mut commands = Vec::new();
        if !jobs.is_empty() {
            commands.push(CoreCommand::DispatchStages(jobs));
        }
        self.finish_step(commands)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::StageFinished {
                execution,
                stage,
                outcome,
            } => {
                let mut commands = Vec::new();
                match self.executions.get_mut(&execution) {
                    Some(progress) => {
                        if let Some(job) = handle_stage_finished(progress, stage, outcome) {
                            commands.push(CoreCommand::DispatchStages(vec![job]));
                        }
                    }
                    None => {
                        warn!(%execution, %stage, "completion for unknown execution; ignoring");
                    }
                }
                self.finish_step(commands)
            }
            RuntimeEvent::ShutdownRequested => {
                for progress in self.executions.values_mut() {
                    handle_shutdown(progress);
                }
                CoreStep {
                    commands: Vec::new(),
                    keep_running: false,
                }
            }
        }
    }

    fn finish_step(&self, mut commands: Vec<CoreCommand>) -> CoreStep {
        let keep_running = !self.is_finished();
        if !keep_running {
            commands.push(CoreCommand::RequestExit);
        }
        CoreStep {
            commands,
            keep_running,
        }
    }

    /// True once every execution is terminal (also true with no executions).
    pub fn is_finished(&self) -> bool {
        self.executions.values().all(|p| p.status.is_terminal())
    }

    pub fn status_of(&self, id: &ExecutionId) -> Option<&ExecutionStatus> {
        self.executions.get(id).map(|p| &p.status)
    }

    /// Reports in planning order.
    pub fn report(&self) -> Vec<RunReport> {
        self.runs
            .iter()
            .map(|slot| RunReport {
                pipeline: slot.pipeline.clone(),
                kind: slot.kind,
                executions: slot
                    .executions
                    .iter()
                    .filter_map(|id| self.executions.get(id))
                    .map(ExecutionProgress::to_report)
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use crate::engine::{CoreCommand, StageOutcome};
    use crate::plan::{Platform, PlatformExecution, Stage};
    use crate::toolchain::ToolchainSpec;
    use crate::trigger::{GitRef, TriggerEvent};
    use crate::types::PlatformKind;

    fn ci_run(platforms: &[&str]) -> Run {
        let executions = platforms
            .iter()
            .map(|p| PlatformExecution {
                id: ExecutionId::new("ci", *p),
                kind: PipelineKind::Ci,
                platform: Platform {
                    id: p.to_string(),
                    kind: PlatformKind::infer(p),
                    target: None,
                },
                toolchain: ToolchainSpec {
                    channel: "nightly".into(),
                    profile: "minimal".into(),
                    components: vec![],
                },
                version: None,
                tag: None,
                tool: "capsule".into(),
                artifact_prefix: "capsule-cli".into(),
                repository: None,
                source_dir: PathBuf::from("."),
                work_dir: PathBuf::from("work/ci").join(p),
                revision: None,
                branch: Some("main".into()),
            })
            .collect();
        Run {
            pipeline: "ci".into(),
            kind: PipelineKind::Ci,
            event: TriggerEvent::push(GitRef::Branch("main".into())),
            executions,
        }
    }

    fn finished(platform: &str, stage: Stage) -> RuntimeEvent {
        RuntimeEvent::StageFinished {
            execution: ExecutionId::new("ci", platform),
            stage,
            outcome: StageOutcome::Success,
        }
    }

    fn dispatched(step: &CoreStep) -> Vec<(String, Stage)> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchStages(jobs) => Some(jobs),
                CoreCommand::RequestExit => None,
            })
            .flatten()
            .map(|j| (j.id().platform.clone(), j.stage))
            .collect()
    }

    #[test]
    fn start_dispatches_first_stage_everywhere() {
        let mut core = CoreRuntime::new(vec![ci_run(&["ubuntu-latest", "windows-latest"])]);
        let step = core.start();
        assert!(step.keep_running);
        assert_eq!(
            dispatched(&step),
            vec![
                ("ubuntu-latest".to_string(), Stage::Provision),
                ("windows-latest".to_string(), Stage::Provision),
            ]
        );
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut core = CoreRuntime::new(vec![ci_run(&["ubuntu-latest"])]);
        core.start();

        // Build was never dispatched.
        let step = core.step(finished("ubuntu-latest", Stage::Build));
        assert!(dispatched(&step).is_empty());
        assert_eq!(
            core.status_of(&ExecutionId::new("ci", "ubuntu-latest")),
            Some(&ExecutionStatus::Running(Stage::Provision))
        );
    }

    #[test]
    fn last_stage_finishes_the_core() {
        let mut core = CoreRuntime::new(vec![ci_run(&["ubuntu-latest"])]);
        core.start();
        let mut last = None;
        for stage in [Stage::Provision, Stage::Clean, Stage::Test, Stage::Build] {
            last = Some(core.step(finished("ubuntu-latest", stage)));
        }
        let last = last.unwrap();
        assert!(!last.keep_running);
        assert!(matches!(last.commands.last(), Some(CoreCommand::RequestExit)));
        assert!(core.report()[0].succeeded());
    }

    #[test]
    fn empty_plan_is_finished_at_start() {
        let mut core = CoreRuntime::new(Vec::new());
        assert!(!core.start().keep_running);
    }
}
