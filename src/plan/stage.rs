// src/plan/stage.rs

use std::fmt;

use crate::types::PipelineKind;

/// One step of a platform execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Provision,
    Clean,
    Test,
    Build,
    Package,
    Publish,
    InstrumentedTest,
    AggregateCoverage,
    UploadCoverage,
}

const CI_STAGES: &[Stage] = &[Stage::Provision, Stage::Clean, Stage::Test, Stage::Build];

const RELEASE_STAGES: &[Stage] = &[
    Stage::Provision,
    Stage::Clean,
    Stage::Build,
    Stage::Package,
    Stage::Publish,
];

const COVERAGE_STAGES: &[Stage] = &[
    Stage::Provision,
    Stage::Clean,
    Stage::InstrumentedTest,
    Stage::AggregateCoverage,
    Stage::UploadCoverage,
];

impl Stage {
    /// The fixed, strictly ordered stage list of a pipeline kind.
    pub fn sequence_for(kind: PipelineKind) -> &'static [Stage] {
        match kind {
            PipelineKind::Ci => CI_STAGES,
            PipelineKind::Release => RELEASE_STAGES,
            PipelineKind::Coverage => COVERAGE_STAGES,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Provision => "provision",
            Stage::Clean => "clean",
            Stage::Test => "test",
            Stage::Build => "build",
            Stage::Package => "package",
            Stage::Publish => "publish",
            Stage::InstrumentedTest => "instrumented-test",
            Stage::AggregateCoverage => "aggregate-coverage",
            Stage::UploadCoverage => "upload-coverage",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
