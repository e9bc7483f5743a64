// src/exec/stages.rs

//! What each stage does, and which failure it reports.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cargo;
use crate::config::model::CoverageSection;
use crate::coverage::{self, CoverageUpload, CoverageUploader};
use crate::engine::{StageJob, StageOutcome};
use crate::errors::StageFailure;
use crate::fs::FileSystem;
use crate::package;
use crate::plan::{PlatformExecution, Stage};
use crate::publish::{PublishRequest, ReleasePublisher};

use super::command::{CommandOutput, CommandSpec, run_command};

/// Shared collaborators of the stage workers.
#[derive(Clone)]
pub struct StageServices {
    pub fs: Arc<dyn FileSystem>,
    pub publisher: Arc<dyn ReleasePublisher>,
    pub uploader: Arc<dyn CoverageUploader>,
    pub coverage: CoverageSection,
}

impl std::fmt::Debug for StageServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageServices")
            .field("fs", &self.fs)
            .field("coverage", &self.coverage)
            .finish_non_exhaustive()
    }
}

/// The external command a stage runs, if it runs one.
///
/// Package, Publish and UploadCoverage do their work in-process and return
/// `None`.
pub fn command_for(
    exec: &PlatformExecution,
    stage: Stage,
    coverage_cfg: &CoverageSection,
) -> Option<CommandSpec> {
    match stage {
        Stage::Provision => Some(
            exec.toolchain
                .install_command(exec.platform.target.as_deref()),
        ),
        Stage::Clean => Some(cargo::clean_command(exec)),
        Stage::Test => Some(cargo::test_command(exec)),
        Stage::Build => Some(cargo::build_command(exec)),
        Stage::InstrumentedTest => Some(coverage::instrumented_test_command(exec)),
        Stage::AggregateCoverage => Some(coverage::aggregate_command(exec, &coverage_cfg.aggregator)),
        Stage::Package | Stage::Publish | Stage::UploadCoverage => None,
    }
}

/// Perform one stage of one execution. Never panics on stage errors; every
/// problem becomes a `StageOutcome::Failed`.
pub async fn run_stage(services: &StageServices, job: &StageJob) -> StageOutcome {
    let exec = job.execution.as_ref();
    let result = match job.stage {
        Stage::Provision => run_checked(services, exec, job.stage, StageFailure::Provisioning).await,
        Stage::Clean | Stage::Build => {
            run_checked(services, exec, job.stage, StageFailure::Build).await
        }
        Stage::Test | Stage::InstrumentedTest => run_tests(services, exec, job.stage).await,
        Stage::Package => run_package(services, &job.execution).await,
        Stage::Publish => run_publish(services, exec).await,
        Stage::AggregateCoverage => run_aggregate(services, exec).await,
        Stage::UploadCoverage => run_upload(services, exec).await,
    };

    match result {
        Ok(()) => StageOutcome::Success,
        Err(failure) => {
            warn!(execution = %exec.id, stage = %job.stage, %failure, "stage failed");
            StageOutcome::Failed(failure)
        }
    }
}

async fn spawn_checked(
    services: &StageServices,
    exec: &PlatformExecution,
    stage: Stage,
    fail: fn(String) -> StageFailure,
) -> Result<CommandOutput, StageFailure> {
    let spec = command_for(exec, stage, &services.coverage)
        .ok_or_else(|| fail(format!("stage {stage} runs no command")))?;
    run_command(&spec, &exec.id, stage)
        .await
        .map_err(|e| fail(format!("{e:#}")))
}

async fn run_checked(
    services: &StageServices,
    exec: &PlatformExecution,
    stage: Stage,
    fail: fn(String) -> StageFailure,
) -> Result<(), StageFailure> {
    let output = spawn_checked(services, exec, stage, fail).await?;
    if output.success {
        Ok(())
    } else {
        Err(fail(format!("{stage} exited with code {}", output.exit_code)))
    }
}

async fn run_tests(
    services: &StageServices,
    exec: &PlatformExecution,
    stage: Stage,
) -> Result<(), StageFailure> {
    let output = spawn_checked(services, exec, stage, StageFailure::Build).await?;
    judge_test_run(stage, &output)
}

/// A failed run that names no failing test never got as far as running the
/// suite (the test targets did not compile), so it is a build failure.
fn judge_test_run(stage: Stage, output: &CommandOutput) -> Result<(), StageFailure> {
    if output.success {
        return Ok(());
    }
    let failed = cargo::failed_tests(output.stdout.iter().map(String::as_str));
    if failed.is_empty() {
        return Err(StageFailure::Build(format!(
            "{stage} exited with code {} before reporting any test result",
            output.exit_code
        )));
    }
    Err(StageFailure::Test {
        failed,
        exit_code: output.exit_code,
    })
}

async fn run_package(
    services: &StageServices,
    exec: &Arc<PlatformExecution>,
) -> Result<(), StageFailure> {
    let fs = Arc::clone(&services.fs);
    let exec = Arc::clone(exec);
    let path = tokio::task::spawn_blocking(move || package::package(&exec, fs.as_ref()))
        .await
        .map_err(|e| StageFailure::Packaging(format!("packaging task aborted: {e}")))??;
    info!(archive = %path.display(), "packaged");
    Ok(())
}

async fn run_publish(services: &StageServices, exec: &PlatformExecution) -> Result<(), StageFailure> {
    let repository = exec.repository.clone().ok_or_else(|| {
        StageFailure::Publication("project.repository is not configured".to_string())
    })?;
    let tag = exec
        .tag
        .clone()
        .ok_or_else(|| StageFailure::Publication("no release tag for this execution".to_string()))?;
    let (asset_name, archive_path) = exec
        .archive_name()
        .zip(exec.archive_path())
        .ok_or_else(|| StageFailure::Publication("no version to name the archive".to_string()))?;

    let request = PublishRequest {
        repository,
        tag,
        asset_name,
        archive_path,
    };

    let asset = services
        .publisher
        .publish(&request)
        .await
        .map_err(|e| StageFailure::Publication(e.to_string()))?;

    info!(
        execution = %exec.id,
        asset = %asset.name,
        url = asset.download_url.as_deref().unwrap_or("-"),
        "published"
    );
    Ok(())
}

async fn run_aggregate(
    services: &StageServices,
    exec: &PlatformExecution,
) -> Result<(), StageFailure> {
    tokio::fs::create_dir_all(exec.coverage_dir())
        .await
        .map_err(|e| StageFailure::Coverage(format!("creating coverage dir: {e}")))?;

    run_checked(services, exec, Stage::AggregateCoverage, StageFailure::Coverage).await?;

    let report = read_report(services, exec)?;
    let summary = coverage::summarize(&report);
    if summary.is_empty() {
        return Err(StageFailure::Coverage(format!(
            "aggregated report {} covers no files",
            exec.lcov_path().display()
        )));
    }
    info!(execution = %exec.id, %summary, "coverage aggregated");
    Ok(())
}

async fn run_upload(services: &StageServices, exec: &PlatformExecution) -> Result<(), StageFailure> {
    let repository = exec.repository.clone().ok_or_else(|| {
        StageFailure::Coverage("project.repository is not configured".to_string())
    })?;
    let commit = exec.revision.clone().ok_or_else(|| {
        StageFailure::Coverage("no commit revision known for the upload (use --sha)".to_string())
    })?;

    let upload = CoverageUpload {
        repository,
        commit,
        branch: exec.branch.clone(),
        report_name: "lcov.info".to_string(),
        report: read_report(services, exec)?,
    };

    services
        .uploader
        .upload(&upload)
        .await
        .map_err(|e| StageFailure::Coverage(e.to_string()))
}

fn read_report(services: &StageServices, exec: &PlatformExecution) -> Result<String, StageFailure> {
    let path = exec.lcov_path();
    let bytes = services
        .fs
        .read(&path)
        .map_err(|e| StageFailure::Coverage(format!("{e:#}")))?;
    String::from_utf8(bytes)
        .map_err(|_| StageFailure::Coverage(format!("{} is not UTF-8", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use crate::config::model::default_version_pattern;
    use crate::exec::BoxFuture;
    use crate::fs::mock::MockFileSystem;
    use crate::plan::{ExecutionId, Platform};
    use crate::publish::{PublishError, PublishedAsset};
    use crate::coverage::UploadError;
    use crate::toolchain::ToolchainSpec;
    use crate::trigger::VersionExtractor;
    use crate::types::{PipelineKind, PlatformKind};

    fn exec(kind: PipelineKind) -> PlatformExecution {
        PlatformExecution {
            id: ExecutionId::new("cov", "ubuntu-latest"),
            kind,
            platform: Platform {
                id: "ubuntu-latest".into(),
                kind: PlatformKind::Posix,
                target: Some("x86_64-unknown-linux-musl".into()),
            },
            toolchain: ToolchainSpec {
                channel: "nightly-2025-06-01".into(),
                profile: "minimal".into(),
                components: vec![],
            },
            version: None,
            tag: None,
            tool: "capsule".into(),
            artifact_prefix: "capsule-cli".into(),
            repository: Some("acme/capsule".into()),
            source_dir: PathBuf::from("."),
            work_dir: PathBuf::from("work/cov/ubuntu-latest"),
            revision: None,
            branch: None,
        }
    }

    fn release_exec() -> PlatformExecution {
        let extractor = VersionExtractor::new(&default_version_pattern()).unwrap();
        PlatformExecution {
            id: ExecutionId::new("release", "ubuntu-latest"),
            version: extractor.derive("refs/tags/v1.2.3"),
            tag: Some("v1.2.3".into()),
            ..exec(PipelineKind::Release)
        }
    }

    fn coverage_exec() -> PlatformExecution {
        PlatformExecution {
            revision: Some("0123abcd".into()),
            branch: Some("main".into()),
            ..exec(PipelineKind::Coverage)
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        requests: Mutex<Vec<PublishRequest>>,
        reject: bool,
    }

    impl ReleasePublisher for RecordingPublisher {
        fn publish<'a>(
            &'a self,
            request: &'a PublishRequest,
        ) -> BoxFuture<'a, Result<PublishedAsset, PublishError>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push(request.clone());
                if self.reject {
                    return Err(PublishError::DuplicateAsset {
                        release: request.tag.clone(),
                        name: request.asset_name.clone(),
                    });
                }
                Ok(PublishedAsset {
                    release_id: 1,
                    asset_id: 2,
                    name: request.asset_name.clone(),
                    download_url: None,
                })
            })
        }
    }

    #[derive(Default)]
    struct RecordingUploader {
        uploads: Mutex<Vec<CoverageUpload>>,
        reject: bool,
    }

    impl CoverageUploader for RecordingUploader {
        fn upload<'a>(&'a self, upload: &'a CoverageUpload) -> BoxFuture<'a, Result<(), UploadError>> {
            Box::pin(async move {
                self.uploads.lock().unwrap().push(upload.clone());
                if self.reject {
                    return Err(UploadError::Http {
                        status: 503,
                        body: "try later".into(),
                    });
                }
                Ok(())
            })
        }
    }

    struct Harness {
        fs: MockFileSystem,
        publisher: Arc<RecordingPublisher>,
        uploader: Arc<RecordingUploader>,
    }

    impl Harness {
        fn new(reject: bool) -> Self {
            Self {
                fs: MockFileSystem::new(),
                publisher: Arc::new(RecordingPublisher {
                    reject,
                    ..Default::default()
                }),
                uploader: Arc::new(RecordingUploader {
                    reject,
                    ..Default::default()
                }),
            }
        }

        fn services(&self) -> StageServices {
            StageServices {
                fs: Arc::new(self.fs.clone()),
                publisher: Arc::clone(&self.publisher) as Arc<dyn ReleasePublisher>,
                uploader: Arc::clone(&self.uploader) as Arc<dyn CoverageUploader>,
                coverage: CoverageSection::default(),
            }
        }

        async fn run(&self, execution: PlatformExecution, stage: Stage) -> StageOutcome {
            let job = StageJob {
                execution: Arc::new(execution),
                stage,
            };
            run_stage(&self.services(), &job).await
        }
    }

    fn failure(outcome: StageOutcome) -> StageFailure {
        match outcome {
            StageOutcome::Failed(failure) => failure,
            other => panic!("Expected a failed stage, got: {other:?}"),
        }
    }

    #[test]
    fn in_process_stages_have_no_command() {
        let e = exec(PipelineKind::Release);
        let cov = CoverageSection::default();
        assert!(command_for(&e, Stage::Package, &cov).is_none());
        assert!(command_for(&e, Stage::Publish, &cov).is_none());
        assert!(command_for(&e, Stage::UploadCoverage, &cov).is_none());
    }

    #[test]
    fn provision_installs_cross_target() {
        let e = exec(PipelineKind::Release);
        let cmd = command_for(&e, Stage::Provision, &CoverageSection::default()).unwrap();
        assert_eq!(cmd.program, "rustup");
        assert!(cmd.args.windows(2).any(|w| w == ["--target", "x86_64-unknown-linux-musl"]));
    }

    #[test]
    fn aggregation_reads_raw_profiles_with_configured_tool() {
        let e = exec(PipelineKind::Coverage);
        let cov = CoverageSection {
            aggregator: "/opt/grcov".into(),
            ..CoverageSection::default()
        };
        let cmd = command_for(&e, Stage::AggregateCoverage, &cov).unwrap();
        assert_eq!(cmd.program, "/opt/grcov");
        assert_eq!(cmd.args.first().map(PathBuf::from), Some(coverage::profraw_dir(&e)));
        assert_eq!(cmd.args.last().map(PathBuf::from), Some(e.lcov_path()));
        assert!(!cmd.args.iter().any(|a| a == "--llvm"));
        assert_eq!(
            cmd.env.get(crate::toolchain::TOOLCHAIN_ENV).map(String::as_str),
            Some("nightly-2025-06-01")
        );
    }

    #[test]
    fn instrumented_tests_use_source_based_coverage() {
        let e = exec(PipelineKind::Coverage);
        let cmd = command_for(&e, Stage::InstrumentedTest, &CoverageSection::default()).unwrap();
        let rustflags = &cmd.env["RUSTFLAGS"];
        assert!(rustflags.contains("-Cinstrument-coverage"));
        assert!(!rustflags.contains("-Zprofile"));
        assert_eq!(cmd.env["RUSTDOCFLAGS"], *rustflags);
        assert_eq!(cmd.env["CARGO_INCREMENTAL"], "0");
        assert!(Path::new(&cmd.env[coverage::PROFILE_FILE_ENV]).starts_with(coverage::profraw_dir(&e)));
        assert!(coverage::channel_supports_instrumentation(&e.toolchain.channel));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_suite_reports_every_failing_test() {
        let spec = CommandSpec::new("sh").arg("-c").arg(
            "echo 'test a::one ... ok'; \
             echo 'test a::two ... FAILED'; \
             echo 'test src/lib.rs - parse (line 12) ... FAILED'; \
             exit 101",
        );
        let id = ExecutionId::new("ci", "local");
        let output = run_command(&spec, &id, Stage::Test).await.unwrap();

        match judge_test_run(Stage::Test, &output) {
            Err(StageFailure::Test { failed, exit_code }) => {
                assert_eq!(failed, vec!["a::two", "src/lib.rs - parse (line 12)"]);
                assert_eq!(exit_code, 101);
            }
            other => panic!("Expected Test failure, got: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn suite_that_never_ran_is_a_build_failure() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .arg("echo 'error[E0425]: cannot find value' >&2; exit 101");
        let id = ExecutionId::new("ci", "local");
        let output = run_command(&spec, &id, Stage::Test).await.unwrap();

        assert!(matches!(
            judge_test_run(Stage::Test, &output),
            Err(StageFailure::Build(_))
        ));

        let passing = CommandSpec::new("sh").arg("-c").arg("echo 'test a ... ok'");
        let output = run_command(&passing, &id, Stage::Test).await.unwrap();
        assert!(judge_test_run(Stage::Test, &output).is_ok());
    }

    #[tokio::test]
    async fn package_archives_the_built_binary() {
        let harness = Harness::new(false);
        let e = release_exec();
        harness.fs.add_file(e.binary_path(), b"\x7fELF".to_vec());

        let outcome = harness.run(e.clone(), Stage::Package).await;
        assert!(matches!(outcome, StageOutcome::Success));
        assert!(harness.fs.paths().contains(&e.archive_path().unwrap()));
    }

    #[tokio::test]
    async fn package_without_binary_is_a_packaging_failure() {
        let harness = Harness::new(false);
        let outcome = harness.run(release_exec(), Stage::Package).await;
        assert!(matches!(failure(outcome), StageFailure::Packaging(_)));
    }

    #[tokio::test]
    async fn publish_sends_archive_for_the_tag() {
        let harness = Harness::new(false);
        let e = release_exec();

        let outcome = harness.run(e.clone(), Stage::Publish).await;
        assert!(matches!(outcome, StageOutcome::Success));

        let requests = harness.publisher.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![PublishRequest {
                repository: "acme/capsule".into(),
                tag: "v1.2.3".into(),
                asset_name: "capsule-cli-ubuntu-latest-1.2.3.tar.gz".into(),
                archive_path: e.archive_path().unwrap(),
            }]
        );
    }

    #[tokio::test]
    async fn publish_failures_are_publication_failures() {
        let harness = Harness::new(false);
        let no_repo = PlatformExecution {
            repository: None,
            ..release_exec()
        };
        let err = failure(harness.run(no_repo, Stage::Publish).await);
        assert!(matches!(err, StageFailure::Publication(msg) if msg.contains("repository")));
        assert!(harness.publisher.requests.lock().unwrap().is_empty());

        let rejecting = Harness::new(true);
        let err = failure(rejecting.run(release_exec(), Stage::Publish).await);
        assert!(matches!(err, StageFailure::Publication(msg) if msg.contains("already has an asset")));
    }

    #[tokio::test]
    async fn upload_sends_report_keyed_by_commit() {
        let harness = Harness::new(false);
        let e = coverage_exec();
        harness.fs.add_file(e.lcov_path(), "SF:src/main.rs\nDA:1,1\nend_of_record\n");

        let outcome = harness.run(e, Stage::UploadCoverage).await;
        assert!(matches!(outcome, StageOutcome::Success));

        let uploads = harness.uploader.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].commit, "0123abcd");
        assert_eq!(uploads[0].repository, "acme/capsule");
        assert_eq!(uploads[0].branch.as_deref(), Some("main"));
        assert!(uploads[0].report.starts_with("SF:src/main.rs"));
    }

    #[tokio::test]
    async fn upload_failures_are_coverage_failures() {
        let harness = Harness::new(false);

        let no_sha = PlatformExecution {
            revision: None,
            ..coverage_exec()
        };
        let err = failure(harness.run(no_sha, Stage::UploadCoverage).await);
        assert!(matches!(err, StageFailure::Coverage(msg) if msg.contains("--sha")));

        let no_repo = PlatformExecution {
            repository: None,
            ..coverage_exec()
        };
        let err = failure(harness.run(no_repo, Stage::UploadCoverage).await);
        assert!(matches!(err, StageFailure::Coverage(msg) if msg.contains("repository")));

        // No report was aggregated.
        let err = failure(harness.run(coverage_exec(), Stage::UploadCoverage).await);
        assert!(matches!(err, StageFailure::Coverage(_)));
        assert!(harness.uploader.uploads.lock().unwrap().is_empty());

        let rejecting = Harness::new(true);
        let e = coverage_exec();
        rejecting.fs.add_file(e.lcov_path(), "SF:a.rs\nend_of_record\n");
        let err = failure(rejecting.run(e, Stage::UploadCoverage).await);
        assert!(matches!(err, StageFailure::Coverage(msg) if msg.contains("503")));
    }
}
