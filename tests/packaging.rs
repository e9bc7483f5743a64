// tests/packaging.rs

mod common;
use crate::common::builders::ExecutionBuilder;

use std::sync::Arc;

use capsule_ci::errors::StageFailure;
use capsule_ci::fs::mock::MockFileSystem;
use capsule_ci::fs::{FileSystem, RealFileSystem};
use capsule_ci::package::archive::read_entries;
use capsule_ci::package::{PackagingState, package};
use capsule_ci::types::PipelineKind;

#[test]
fn windows_archive_contains_exe_at_root() {
    let exec = ExecutionBuilder::new("release", "windows-latest", PipelineKind::Release)
        .version("1.2.3")
        .build();
    let fs = MockFileSystem::new();
    fs.add_file(exec.binary_path(), b"MZ fake exe".to_vec());

    let archive = package(&exec, &fs).unwrap();

    assert_eq!(
        archive.file_name().and_then(|n| n.to_str()),
        Some("capsule-cli-windows-latest-1.2.3.tar.gz")
    );
    let entries = read_entries(&fs.read(&archive).unwrap()).unwrap();
    assert_eq!(entries, vec![("capsule.exe".to_string(), b"MZ fake exe".to_vec())]);
}

#[test]
fn cross_target_binary_is_read_from_target_subdir() {
    let exec = ExecutionBuilder::new("release", "ubuntu-latest", PipelineKind::Release)
        .version("0.9.0-rc.1")
        .target("x86_64-unknown-linux-musl")
        .build();
    let fs = MockFileSystem::new();
    let binary = exec
        .work_dir
        .join("target/x86_64-unknown-linux-musl/release/capsule");
    fs.add_file(&binary, b"\x7fELF".to_vec());

    let archive = package(&exec, &fs).unwrap();
    let entries = read_entries(&fs.read(&archive).unwrap()).unwrap();
    assert_eq!(entries[0].0, "capsule");
    assert!(
        archive.ends_with("dist/capsule-cli-ubuntu-latest-0.9.0-rc.1.tar.gz"),
        "{}",
        archive.display()
    );
}

#[test]
fn missing_binary_is_a_packaging_failure() {
    let exec = ExecutionBuilder::new("release", "macos-latest", PipelineKind::Release)
        .version("1.2.3")
        .build();
    let fs = MockFileSystem::new();

    match package(&exec, &fs) {
        Err(StageFailure::Packaging(msg)) => {
            assert!(msg.contains("expected binary not found"), "{msg}");
        }
        other => panic!("Expected packaging failure, got: {other:?}"),
    }
    assert!(fs.paths().is_empty(), "no archive may be written");
}

#[test]
fn states_cannot_be_skipped() {
    let fs = MockFileSystem::new();
    let result = PackagingState::NotPackaged.archive(&fs);
    assert!(matches!(result, Err(StageFailure::Packaging(_))));
}

#[test]
fn execution_without_version_cannot_be_packaged() {
    let exec = ExecutionBuilder::new("ci", "ubuntu-latest", PipelineKind::Ci).build();
    let result = PackagingState::NotPackaged.select_platform(&exec);
    assert!(matches!(result, Err(StageFailure::Packaging(_))));
}

#[test]
fn real_filesystem_writes_archive_into_dist() {
    let dir = tempfile::tempdir().unwrap();
    let exec = ExecutionBuilder::new("release", "ubuntu-latest", PipelineKind::Release)
        .version("3.1.4")
        .work_dir(dir.path().join("release/ubuntu-latest"))
        .build();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    fs.write(&exec.binary_path(), b"binary").unwrap();

    let archive = package(&exec, fs.as_ref()).unwrap();

    assert_eq!(
        archive,
        dir.path()
            .join("release/ubuntu-latest/dist/capsule-cli-ubuntu-latest-3.1.4.tar.gz")
    );
    let bytes = std::fs::read(&archive).unwrap();
    let entries = read_entries(&bytes).unwrap();
    assert_eq!(entries, vec![("capsule".to_string(), b"binary".to_vec())]);
}
