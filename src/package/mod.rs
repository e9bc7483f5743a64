// src/package/mod.rs

//! Packaging stage (release pipeline only).
//!
//! A small state machine, `NotPackaged → PlatformSelected → Archived`:
//!
//! - selecting the platform resolves the binary file name (`capsule` or
//!   `capsule.exe`) and the archive path;
//! - archiving reads that binary and writes a `.tar.gz` holding it alone.
//!
//! Windows artifacts are `.tar.gz` as well; the container format does not
//! depend on the platform.

pub mod archive;

use std::path::PathBuf;

use tracing::info;

use crate::errors::StageFailure;
use crate::fs::FileSystem;
use crate::plan::PlatformExecution;
use crate::trigger::VersionTag;

/// `<prefix>-<platform>-<version>.tar.gz`, e.g.
/// `capsule-cli-windows-latest-1.2.3.tar.gz`.
pub fn archive_name(prefix: &str, platform_id: &str, version: &VersionTag) -> String {
    format!("{prefix}-{platform_id}-{version}.tar.gz")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackagingState {
    NotPackaged,
    PlatformSelected {
        binary_name: String,
        binary_path: PathBuf,
        archive_path: PathBuf,
    },
    Archived {
        archive_path: PathBuf,
        size: u64,
    },
}

impl PackagingState {
    /// Resolve binary and archive paths for the execution's platform.
    pub fn select_platform(self, exec: &PlatformExecution) -> Result<Self, StageFailure> {
        match self {
            PackagingState::NotPackaged => {
                let archive_path = exec.archive_path().ok_or_else(|| {
                    StageFailure::Packaging(format!(
                        "execution {} has no version tag to name the archive",
                        exec.id
                    ))
                })?;
                Ok(PackagingState::PlatformSelected {
                    binary_name: exec.binary_name(),
                    binary_path: exec.binary_path(),
                    archive_path,
                })
            }
            other => Err(StageFailure::Packaging(format!(
                "cannot select platform in state {other:?}"
            ))),
        }
    }

    /// Write the archive. Fails when the expected binary is missing.
    pub fn archive(self, fs: &dyn FileSystem) -> Result<Self, StageFailure> {
        let (binary_name, binary_path, archive_path) = match self {
            PackagingState::PlatformSelected {
                binary_name,
                binary_path,
                archive_path,
            } => (binary_name, binary_path, archive_path),
            other => {
                return Err(StageFailure::Packaging(format!(
                    "cannot archive in state {other:?}"
                )));
            }
        };

        if !fs.is_file(&binary_path) {
            return Err(StageFailure::Packaging(format!(
                "expected binary not found at {}",
                binary_path.display()
            )));
        }

        let contents = fs
            .read(&binary_path)
            .map_err(|e| StageFailure::Packaging(format!("{e:#}")))?;
        let bytes = archive::single_file_tar_gz(&binary_name, &contents)
            .map_err(|e| StageFailure::Packaging(format!("{e:#}")))?;
        fs.write(&archive_path, &bytes)
            .map_err(|e| StageFailure::Packaging(format!("{e:#}")))?;

        info!(
            binary = %binary_path.display(),
            archive = %archive_path.display(),
            size = bytes.len(),
            "archive written"
        );

        Ok(PackagingState::Archived {
            archive_path,
            size: bytes.len() as u64,
        })
    }
}

/// Run the whole packaging state machine for one execution.
pub fn package(exec: &PlatformExecution, fs: &dyn FileSystem) -> Result<PathBuf, StageFailure> {
    match PackagingState::NotPackaged.select_platform(exec)?.archive(fs)? {
        PackagingState::Archived { archive_path, .. } => Ok(archive_path),
        other => Err(StageFailure::Packaging(format!(
            "packaging ended in unexpected state {other:?}"
        ))),
    }
}
