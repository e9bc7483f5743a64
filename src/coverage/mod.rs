// src/coverage/mod.rs

//! Coverage stage (coverage pipeline only).
//!
//! - instrumented test run (LLVM source-based `-Cinstrument-coverage`),
//! - aggregation of the `.profraw` files into an lcov report with a
//!   grcov-compatible tool,
//! - upload to the coverage service ([`upload`]).
//!
//! Failures here are reported like any stage failure and stay inside the
//! coverage run.

pub mod lcov;
pub mod upload;

use std::path::PathBuf;

use crate::cargo;
use crate::exec::CommandSpec;
use crate::plan::PlatformExecution;
use crate::toolchain::TOOLCHAIN_ENV;

pub use lcov::{CoverageSummary, summarize};
pub use upload::{CodecovUploader, CoverageUpload, CoverageUploader, UploadError};

/// Compiler flags for accurate line/branch data: one codegen unit, no
/// inlining, dead code kept, no overflow checks, abort instead of unwind.
///
/// `-Zpanic-abort-tests` is unstable, so the coverage toolchain must be a
/// nightly.
pub const INSTRUMENTATION_FLAGS: &str = "-Cinstrument-coverage -Ccodegen-units=1 \
-Cllvm-args=--inline-threshold=0 -Clink-dead-code -Coverflow-checks=off -Cpanic=abort \
-Zpanic-abort-tests";

/// rustup component shipping the `llvm-profdata`/`llvm-cov` the aggregator
/// needs to read `.profraw` files.
pub const LLVM_TOOLS_COMPONENT: &str = "llvm-tools-preview";

/// Environment variable the instrumented binaries read for their output path.
pub const PROFILE_FILE_ENV: &str = "LLVM_PROFILE_FILE";

/// Whether `channel` accepts the unstable part of [`INSTRUMENTATION_FLAGS`].
pub fn channel_supports_instrumentation(channel: &str) -> bool {
    channel == "nightly" || channel.starts_with("nightly-")
}

/// Directory receiving one `.profraw` file per instrumented process.
pub fn profraw_dir(exec: &PlatformExecution) -> PathBuf {
    exec.coverage_dir().join("profraw")
}

/// `cargo test` under instrumentation, with incremental compilation off.
pub fn instrumented_test_command(exec: &PlatformExecution) -> CommandSpec {
    let profile_file = profraw_dir(exec).join(format!("{}-%p-%m.profraw", exec.tool));
    cargo::test_command(exec)
        .env("CARGO_INCREMENTAL", "0")
        .env("RUSTFLAGS", INSTRUMENTATION_FLAGS)
        .env("RUSTDOCFLAGS", INSTRUMENTATION_FLAGS)
        .env(PROFILE_FILE_ENV, profile_file.to_string_lossy())
}

/// Merge the raw profiles of the instrumented run into `lcov.info`.
///
/// The aggregator runs under the pinned toolchain so it picks up that
/// toolchain's llvm tools.
pub fn aggregate_command(exec: &PlatformExecution, aggregator: &str) -> CommandSpec {
    CommandSpec::new(aggregator)
        .arg(profraw_dir(exec).to_string_lossy())
        .arg("--binary-path")
        .arg(exec.target_dir().join("debug").to_string_lossy())
        .arg("-s")
        .arg(exec.source_dir.to_string_lossy())
        .arg("-t")
        .arg("lcov")
        .arg("--branch")
        .arg("--ignore-not-existing")
        .arg("--ignore")
        .arg("/*")
        .arg("-o")
        .arg(exec.lcov_path().to_string_lossy())
        .current_dir(&exec.source_dir)
        .env(TOOLCHAIN_ENV, &exec.toolchain.channel)
}
