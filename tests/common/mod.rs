#![allow(dead_code, unused_imports)]

pub use capsule_ci_test_utils::builders;
pub use capsule_ci_test_utils::fake_backend;
pub use capsule_ci_test_utils::{init_tracing, with_timeout};

use capsule_ci::config::ConfigFile;
use capsule_ci::types::PipelineKind;

use self::builders::{ConfigFileBuilder, PipelineBuilder};

/// The three pipelines of the capsule project over a three-platform matrix.
pub fn capsule_config() -> ConfigFile {
    let platforms = ["ubuntu-latest", "macos-latest", "windows-latest"];
    let with_platforms = |mut builder: PipelineBuilder| {
        for p in platforms {
            builder = builder.platform(p);
        }
        builder
    };

    ConfigFileBuilder::new("capsule")
        .with_pipeline(
            "ci",
            with_platforms(PipelineBuilder::new(PipelineKind::Ci))
                .on_push_branches(&["main"])
                .on_pull_request(&["main"])
                .build(),
        )
        .with_pipeline(
            "release",
            with_platforms(PipelineBuilder::new(PipelineKind::Release))
                .on_push_tags(&["v*"])
                .build(),
        )
        .with_pipeline(
            "coverage",
            PipelineBuilder::new(PipelineKind::Coverage)
                .platform("ubuntu-latest")
                .on_push_branches(&["main"])
                .on_pull_request(&["main"])
                .build(),
        )
        .build()
}
