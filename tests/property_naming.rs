// tests/property_naming.rs

use proptest::prelude::*;

use capsule_ci::package::archive_name;
use capsule_ci::trigger::{VersionExtractor, VersionTag};

fn version(raw: &str) -> VersionTag {
    VersionExtractor::new(r"^refs/tags/v(.+)$")
        .unwrap()
        .derive(&format!("refs/tags/v{raw}"))
        .unwrap()
}

fn platform_id() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "ubuntu-latest",
        "macos-latest",
        "windows-latest",
        "ubuntu-22.04",
        "windows-2019",
    ])
    .prop_map(str::to_string)
}

fn semver() -> impl Strategy<Value = String> {
    (0u32..20, 0u32..20, 0u32..50).prop_map(|(a, b, c)| format!("{a}.{b}.{c}"))
}

proptest! {
    #[test]
    fn archive_name_embeds_platform_and_version(platform in platform_id(), v in semver()) {
        let name = archive_name("capsule-cli", &platform, &version(&v));
        prop_assert_eq!(&name, &format!("capsule-cli-{platform}-{v}.tar.gz"));
    }

    #[test]
    fn distinct_executions_never_share_an_archive_name(
        p1 in platform_id(),
        v1 in semver(),
        p2 in platform_id(),
        v2 in semver(),
    ) {
        prop_assume!((p1.as_str(), v1.as_str()) != (p2.as_str(), v2.as_str()));
        let a = archive_name("capsule-cli", &p1, &version(&v1));
        let b = archive_name("capsule-cli", &p2, &version(&v2));
        prop_assert_ne!(a, b);
    }
}
