// src/trigger/version.rs

use std::fmt;

use regex::Regex;

use crate::errors::{CapsuleCiError, Result};

/// Version string taken from a tag reference, e.g. `1.2.3` from `refs/tags/v1.2.3`.
///
/// Immutable once derived and used verbatim in archive names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extracts [`VersionTag`]s with a configured regex (capture group 1).
#[derive(Debug, Clone)]
pub struct VersionExtractor {
    pattern: Regex,
}

impl VersionExtractor {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            CapsuleCiError::ConfigError(format!("invalid version pattern '{pattern}': {e}"))
        })?;
        Ok(Self { pattern })
    }

    /// Apply the pattern to a tag reference. `None` when the reference does
    /// not match or the first group is empty.
    pub fn derive(&self, tag_ref: &str) -> Option<VersionTag> {
        let captures = self.pattern.captures(tag_ref)?;
        let version = captures.get(1)?.as_str();
        if version.is_empty() {
            return None;
        }
        Some(VersionTag(version.to_string()))
    }
}
