// src/trigger/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled branch or tag filter, e.g. `["main", "release/**"]` or `["v*"]`.
///
/// Matching follows the usual CI filter conventions: `*` stops at `/`,
/// `**` crosses it. An empty set matches nothing.
#[derive(Clone)]
pub struct RefPatternSet {
    patterns: Vec<String>,
    set: GlobSet,
}

impl fmt::Debug for RefPatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefPatternSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl RefPatternSet {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .with_context(|| format!("compiling ref pattern '{pattern}'"))?;
            builder.add(glob);
        }
        let set = builder.build().context("building ref pattern set")?;
        Ok(Self {
            patterns: patterns.to_vec(),
            set,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_match(&self, name: &str) -> bool {
        !self.is_empty() && self.set.is_match(name)
    }
}
