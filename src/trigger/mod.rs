// src/trigger/mod.rs

//! Trigger gate: decides whether a pipeline runs for an event.
//!
//! - [`patterns`] compiles branch/tag filters.
//! - [`version`] derives the [`VersionTag`] from a tag reference.
//!
//! The gate is a pure predicate. A rejected event is a no-op, not an error.

pub mod patterns;
pub mod version;

use std::fmt;

use crate::config::model::PipelineConfig;
use crate::errors::{CapsuleCiError, Result};
use crate::types::EventKind;

pub use patterns::RefPatternSet;
pub use version::{VersionExtractor, VersionTag};

/// A git reference as delivered by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitRef {
    Branch(String),
    Tag(String),
    /// `refs/pull/<n>/merge` and friends; only meaningful together with a base.
    PullRequest(String),
}

impl GitRef {
    /// Parse a full (`refs/heads/main`) or short (`main`) reference.
    ///
    /// Short names are taken to be branches; tags must be given in full.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CapsuleCiError::InvalidTrigger(
                "reference must not be empty".to_string(),
            ));
        }

        if let Some(branch) = raw.strip_prefix("refs/heads/") {
            Ok(GitRef::Branch(branch.to_string()))
        } else if let Some(tag) = raw.strip_prefix("refs/tags/") {
            Ok(GitRef::Tag(tag.to_string()))
        } else if raw.starts_with("refs/pull/") {
            Ok(GitRef::PullRequest(raw.to_string()))
        } else if raw.starts_with("refs/") {
            Err(CapsuleCiError::InvalidTrigger(format!(
                "unsupported reference namespace: {raw}"
            )))
        } else {
            Ok(GitRef::Branch(raw.to_string()))
        }
    }

    pub fn full_name(&self) -> String {
        match self {
            GitRef::Branch(name) => format!("refs/heads/{name}"),
            GitRef::Tag(name) => format!("refs/tags/{name}"),
            GitRef::PullRequest(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for GitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// The triggering event of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: EventKind,
    pub git_ref: GitRef,
    /// Target branch of a pull request.
    pub base: Option<String>,
    /// Commit the run builds, when known.
    pub revision: Option<String>,
}

impl TriggerEvent {
    pub fn push(git_ref: GitRef) -> Self {
        Self {
            kind: EventKind::Push,
            git_ref,
            base: None,
            revision: None,
        }
    }

    pub fn pull_request(git_ref: GitRef, base: impl Into<String>) -> Self {
        Self {
            kind: EventKind::PullRequest,
            git_ref,
            base: Some(base.into()),
            revision: None,
        }
    }

    /// Assemble an event from loose inputs (CLI flags or the runner's
    /// environment). A pull request needs its target branch.
    pub fn from_parts(
        kind: EventKind,
        raw_ref: &str,
        base: Option<&str>,
        revision: Option<&str>,
    ) -> Result<Self> {
        let git_ref = GitRef::parse(raw_ref)?;
        let base = base.map(str::trim).filter(|b| !b.is_empty());
        let event = match kind {
            EventKind::Push => Self::push(git_ref),
            EventKind::PullRequest => {
                let base = base.ok_or_else(|| {
                    CapsuleCiError::InvalidTrigger(
                        "pull_request events need the target branch (--base)".to_string(),
                    )
                })?;
                Self::pull_request(git_ref, base.strip_prefix("refs/heads/").unwrap_or(base))
            }
        };
        Ok(match revision.map(str::trim).filter(|r| !r.is_empty()) {
            Some(sha) => event.with_revision(sha),
            None => event,
        })
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Branch a coverage report or release should be associated with.
    pub fn branch(&self) -> Option<&str> {
        match (&self.kind, &self.git_ref) {
            (EventKind::PullRequest, GitRef::Branch(head)) => Some(head),
            (EventKind::PullRequest, _) => self.base.as_deref(),
            (EventKind::Push, GitRef::Branch(name)) => Some(name),
            (EventKind::Push, _) => None,
        }
    }
}

/// Compiled trigger predicates of one pipeline.
#[derive(Debug, Clone)]
pub struct TriggerGate {
    push_branches: RefPatternSet,
    push_tags: RefPatternSet,
    pull_request_branches: RefPatternSet,
}

impl TriggerGate {
    pub fn from_pipeline(pipeline: &PipelineConfig) -> Result<Self> {
        let push = pipeline.on.push.clone().unwrap_or_default();
        let pr = pipeline.on.pull_request.clone().unwrap_or_default();
        Ok(Self {
            push_branches: RefPatternSet::compile(&push.branches)?,
            push_tags: RefPatternSet::compile(&push.tags)?,
            pull_request_branches: RefPatternSet::compile(&pr.branches)?,
        })
    }

    /// Whether the event starts a run of this pipeline.
    pub fn admits(&self, event: &TriggerEvent) -> bool {
        match event.kind {
            EventKind::Push => match &event.git_ref {
                GitRef::Branch(name) => self.push_branches.is_match(name),
                GitRef::Tag(name) => self.push_tags.is_match(name),
                GitRef::PullRequest(_) => false,
            },
            EventKind::PullRequest => match event.base.as_deref() {
                Some(base) => self.pull_request_branches.is_match(base),
                None => false,
            },
        }
    }
}
