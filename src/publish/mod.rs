// src/publish/mod.rs

//! Publication stage: attach an archive to the release of its tag.
//!
//! [`ReleasePublisher`] is the seam; [`github::GithubPublisher`] talks to a
//! GitHub-compatible REST API. Nothing is retried. A duplicate asset is
//! either a failure or replaced, depending on [`DuplicateAssetPolicy`].
//!
//! [`DuplicateAssetPolicy`]: crate::types::DuplicateAssetPolicy

pub mod github;

use std::path::PathBuf;

use thiserror::Error;

use crate::exec::BoxFuture;

pub use github::GithubPublisher;

/// One archive to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// `owner/name`.
    pub repository: String,
    /// Tag addressing the release, e.g. `v1.2.3`.
    pub tag: String,
    pub asset_name: String,
    pub archive_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedAsset {
    pub release_id: u64,
    pub asset_id: u64,
    pub name: String,
    pub download_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("no API token: environment variable {0} is not set")]
    MissingToken(String),

    #[error("no release exists for tag {0}")]
    ReleaseNotFound(String),

    #[error("release {release} already has an asset named {name}")]
    DuplicateAsset { release: String, name: String },

    #[error("{context}: HTTP {status}: {body}")]
    Http {
        context: String,
        status: u16,
        body: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("reading archive: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ReleasePublisher: Send + Sync {
    fn publish<'a>(
        &'a self,
        request: &'a PublishRequest,
    ) -> BoxFuture<'a, Result<PublishedAsset, PublishError>>;
}
