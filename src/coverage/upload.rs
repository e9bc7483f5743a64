// src/coverage/upload.rs

use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::model::CoverageSection;
use crate::exec::BoxFuture;

const USER_AGENT: &str = concat!("capsule-ci/", env!("CARGO_PKG_VERSION"));

/// A report to forward, keyed by repository and commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageUpload {
    /// `owner/name`.
    pub repository: String,
    pub commit: String,
    pub branch: Option<String>,
    /// File name the report is filed under, e.g. `lcov.info`.
    pub report_name: String,
    pub report: String,
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("coverage service answered HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub trait CoverageUploader: Send + Sync {
    fn upload<'a>(&'a self, upload: &'a CoverageUpload) -> BoxFuture<'a, Result<(), UploadError>>;
}

/// Uploads through the Codecov v2 upload endpoint.
#[derive(Debug, Clone)]
pub struct CodecovUploader {
    client: Client,
    service_url: String,
    token: Option<String>,
}

impl CodecovUploader {
    pub fn from_config(cfg: &CoverageSection) -> Result<Self, UploadError> {
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        if token.is_none() {
            warn!(env = %cfg.token_env, "no coverage token set; uploads will be tokenless");
        }
        Self::new(&cfg.service_url, token)
    }

    pub fn new(service_url: &str, token: Option<String>) -> Result<Self, UploadError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            service_url: service_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn upload_inner(&self, upload: &CoverageUpload) -> Result<(), UploadError> {
        let url = format!("{}/upload/v2", self.service_url);

        let mut query: Vec<(&str, &str)> = vec![
            ("commit", upload.commit.as_str()),
            ("slug", upload.repository.as_str()),
            ("service", "custom"),
        ];
        if let Some(branch) = upload.branch.as_deref() {
            query.push(("branch", branch));
        }
        if let Some(token) = self.token.as_deref() {
            query.push(("token", token));
        }

        let body = format!("# path={}\n{}\n<<<<<< EOF\n", upload.report_name, upload.report);

        let response = self
            .client
            .post(&url)
            .query(&query)
            .header("Content-Type", "text/plain")
            .header("Accept", "text/plain")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Http {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            repo = %upload.repository,
            commit = %upload.commit,
            "coverage report uploaded"
        );
        Ok(())
    }
}

impl CoverageUploader for CodecovUploader {
    fn upload<'a>(&'a self, upload: &'a CoverageUpload) -> BoxFuture<'a, Result<(), UploadError>> {
        Box::pin(self.upload_inner(upload))
    }
}
