// src/publish/github.rs

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::model::ReleaseSection;
use crate::exec::BoxFuture;
use crate::types::DuplicateAssetPolicy;

use super::{PublishError, PublishRequest, PublishedAsset, ReleasePublisher};

const USER_AGENT: &str = concat!("capsule-ci/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
struct Release {
    id: u64,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
struct Asset {
    id: u64,
    name: String,
    #[serde(default)]
    browser_download_url: Option<String>,
}

/// Publishes release assets through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubPublisher {
    client: Client,
    api_url: String,
    uploads_url: String,
    token: Option<String>,
    token_env: String,
    on_duplicate: DuplicateAssetPolicy,
    create_missing_release: bool,
}

impl GithubPublisher {
    /// Build from `[release]`, reading the token from `token_env` now.
    pub fn from_config(cfg: &ReleaseSection) -> Result<Self, PublishError> {
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(
            &cfg.api_url,
            &cfg.uploads_url,
            token,
            &cfg.token_env,
            cfg.on_duplicate_asset,
            cfg.create_missing_release,
        )
    }

    pub fn new(
        api_url: &str,
        uploads_url: &str,
        token: Option<String>,
        token_env: &str,
        on_duplicate: DuplicateAssetPolicy,
        create_missing_release: bool,
    ) -> Result<Self, PublishError> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            uploads_url: uploads_url.trim_end_matches('/').to_string(),
            token,
            token_env: token_env.to_string(),
            on_duplicate,
            create_missing_release,
        })
    }

    fn request(&self, method: Method, url: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    async fn find_release(
        &self,
        repo: &str,
        tag: &str,
        token: &str,
    ) -> Result<Option<Release>, PublishError> {
        let url = format!("{}/repos/{repo}/releases/tags/{tag}", self.api_url);
        let response = self.request(Method::GET, &url, token).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response, "looking up release").await?;
        Ok(Some(response.json().await?))
    }

    async fn create_release(
        &self,
        repo: &str,
        tag: &str,
        token: &str,
    ) -> Result<Release, PublishError> {
        let url = format!("{}/repos/{repo}/releases", self.api_url);
        let response = self
            .request(Method::POST, &url, token)
            .json(&json!({ "tag_name": tag, "name": tag }))
            .send()
            .await?;

        // A sibling execution may have created it first.
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            debug!(%tag, "release creation rejected; looking it up again");
            return self
                .find_release(repo, tag, token)
                .await?
                .ok_or_else(|| PublishError::ReleaseNotFound(tag.to_string()));
        }

        let response = ensure_success(response, "creating release").await?;
        info!(%repo, %tag, "created release");
        Ok(response.json().await?)
    }

    async fn delete_asset(&self, repo: &str, asset_id: u64, token: &str) -> Result<(), PublishError> {
        let url = format!("{}/repos/{repo}/releases/assets/{asset_id}", self.api_url);
        let response = self.request(Method::DELETE, &url, token).send().await?;
        ensure_success(response, "deleting existing asset").await?;
        Ok(())
    }

    async fn upload_asset(
        &self,
        repo: &str,
        release_id: u64,
        name: &str,
        bytes: Vec<u8>,
        token: &str,
    ) -> Result<Asset, PublishError> {
        let url = format!("{}/repos/{repo}/releases/{release_id}/assets", self.uploads_url);
        let response = self
            .request(Method::POST, &url, token)
            .query(&[("name", name)])
            .header("Content-Type", "application/gzip")
            .body(bytes)
            .send()
            .await?;
        let response = ensure_success(response, "uploading asset").await?;
        Ok(response.json().await?)
    }

    async fn publish_inner(&self, req: &PublishRequest) -> Result<PublishedAsset, PublishError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| PublishError::MissingToken(self.token_env.clone()))?;

        let bytes = tokio::fs::read(&req.archive_path).await?;

        let release = match self.find_release(&req.repository, &req.tag, token).await? {
            Some(release) => release,
            None if self.create_missing_release => {
                self.create_release(&req.repository, &req.tag, token).await?
            }
            None => return Err(PublishError::ReleaseNotFound(req.tag.clone())),
        };

        if let Some(existing) = release.assets.iter().find(|a| a.name == req.asset_name) {
            match self.on_duplicate {
                DuplicateAssetPolicy::Fail => {
                    return Err(PublishError::DuplicateAsset {
                        release: req.tag.clone(),
                        name: req.asset_name.clone(),
                    });
                }
                DuplicateAssetPolicy::Overwrite => {
                    warn!(asset = %existing.name, asset_id = existing.id, "replacing existing asset");
                    self.delete_asset(&req.repository, existing.id, token).await?;
                }
            }
        }

        let asset = self
            .upload_asset(&req.repository, release.id, &req.asset_name, bytes, token)
            .await?;

        info!(
            repo = %req.repository,
            tag = %req.tag,
            asset = %asset.name,
            asset_id = asset.id,
            "asset uploaded"
        );

        Ok(PublishedAsset {
            release_id: release.id,
            asset_id: asset.id,
            name: asset.name,
            download_url: asset.browser_download_url,
        })
    }
}

impl ReleasePublisher for GithubPublisher {
    fn publish<'a>(
        &'a self,
        request: &'a PublishRequest,
    ) -> BoxFuture<'a, Result<PublishedAsset, PublishError>> {
        Box::pin(self.publish_inner(request))
    }
}

async fn ensure_success(response: Response, context: &str) -> Result<Response, PublishError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PublishError::Http {
        context: context.to_string(),
        status: status.as_u16(),
        body,
    })
}
