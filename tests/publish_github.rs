// tests/publish_github.rs

mod common;
use crate::common::init_tracing;

use std::path::Path;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use capsule_ci::publish::{GithubPublisher, PublishError, PublishRequest, ReleasePublisher};
use capsule_ci::types::DuplicateAssetPolicy;

const ASSET: &str = "capsule-cli-ubuntu-latest-1.2.3.tar.gz";

fn publisher(server: &MockServer, policy: DuplicateAssetPolicy, create: bool) -> GithubPublisher {
    GithubPublisher::new(
        &server.uri(),
        &server.uri(),
        Some("t0ken".to_string()),
        "GITHUB_TOKEN",
        policy,
        create,
    )
    .unwrap()
}

fn request(dir: &Path) -> PublishRequest {
    let archive_path = dir.join(ASSET);
    std::fs::write(&archive_path, b"fake archive").unwrap();
    PublishRequest {
        repository: "acme/capsule".to_string(),
        tag: "v1.2.3".to_string(),
        asset_name: ASSET.to_string(),
        archive_path,
    }
}

async fn mount_release(server: &MockServer, assets: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/repos/acme/capsule/releases/tags/v1.2.3"))
        .and(header("authorization", "Bearer t0ken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "tag_name": "v1.2.3",
            "assets": assets,
        })))
        .mount(server)
        .await;
}

fn uploaded(release_id: u64, times: u64) -> Mock {
    Mock::given(method("POST"))
        .and(path(format!("/repos/acme/capsule/releases/{release_id}/assets")))
        .and(query_param("name", ASSET))
        .and(header("content-type", "application/gzip"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 99,
            "name": ASSET,
            "browser_download_url": format!("https://example.invalid/{ASSET}"),
        })))
        .expect(times)
}

#[tokio::test]
async fn uploads_to_existing_release() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_release(&server, json!([])).await;
    uploaded(7, 1).mount(&server).await;

    let asset = publisher(&server, DuplicateAssetPolicy::Fail, true)
        .publish(&request(dir.path()))
        .await
        .unwrap();

    assert_eq!(asset.release_id, 7);
    assert_eq!(asset.asset_id, 99);
    assert_eq!(asset.name, ASSET);
    assert!(asset.download_url.unwrap().ends_with(ASSET));
}

#[tokio::test]
async fn duplicate_asset_fails_by_default() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_release(&server, json!([{ "id": 55, "name": ASSET }])).await;
    uploaded(7, 0).mount(&server).await;

    let err = publisher(&server, DuplicateAssetPolicy::Fail, true)
        .publish(&request(dir.path()))
        .await
        .unwrap_err();

    match err {
        PublishError::DuplicateAsset { release, name } => {
            assert_eq!(release, "v1.2.3");
            assert_eq!(name, ASSET);
        }
        other => panic!("Expected DuplicateAsset, got: {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_asset_is_replaced_when_overwriting() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_release(
        &server,
        json!([{ "id": 54, "name": "other.tar.gz" }, { "id": 55, "name": ASSET }]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/repos/acme/capsule/releases/assets/55"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    uploaded(7, 1).mount(&server).await;

    let asset = publisher(&server, DuplicateAssetPolicy::Overwrite, true)
        .publish(&request(dir.path()))
        .await
        .unwrap();
    assert_eq!(asset.asset_id, 99);
}

#[tokio::test]
async fn missing_release_is_created() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/repos/acme/capsule/releases/tags/v1.2.3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/capsule/releases"))
        .and(body_json(json!({ "tag_name": "v1.2.3", "name": "v1.2.3" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 8 })))
        .expect(1)
        .mount(&server)
        .await;
    uploaded(8, 1).mount(&server).await;

    let asset = publisher(&server, DuplicateAssetPolicy::Fail, true)
        .publish(&request(dir.path()))
        .await
        .unwrap();
    assert_eq!(asset.release_id, 8);
}

#[tokio::test]
async fn missing_release_fails_when_creation_is_disabled() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/repos/acme/capsule/releases/tags/v1.2.3"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = publisher(&server, DuplicateAssetPolicy::Fail, false)
        .publish(&request(dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::ReleaseNotFound(tag) if tag == "v1.2.3"));
}

#[tokio::test]
async fn upload_error_is_reported_with_status() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_release(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/capsule/releases/7/assets"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let err = publisher(&server, DuplicateAssetPolicy::Fail, true)
        .publish(&request(dir.path()))
        .await
        .unwrap_err();

    match err {
        PublishError::Http { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("Expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn missing_token_fails_without_any_request() {
    init_tracing();
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let publisher = GithubPublisher::new(
        &server.uri(),
        &server.uri(),
        None,
        "CAPSULE_RELEASE_TOKEN",
        DuplicateAssetPolicy::Fail,
        true,
    )
    .unwrap();

    let err = publisher.publish(&request(dir.path())).await.unwrap_err();
    assert!(matches!(err, PublishError::MissingToken(env) if env == "CAPSULE_RELEASE_TOKEN"));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
