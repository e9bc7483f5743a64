// tests/coverage_upload.rs

mod common;
use crate::common::init_tracing;

use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use capsule_ci::coverage::{CodecovUploader, CoverageUpload, CoverageUploader, UploadError};

const REPORT: &str = "SF:src/main.rs\nDA:1,1\nend_of_record";

fn upload() -> CoverageUpload {
    CoverageUpload {
        repository: "acme/capsule".to_string(),
        commit: "0123abcd".to_string(),
        branch: Some("main".to_string()),
        report_name: "lcov.info".to_string(),
        report: REPORT.to_string(),
    }
}

#[tokio::test]
async fn posts_report_keyed_by_commit() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/v2"))
        .and(query_param("commit", "0123abcd"))
        .and(query_param("branch", "main"))
        .and(query_param("slug", "acme/capsule"))
        .and(query_param("token", "cov-token"))
        .and(body_string(format!("# path=lcov.info\n{REPORT}\n<<<<<< EOF\n")))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let uploader = CodecovUploader::new(&server.uri(), Some("cov-token".to_string())).unwrap();
    uploader.upload(&upload()).await.unwrap();
}

#[tokio::test]
async fn service_error_is_an_upload_error() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/v2"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unknown repository"))
        .mount(&server)
        .await;

    let uploader = CodecovUploader::new(&server.uri(), None).unwrap();
    match uploader.upload(&upload()).await {
        Err(UploadError::Http { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, "unknown repository");
        }
        other => panic!("Expected Http error, got: {other:?}"),
    }
}

#[tokio::test]
async fn tokenless_upload_sends_no_token_param() {
    init_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload/v2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let uploader = CodecovUploader::new(&server.uri(), None).unwrap();
    uploader.upload(&upload()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].url.query_pairs().all(|(k, _)| k != "token"));
}
