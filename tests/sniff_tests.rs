//! Content-type sniffing against a mocked HTTP server.

use agentforge::workflows::{ContentTypeSniffer, HttpContentTypeSniffer};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sniffer() -> HttpContentTypeSniffer {
    HttpContentTypeSniffer::new(Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_head_request_reads_primary_mime_type() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/docs/guide.pdf"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-type", "application/pdf"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let mime = sniffer()
        .content_type(&format!("{}/docs/guide.pdf", mock_server.uri()))
        .await;

    assert_eq!(mime.as_deref(), Some("application/pdf"));
}

#[tokio::test]
async fn test_parameters_are_stripped() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-type", "text/HTML; charset=UTF-8"),
        )
        .mount(&mock_server)
        .await;

    let mime = sniffer()
        .content_type(&format!("{}/", mock_server.uri()))
        .await;

    assert_eq!(mime.as_deref(), Some("text/html"));
}

#[tokio::test]
async fn test_error_status_yields_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404).insert_header("content-type", "text/html"))
        .mount(&mock_server)
        .await;

    let mime = sniffer()
        .content_type(&format!("{}/missing.pdf", mock_server.uri()))
        .await;

    assert_eq!(mime, None);
}

#[tokio::test]
async fn test_unreachable_host_yields_none() {
    let mime = sniffer().content_type("http://127.0.0.1:1/doc.pdf").await;

    assert_eq!(mime, None);
}
