//! The HTTP remote API against a mock server

use crate::common::*;
use lifelog_sync::config::Config;
use lifelog_sync::remote::{FetchError, HttpRemoteApi, RemoteApi};
use lifelog_sync::ArtifactKind;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer, timezone: &str) -> (TempDir, Config, HttpRemoteApi) {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.archive.timezone = timezone.to_string();
    let api = HttpRemoteApi::new(&config.api, API_KEY.to_string(), config.timezone().unwrap())
        .unwrap();
    (dir, config, api)
}

#[tokio::test]
async fn test_lifelog_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .and(header("X-API-Key", API_KEY))
        .and(query_param("date", "2025-01-06"))
        .and(query_param("timezone", "America/Los_Angeles"))
        .and(query_param("direction", "asc"))
        .and(query_param("limit", "50"))
        .and(query_param("includeMarkdown", "true"))
        .and(query_param("includeHeadings", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lifelogs_body(
            vec![lifelog_json("a", "2025-01-06")],
            Some("next-page"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, _config, api) = api(&server, "America/Los_Angeles");
    let page = api
        .fetch_page(ArtifactKind::RawTranscript, d(1, 6), None)
        .await
        .unwrap();

    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].as_lifelog().unwrap().id, "a");
    assert_eq!(page.next_cursor.as_deref(), Some("next-page"));
}

#[tokio::test]
async fn test_cursor_is_forwarded_and_empty_cursor_ends_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .and(query_param("cursor", "abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(lifelogs_body(vec![], Some(""))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, _config, api) = api(&server, "UTC");
    let page = api
        .fetch_page(ArtifactKind::StructuredContent, d(1, 6), Some("abc"))
        .await
        .unwrap();

    assert!(page.items.is_empty());
    assert_eq!(page.next_cursor, None);
}

#[tokio::test]
async fn test_chats_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/chats"))
        .and(header("X-API-Key", API_KEY))
        .and(query_param("limit", "10"))
        .and(query_param("direction", "desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chats_body(
            vec![insight_chat_json("c1", "2025-01-06T21:00:00Z", "Insight")],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, _config, api) = api(&server, "UTC");
    let page = api
        .fetch_page(ArtifactKind::Insight, d(1, 6), None)
        .await
        .unwrap();

    let chat = page.items[0].as_chat().unwrap();
    assert!(chat.is_daily_insight());
    assert_eq!(chat.assistant_text(), Some("Insight"));
}

#[tokio::test]
async fn test_status_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .and(query_param("date", "2025-01-01"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .and(query_param("date", "2025-01-02"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .and(query_param("date", "2025-01-03"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let (_dir, _config, api) = api(&server, "UTC");
    let kind = ArtifactKind::RawTranscript;

    let rate_limited = api.fetch_page(kind, d(1, 1), None).await.unwrap_err();
    assert!(rate_limited.is_transient());

    let forbidden = api.fetch_page(kind, d(1, 2), None).await.unwrap_err();
    assert!(matches!(forbidden, FetchError::Fatal { status: Some(403), .. }));

    let garbage = api.fetch_page(kind, d(1, 3), None).await.unwrap_err();
    assert!(garbage.is_transient());
}

#[tokio::test]
async fn test_local_kinds_have_no_feed() {
    let server = MockServer::start().await;
    let (_dir, _config, api) = api(&server, "UTC");

    let result = api.fetch_page(ArtifactKind::Summary, d(1, 6), None).await;
    assert!(matches!(result, Err(FetchError::Fatal { status: None, .. })));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}
