//! Shared fixtures: configuration, wire payloads and mock responders

use chrono::NaiveDate;
use lifelog_sync::archive::{ArchiveStore, FsArchive};
use lifelog_sync::config::{parse_config, Config};
use lifelog_sync::remote::HttpRemoteApi;
use lifelog_sync::render::OutlineSummarizer;
use lifelog_sync::sync::BatchRunner;
use lifelog_sync::ArtifactKind;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub const API_KEY: &str = "test-key";

pub fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

/// Fast-retrying configuration pointing at `server_uri`
pub fn test_config(server_uri: &str, root: &Path) -> Config {
    parse_config(&format!(
        r#"
[api]
base-url = "{uri}"
request-delay-ms = 0
max-concurrent-requests = 4

[archive]
root = "{root}"
timezone = "UTC"

[retry.page]
max-attempts = 3
base-delay-ms = 1
max-delay-ms = 5

[retry.day]
max-attempts = 1
base-delay-ms = 1
max-delay-ms = 5
"#,
        uri = server_uri,
        root = root.display()
    ))
    .unwrap()
}

/// A runner wired to the mock server and a filesystem archive at `root`
pub fn runner(config: &Config, root: &Path, upper_bound: NaiveDate) -> BatchRunner {
    let api = HttpRemoteApi::new(&config.api, API_KEY.to_string(), config.timezone().unwrap())
        .unwrap();
    BatchRunner::new(
        config,
        Arc::new(api),
        Arc::new(FsArchive::new(root)),
        Arc::new(OutlineSummarizer),
    )
    .unwrap()
    .with_upper_bound(upper_bound)
}

/// Writes an artifact straight into the archive
pub fn seed_artifact(root: &Path, kind: ArtifactKind, date: NaiveDate, content: &str) {
    FsArchive::new(root).write_atomic(kind, date, content).unwrap();
}

pub fn read_artifact(root: &Path, kind: ArtifactKind, date: NaiveDate) -> Option<String> {
    std::fs::read_to_string(FsArchive::new(root).path_for(kind, date)).ok()
}

pub fn lifelog_json(id: &str, date: &str) -> Value {
    json!({
        "id": id,
        "title": "Standup",
        "markdown": format!("# Standup {}\n\n- Ana (9:00 AM): Shipping the archive today.", id),
        "startTime": format!("{}T09:00:00Z", date),
        "endTime": format!("{}T09:30:00Z", date),
        "contents": [
            { "type": "heading1", "content": "Standup" },
            {
                "type": "blockquote",
                "content": "Shipping the archive today.",
                "startTime": format!("{}T09:00:00Z", date),
                "endTime": format!("{}T09:30:00Z", date),
                "speakerName": "Ana"
            }
        ]
    })
}

pub fn lifelogs_body(lifelogs: Vec<Value>, next_cursor: Option<&str>) -> Value {
    json!({
        "data": { "lifelogs": lifelogs },
        "meta": { "lifelogs": { "nextCursor": next_cursor, "count": 0 } }
    })
}

pub fn chats_body(chats: Vec<Value>, next_cursor: Option<&str>) -> Value {
    json!({
        "data": { "chats": chats },
        "meta": { "chats": { "nextCursor": next_cursor } }
    })
}

pub fn insight_chat_json(id: &str, created_at: &str, text: &str) -> Value {
    json!({
        "id": id,
        "summary": "Daily insights",
        "createdAt": created_at,
        "messages": [
            { "text": "Generate my daily insights", "user": { "role": "user" } },
            { "text": text, "user": { "role": "assistant", "name": "Assistant" } }
        ]
    })
}

pub fn query(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// `(date, cursor)` of every lifelog request the server received, in order
pub async fn lifelog_requests(server: &MockServer) -> Vec<(String, Option<String>)> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/v1/lifelogs")
        .map(|r| (query(r, "date").unwrap_or_default(), query(r, "cursor")))
        .collect()
}

/// Serves one lifelog per requested date, failing the listed dates with `status`
pub struct LifelogFeed {
    failing: Vec<String>,
    status: u16,
}

impl LifelogFeed {
    pub fn healthy() -> Self {
        Self::failing(&[], 503)
    }

    pub fn failing(dates: &[NaiveDate], status: u16) -> Self {
        Self {
            failing: dates.iter().map(|d| d.to_string()).collect(),
            status,
        }
    }
}

impl Respond for LifelogFeed {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let date = query(request, "date").unwrap_or_default();
        if self.failing.contains(&date) {
            return ResponseTemplate::new(self.status).set_body_string("unavailable");
        }
        let id = format!("log-{}", date);
        ResponseTemplate::new(200).set_body_json(lifelogs_body(vec![lifelog_json(&id, &date)], None))
    }
}

/// Two pages of lifelogs; the first request for page two fails once with 503
pub struct FlakySecondPage {
    second_page_calls: AtomicUsize,
}

impl FlakySecondPage {
    pub fn new() -> Self {
        Self {
            second_page_calls: AtomicUsize::new(0),
        }
    }
}

impl Respond for FlakySecondPage {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let date = query(request, "date").unwrap_or_default();
        match query(request, "cursor").as_deref() {
            None => ResponseTemplate::new(200)
                .set_body_json(lifelogs_body(vec![lifelog_json("first", &date)], Some("c2"))),
            Some("c2") => {
                if self.second_page_calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200)
                        .set_body_json(lifelogs_body(vec![lifelog_json("second", &date)], None))
                }
            }
            Some(_) => ResponseTemplate::new(400),
        }
    }
}
