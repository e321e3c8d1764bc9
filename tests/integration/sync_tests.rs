//! End-to-end sync runs against the mock remote API

use crate::common::*;
use lifelog_sync::sync::{DateRange, EntryOutcome, SyncRequest};
use lifelog_sync::ArtifactKind;
use std::collections::BTreeMap;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIFELOG_KINDS: [ArtifactKind; 4] = [
    ArtifactKind::RawTranscript,
    ArtifactKind::StructuredContent,
    ArtifactKind::Summary,
    ArtifactKind::Analytics,
];

async fn lifelog_server(feed: LifelogFeed) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .respond_with(feed)
        .mount(&server)
        .await;
    server
}

fn request(start: chrono::NaiveDate, end: chrono::NaiveDate, kinds: &[ArtifactKind]) -> SyncRequest {
    SyncRequest {
        range: Some(DateRange::new(start, end).unwrap()),
        kinds: Some(kinds.to_vec()),
        force: false,
    }
}

fn snapshot_files(root: &std::path::Path) -> BTreeMap<String, String> {
    let mut files = BTreeMap::new();
    for kind in ArtifactKind::ALL {
        let dir = root.join(kind.dir_name());
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries {
                let entry = entry.unwrap();
                files.insert(
                    entry.path().display().to_string(),
                    std::fs::read_to_string(entry.path()).unwrap(),
                );
            }
        }
    }
    files
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let server = lifelog_server(LifelogFeed::healthy()).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 7));
    let request = request(d(1, 6), d(1, 7), &LIFELOG_KINDS);

    let first = runner.run(&request, CancellationToken::new()).await.unwrap();
    assert_eq!(first.count(EntryOutcome::Complete), 8);
    assert_eq!(first.exit_code(), 0);

    let files = snapshot_files(dir.path());
    assert_eq!(files.len(), 8);
    let requests = lifelog_requests(&server).await.len();

    let second = runner.run(&request, CancellationToken::new()).await.unwrap();
    assert_eq!(second.count(EntryOutcome::Skipped), 8);
    assert_eq!(second.count(EntryOutcome::Complete), 0);
    assert_eq!(lifelog_requests(&server).await.len(), requests);
    assert_eq!(snapshot_files(dir.path()), files);
}

#[tokio::test]
async fn test_produced_artifacts_have_expected_shape() {
    let server = lifelog_server(LifelogFeed::healthy()).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 6));

    runner
        .run(&request(d(1, 6), d(1, 6), &LIFELOG_KINDS), CancellationToken::new())
        .await
        .unwrap();

    let transcript = read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6)).unwrap();
    assert!(transcript.starts_with("# Standup log-2025-01-06"));

    let contents = read_artifact(dir.path(), ArtifactKind::StructuredContent, d(1, 6)).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(parsed[0]["lifelog_id"], "log-2025-01-06");

    let summary = read_artifact(dir.path(), ArtifactKind::Summary, d(1, 6)).unwrap();
    assert!(summary.starts_with("# Journal for 2025-01-06"));
    assert!(summary.contains("- Ana (1 line(s))"));

    let analytics = read_artifact(dir.path(), ArtifactKind::Analytics, d(1, 6)).unwrap();
    assert!(analytics.starts_with("# Usage Analytics for 2025-01-06"));
    assert!(analytics.contains("## Overview"));
}

#[tokio::test]
async fn test_resumes_after_last_archived_date() {
    let server = lifelog_server(LifelogFeed::healthy()).await;
    let dir = TempDir::new().unwrap();
    for day in 1..=5 {
        seed_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, day), "# archived");
    }
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 8));

    let report = runner
        .run(
            &SyncRequest {
                kinds: Some(vec![ArtifactKind::RawTranscript]),
                ..SyncRequest::default()
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let dates: Vec<String> = lifelog_requests(&server)
        .await
        .into_iter()
        .map(|(date, _)| date)
        .collect();
    assert_eq!(dates, vec!["2025-01-06", "2025-01-07", "2025-01-08"]);
    assert_eq!(
        report.dates_with(ArtifactKind::RawTranscript, EntryOutcome::Complete),
        vec![d(1, 6), d(1, 7), d(1, 8)]
    );
    assert_eq!(
        read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 3)).as_deref(),
        Some("# archived")
    );
}

#[tokio::test]
async fn test_plan_touches_nothing() {
    let server = lifelog_server(LifelogFeed::healthy()).await;
    let dir = TempDir::new().unwrap();
    for day in 1..=5 {
        seed_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, day), "# archived");
    }
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 8));

    let (_, plan) = runner
        .plan(&SyncRequest {
            kinds: Some(vec![ArtifactKind::RawTranscript, ArtifactKind::StructuredContent]),
            ..SyncRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(
        plan.range_for(ArtifactKind::RawTranscript),
        Some(DateRange::new(d(1, 6), d(1, 8)).unwrap())
    );
    assert_eq!(
        plan.range_for(ArtifactKind::StructuredContent),
        Some(DateRange::new(d(1, 1), d(1, 8)).unwrap())
    );
    assert!(lifelog_requests(&server).await.is_empty());
    assert!(read_artifact(dir.path(), ArtifactKind::StructuredContent, d(1, 1)).is_none());
}

#[tokio::test]
async fn test_failing_date_is_isolated() {
    let server = lifelog_server(LifelogFeed::failing(&[d(1, 3)], 503)).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 5));

    let report = runner
        .run(
            &request(
                d(1, 1),
                d(1, 5),
                &[ArtifactKind::RawTranscript, ArtifactKind::Summary],
            ),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.failed_dates(), vec![d(1, 3)]);
    assert_eq!(
        report.dates_with(ArtifactKind::RawTranscript, EntryOutcome::Complete),
        vec![d(1, 1), d(1, 2), d(1, 4), d(1, 5)]
    );
    assert_eq!(
        report.dates_with(ArtifactKind::Summary, EntryOutcome::Complete),
        vec![d(1, 1), d(1, 2), d(1, 4), d(1, 5)]
    );
    assert_eq!(
        report.entry(d(1, 3), ArtifactKind::Summary).unwrap().outcome,
        EntryOutcome::Blocked
    );
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_always_failing_page_stops_after_max_attempts() {
    let server = lifelog_server(LifelogFeed::failing(&[d(1, 6)], 503)).await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 6));

    let report = runner
        .run(
            &request(d(1, 6), d(1, 6), &[ArtifactKind::RawTranscript]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(lifelog_requests(&server).await.len(), 3);
    let entry = report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap();
    assert_eq!(entry.outcome, EntryOutcome::Failed);
    assert!(entry.message.as_deref().unwrap().contains("gave up after 3 attempts"));
    assert!(read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6)).is_none());
}

#[tokio::test]
async fn test_day_retry_multiplies_page_attempts() {
    let server = lifelog_server(LifelogFeed::failing(&[d(1, 6)], 500)).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.retry.day.max_attempts = 2;
    let runner = runner(&config, dir.path(), d(1, 6));

    let report = runner
        .run(
            &request(d(1, 6), d(1, 6), &[ArtifactKind::RawTranscript]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(lifelog_requests(&server).await.len(), 6);
    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap().attempts,
        2
    );
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let server = lifelog_server(LifelogFeed::failing(&[d(1, 6)], 401)).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.retry.page.max_attempts = 5;
    config.retry.day.max_attempts = 3;
    let runner = runner(&config, dir.path(), d(1, 6));

    let report = runner
        .run(
            &request(d(1, 6), d(1, 6), &[ArtifactKind::RawTranscript]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(lifelog_requests(&server).await.len(), 1);
    let entry = report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap();
    assert_eq!(entry.outcome, EntryOutcome::Failed);
    assert!(entry.message.as_deref().unwrap().contains("HTTP 401"));
}

#[tokio::test]
async fn test_retry_resumes_at_failing_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .respond_with(FlakySecondPage::new())
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 6));

    let report = runner
        .run(
            &request(d(1, 6), d(1, 6), &[ArtifactKind::RawTranscript]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let cursors: Vec<Option<String>> = lifelog_requests(&server)
        .await
        .into_iter()
        .map(|(_, cursor)| cursor)
        .collect();
    assert_eq!(
        cursors,
        vec![None, Some("c2".to_string()), Some("c2".to_string())]
    );
    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap().outcome,
        EntryOutcome::Complete
    );

    let transcript = read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6)).unwrap();
    let first = transcript.find("# Standup first").unwrap();
    let second = transcript.find("# Standup second").unwrap();
    assert!(first < second);
    assert!(transcript.contains("\n\n---\n\n"));
}

#[tokio::test]
async fn test_concurrent_dates_respect_dependencies() {
    let server = lifelog_server(LifelogFeed::failing(&[d(1, 4)], 503)).await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.runner.max_concurrent_days = 4;
    let runner = runner(&config, dir.path(), d(1, 6));

    let report = runner
        .run(&request(d(1, 1), d(1, 6), &LIFELOG_KINDS), CancellationToken::new())
        .await
        .unwrap();

    for entry in report.entries() {
        if entry.outcome != EntryOutcome::Complete {
            continue;
        }
        if let Some(upstream) = entry.kind.upstream() {
            let up = report.entry(entry.date, upstream).unwrap();
            assert!(
                up.outcome.is_available(),
                "{} {} complete while {} is {}",
                entry.date,
                entry.kind,
                upstream,
                up.outcome
            );
        }
    }

    assert_eq!(report.failed_dates(), vec![d(1, 4)]);
    for kind in &LIFELOG_KINDS[1..] {
        assert_eq!(
            report.entry(d(1, 4), *kind).unwrap().outcome,
            EntryOutcome::Blocked
        );
        assert!(read_artifact(dir.path(), *kind, d(1, 4)).is_none());
    }
    assert_eq!(report.count(EntryOutcome::Complete), 20);
}

#[tokio::test]
async fn test_insight_for_matching_day() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/chats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chats_body(
            vec![
                insight_chat_json("newer", "2025-01-07T22:00:00Z", "Tomorrow's insight"),
                serde_json::json!({
                    "id": "regular",
                    "summary": "Trip planning",
                    "createdAt": "2025-01-06T23:00:00Z",
                    "messages": []
                }),
                insight_chat_json("match", "2025-01-06T21:00:00Z", "You spent the day shipping."),
            ],
            None,
        )))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 7));

    let report = runner
        .run(
            &request(d(1, 5), d(1, 6), &[ArtifactKind::Insight]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::Insight).unwrap().outcome,
        EntryOutcome::Complete
    );
    assert_eq!(
        report.entry(d(1, 5), ArtifactKind::Insight).unwrap().outcome,
        EntryOutcome::NoData
    );
    assert_eq!(report.exit_code(), 0);

    let insight = read_artifact(dir.path(), ArtifactKind::Insight, d(1, 6)).unwrap();
    assert!(insight.starts_with("# Daily Insights for 2025-01-06"));
    assert!(insight.contains("*Chat ID: match*"));
    assert!(insight.contains("You spent the day shipping."));
    assert!(!insight.contains("Tomorrow's insight"));
}
