//! Archive behaviour under interrupted and partial writes

use crate::common::*;
use lifelog_sync::archive::{ArchiveSnapshot, ArchiveStore, FsArchive};
use lifelog_sync::sync::{DateRange, EntryOutcome, SyncRequest};
use lifelog_sync::ArtifactKind;
use std::fs;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer};

async fn lifelog_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/lifelogs"))
        .respond_with(LifelogFeed::healthy())
        .mount(&server)
        .await;
    server
}

fn single_day(kind: ArtifactKind, force: bool) -> SyncRequest {
    SyncRequest {
        range: Some(DateRange::single(d(1, 6))),
        kinds: Some(vec![kind]),
        force,
    }
}

#[tokio::test]
async fn test_leftover_temp_file_is_not_complete() {
    let server = lifelog_server().await;
    let dir = TempDir::new().unwrap();
    let lifelogs = dir.path().join("lifelogs");
    fs::create_dir_all(&lifelogs).unwrap();
    fs::write(lifelogs.join(".2025-01-06-lifelogs.md.tmpX1y2Z3"), "# half written").unwrap();

    let archive = FsArchive::new(dir.path());
    let snapshot = ArchiveSnapshot::capture(&archive).unwrap();
    assert!(!snapshot.is_complete(ArtifactKind::RawTranscript, d(1, 6)));
    assert!(snapshot.is_empty());

    let config = test_config(&server.uri(), dir.path());
    let report = runner(&config, dir.path(), d(1, 6))
        .run(&single_day(ArtifactKind::RawTranscript, false), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap().outcome,
        EntryOutcome::Complete
    );
    assert!(read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6))
        .unwrap()
        .starts_with("# Standup"));

    assert_eq!(archive.sweep_temp_files().unwrap(), 1);
    assert_eq!(fs::read_dir(&lifelogs).unwrap().count(), 1);
}

#[tokio::test]
async fn test_truncated_contents_are_rewritten() {
    let server = lifelog_server().await;
    let dir = TempDir::new().unwrap();
    seed_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6), "# archived");
    let contents = dir.path().join("contents");
    fs::create_dir_all(&contents).unwrap();
    fs::write(contents.join("2025-01-06-contents.json"), "[{\"lifelog_id\": \"log-").unwrap();

    let config = test_config(&server.uri(), dir.path());
    let report = runner(&config, dir.path(), d(1, 6))
        .run(&single_day(ArtifactKind::StructuredContent, false), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::StructuredContent).unwrap().outcome,
        EntryOutcome::Complete
    );
    let written = read_artifact(dir.path(), ArtifactKind::StructuredContent, d(1, 6)).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert!(parsed.is_array());
}

#[tokio::test]
async fn test_complete_artifact_is_kept_unless_forced() {
    let server = lifelog_server().await;
    let dir = TempDir::new().unwrap();
    seed_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6), "# kept");
    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 6));

    let report = runner
        .run(&single_day(ArtifactKind::RawTranscript, false), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap().outcome,
        EntryOutcome::Skipped
    );
    assert!(lifelog_requests(&server).await.is_empty());
    assert_eq!(
        read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6)).as_deref(),
        Some("# kept")
    );

    let report = runner
        .run(&single_day(ArtifactKind::RawTranscript, true), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap().outcome,
        EntryOutcome::Complete
    );
    assert_eq!(lifelog_requests(&server).await.len(), 1);
    assert!(read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6))
        .unwrap()
        .starts_with("# Standup"));
}

#[tokio::test]
async fn test_cancelled_run_writes_nothing() {
    let server = lifelog_server().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = runner(&config, dir.path(), d(1, 6))
        .run(&single_day(ArtifactKind::RawTranscript, false), cancel)
        .await
        .unwrap();

    assert!(report.was_cancelled());
    assert_eq!(report.count(EntryOutcome::Cancelled), 1);
    assert_eq!(report.exit_code(), 0);
    assert!(lifelog_requests(&server).await.is_empty());
    assert!(read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6)).is_none());
}

#[tokio::test]
async fn test_cancelled_forced_run_keeps_complete_artifact() {
    let server = lifelog_server().await;
    let dir = TempDir::new().unwrap();
    seed_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6), "# kept");
    let leftover = dir.path().join("lifelogs/.2025-01-06-lifelogs.md.tmpQ7r8S9");
    fs::write(&leftover, "# half written").unwrap();

    let config = test_config(&server.uri(), dir.path());
    let runner = runner(&config, dir.path(), d(1, 6));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = runner
        .run(&single_day(ArtifactKind::RawTranscript, true), cancel)
        .await
        .unwrap();
    assert!(report.was_cancelled());
    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap().outcome,
        EntryOutcome::Cancelled
    );
    assert!(lifelog_requests(&server).await.is_empty());

    // The committed file survives; the stray temp file is never mistaken for it
    assert_eq!(
        read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6)).as_deref(),
        Some("# kept")
    );
    let archive = FsArchive::new(dir.path());
    assert_eq!(archive.list_dates(ArtifactKind::RawTranscript).unwrap(), vec![d(1, 6)]);
    let snapshot = ArchiveSnapshot::capture(&archive).unwrap();
    assert!(snapshot.is_complete(ArtifactKind::RawTranscript, d(1, 6)));

    let report = runner
        .run(&single_day(ArtifactKind::RawTranscript, false), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        report.entry(d(1, 6), ArtifactKind::RawTranscript).unwrap().outcome,
        EntryOutcome::Skipped
    );
    assert!(lifelog_requests(&server).await.is_empty());

    assert_eq!(archive.sweep_temp_files().unwrap(), 1);
    assert!(!leftover.exists());
    assert_eq!(
        read_artifact(dir.path(), ArtifactKind::RawTranscript, d(1, 6)).as_deref(),
        Some("# kept")
    );
}
