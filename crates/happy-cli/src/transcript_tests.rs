use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::*;

#[test]
fn project_slug_replaces_path_separators() {
    assert_eq!(project_slug(Path::new("/home/user/my-project")), "-home-user-my-project");
}

#[tokio::test]
async fn discovers_a_file_created_after_the_watcher_starts() {
    let dir = tempfile::tempdir().unwrap();
    let watcher = TranscriptWatcher::new(dir.path().to_path_buf()).with_poll_interval(Duration::from_millis(20));

    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();

    let dir_path = dir.path().to_path_buf();
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(dir_path.join("abc123.jsonl"), "{\"type\":\"user\"}\n").unwrap();
    });

    let handle = tokio::spawn(watcher.run(tx, cancel_clone));

    let record = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.value["type"], "user");

    cancel.cancel();
    let id = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap().unwrap();
    assert_eq!(id.as_deref(), Some("abc123"));
    writer.await.unwrap();
}

#[tokio::test]
async fn known_session_id_skips_discovery() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("known.jsonl"), "{\"type\":\"assistant\"}\n").unwrap();

    let watcher = TranscriptWatcher::with_known_session(dir.path().to_path_buf(), "known".to_string())
        .with_poll_interval(Duration::from_millis(20));

    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(watcher.run(tx, cancel_clone));

    let record = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(record.value["type"], "assistant");

    cancel.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn cancellation_mid_read_terminates_cleanly_with_no_further_emissions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("known.jsonl"), "{\"a\":1}\n").unwrap();

    let watcher = TranscriptWatcher::with_known_session(dir.path().to_path_buf(), "known".to_string())
        .with_poll_interval(Duration::from_millis(20));

    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(watcher.run(tx, cancel_clone));

    rx.recv().await.unwrap();
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap().unwrap();
    assert!(rx.recv().await.is_none() || tokio::time::timeout(Duration::from_millis(100), rx.recv()).await.is_err());
}

#[test]
fn parse_errors_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.jsonl");
    std::fs::write(&path, "not json\n{\"ok\":true}\n").unwrap();

    let mut watcher = TranscriptWatcher::with_known_session(dir.path().to_path_buf(), "x".to_string());
    let records = watcher.read_new_lines(&path).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value["ok"], true);
}

#[test]
fn truncation_resets_the_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.jsonl");
    std::fs::write(&path, "{\"n\":1}\n{\"n\":2}\n").unwrap();

    let mut watcher = TranscriptWatcher::with_known_session(dir.path().to_path_buf(), "x".to_string());
    let first = watcher.read_new_lines(&path).unwrap();
    assert_eq!(first.len(), 2);

    std::fs::write(&path, "{\"n\":3}\n").unwrap();
    let second = watcher.read_new_lines(&path).unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].value["n"], 3);
}
