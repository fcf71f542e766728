use std::time::Duration;

use super::*;

#[tokio::test]
async fn batches_consecutive_messages_with_same_fingerprint() {
    let q = MessageQueue::new();
    q.push("a".into(), "default".into(), None).await;
    q.push("b".into(), "default".into(), None).await;

    let cancel = CancellationToken::new();
    let batch = q.wait_for_messages_as_string(&cancel).await.unwrap();
    assert_eq!(batch, "a\nb");
    assert_eq!(q.size().await, 0);
}

#[tokio::test]
async fn cuts_batch_at_fingerprint_change() {
    let q = MessageQueue::new();
    q.push("a".into(), "default".into(), None).await;
    q.push("b".into(), "plan".into(), None).await;
    q.push("c".into(), "plan".into(), None).await;

    let cancel = CancellationToken::new();
    let (first, descriptor) = q.wait_for_messages(&cancel).await.unwrap();
    assert_eq!(first, "a");
    assert_eq!(descriptor.permission_mode, "default");

    let (second, descriptor) = q.wait_for_messages(&cancel).await.unwrap();
    assert_eq!(second, "b\nc");
    assert_eq!(descriptor.permission_mode, "plan");
}

#[tokio::test]
async fn wait_blocks_until_push() {
    let q = std::sync::Arc::new(MessageQueue::new());
    let cancel = CancellationToken::new();

    let waiter = tokio::spawn({
        let q = q.clone();
        let cancel = cancel.clone();
        async move { q.wait_for_messages_as_string(&cancel).await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    q.push("late".into(), "default".into(), None).await;

    let result = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert_eq!(result.unwrap(), "late");
}

#[tokio::test]
async fn cancellation_unblocks_wait_with_none() {
    let q = MessageQueue::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert_eq!(q.wait_for_messages_as_string(&cancel).await, None);
}

#[tokio::test]
async fn reset_drops_all_items() {
    let q = MessageQueue::new();
    q.push("a".into(), "default".into(), None).await;
    q.push("b".into(), "default".into(), None).await;
    q.reset().await;
    assert_eq!(q.size().await, 0);
}

#[tokio::test]
async fn push_notifies_subscribers_synchronously() {
    let q = MessageQueue::new();
    let mut rx = q.subscribe();
    q.push("hello".into(), "default".into(), None).await;
    let (text, _) = rx.recv().await.unwrap();
    assert_eq!(text, "hello");
}

#[test]
fn fingerprint_is_deterministic_for_equal_descriptors() {
    assert_eq!(ModeFingerprint::new("default", Some("sonnet")), ModeFingerprint::new("default", Some("sonnet")));
    assert_ne!(ModeFingerprint::new("default", Some("sonnet")), ModeFingerprint::new("plan", Some("sonnet")));
}
