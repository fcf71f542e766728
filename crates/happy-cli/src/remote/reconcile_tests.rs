use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use super::*;
use crate::crypto::legacy::LegacyCipher;

fn cipher() -> Cipher {
    Cipher::Legacy(LegacyCipher::new(&[3u8; 32]).unwrap())
}

struct ScriptedWriter {
    acks: Mutex<Vec<StateAck>>,
    calls: AtomicU32,
}

impl ScriptedWriter {
    fn new(acks: Vec<StateAck>) -> Self {
        Self { acks: Mutex::new(acks), calls: AtomicU32::new(0) }
    }
}

impl StateWriter for ScriptedWriter {
    fn write<'a>(
        &'a self,
        _field: &'a str,
        _expected_version: u64,
        _ciphertext: String,
    ) -> BoxFuture<'a, anyhow::Result<StateAck>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut acks = self.acks.lock().unwrap();
            Ok(acks.remove(0))
        })
    }
}

#[tokio::test]
async fn success_on_first_attempt_updates_doc() {
    let cipher = cipher();
    let mut doc = VersionedDoc { version: 5, plaintext: b"{}".to_vec() };
    let writer = ScriptedWriter::new(vec![StateAck {
        field: "agent-state".into(),
        result: AckResult::Success,
        version: 6,
        ciphertext: None,
    }]);

    reconcile_write(&mut doc, "agent-state", &cipher, &writer, |_| b"new".to_vec(), 3).await.unwrap();

    assert_eq!(doc.version, 6);
    assert_eq!(doc.plaintext, b"new");
}

#[tokio::test]
async fn version_mismatch_adopts_server_value_and_retries() {
    let cipher = cipher();
    let server_ciphertext = cipher.encrypt(b"server-value").unwrap();

    let mut doc = VersionedDoc { version: 5, plaintext: b"stale".to_vec() };
    let writer = ScriptedWriter::new(vec![
        StateAck {
            field: "agent-state".into(),
            result: AckResult::VersionMismatch,
            version: 7,
            ciphertext: Some(server_ciphertext),
        },
        StateAck { field: "agent-state".into(), result: AckResult::Success, version: 8, ciphertext: None },
    ]);

    let mut seen_on_retry = Vec::new();
    reconcile_write(&mut doc, "agent-state", &cipher, &writer, |current| {
        seen_on_retry.push(current.to_vec());
        let mut next = current.to_vec();
        next.extend_from_slice(b"+mutated");
        next
    }, 3)
    .await
    .unwrap();

    assert_eq!(doc.version, 8);
    assert_eq!(doc.plaintext, b"server-value+mutated");
    assert_eq!(seen_on_retry[1], b"server-value");
}

#[tokio::test]
async fn error_retries_then_succeeds_within_budget() {
    let cipher = cipher();
    let mut doc = VersionedDoc { version: 1, plaintext: b"x".to_vec() };
    let writer = ScriptedWriter::new(vec![
        StateAck { field: "agent-state".into(), result: AckResult::Error, version: 1, ciphertext: None },
        StateAck { field: "agent-state".into(), result: AckResult::Success, version: 2, ciphertext: None },
    ]);

    reconcile_write(&mut doc, "agent-state", &cipher, &writer, |_| b"y".to_vec(), 3).await.unwrap();
    assert_eq!(doc.version, 2);
}

#[tokio::test]
async fn error_exhausting_retries_is_reported() {
    let cipher = cipher();
    let mut doc = VersionedDoc { version: 1, plaintext: b"x".to_vec() };
    let writer = ScriptedWriter::new(vec![
        StateAck { field: "agent-state".into(), result: AckResult::Error, version: 1, ciphertext: None },
        StateAck { field: "agent-state".into(), result: AckResult::Error, version: 1, ciphertext: None },
    ]);

    let result = reconcile_write(&mut doc, "agent-state", &cipher, &writer, |_| b"y".to_vec(), 1).await;
    assert!(result.is_err());
}
