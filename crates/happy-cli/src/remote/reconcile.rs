// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version reconciliation for versioned encrypted documents (metadata,
//! agent-state, machine-state). Every write carries the `expectedVersion`
//! the caller last observed; on mismatch the server's current ciphertext is
//! decrypted, adopted, and the updater re-applied before retrying.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::crypto::Cipher;
use crate::remote::envelope::{AckResult, StateAck};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// In-memory replica of a versioned encrypted document.
#[derive(Debug, Clone, Default)]
pub struct VersionedDoc {
    pub version: u64,
    pub plaintext: Vec<u8>,
}

/// Sends a versioned write and awaits its ack. Implemented by the remote
/// session client over the real socket; tests use an in-memory fake.
pub trait StateWriter {
    fn write<'a>(
        &'a self,
        field: &'a str,
        expected_version: u64,
        ciphertext: String,
    ) -> BoxFuture<'a, anyhow::Result<StateAck>>;
}

fn backoff(attempt: u32) -> Duration {
    let millis = 200u64.saturating_mul(1u64 << attempt.min(4));
    Duration::from_millis(millis.min(5_000))
}

/// Reconcile and write a new value. `updater` must be a pure function of
/// the currently observed plaintext (mutators are idempotent functions of
/// current state, never absolute overwrites), so it is safe to re-run on
/// mismatch.
pub async fn reconcile_write<W: StateWriter>(
    doc: &mut VersionedDoc,
    field: &str,
    cipher: &Cipher,
    writer: &W,
    mut updater: impl FnMut(&[u8]) -> Vec<u8>,
    max_retries: u32,
) -> anyhow::Result<()> {
    for attempt in 0..=max_retries {
        let candidate = updater(&doc.plaintext);
        let ciphertext = cipher.encrypt(&candidate)?;
        let ack = writer.write(field, doc.version, ciphertext).await?;

        match ack.result {
            AckResult::Success => {
                doc.version = ack.version;
                doc.plaintext = candidate;
                return Ok(());
            }
            AckResult::VersionMismatch => {
                if let Some(ct) = ack.ciphertext.as_deref() {
                    if let Some(pt) = cipher.decrypt(ct) {
                        doc.version = ack.version;
                        doc.plaintext = pt;
                    }
                }
                continue;
            }
            AckResult::Error => {
                if attempt == max_retries {
                    anyhow::bail!("state write to {field} failed after {max_retries} retries");
                }
                tokio::time::sleep(backoff(attempt)).await;
                continue;
            }
        }
    }

    anyhow::bail!("state write to {field} exhausted retries without resolving")
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
