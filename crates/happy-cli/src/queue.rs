// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FIFO buffer of pending remote messages, batched by mode fingerprint so a
//! mode change always cuts a fresh batch boundary.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use tokio::sync::{broadcast, Notify};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// A hash of the mode descriptor (permission mode + model) that pending
/// messages are batched on. Two messages with the same fingerprint were
/// queued under the same child configuration and may be merged into one
/// batch; a fingerprint change always cuts the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModeFingerprint(u64);

impl ModeFingerprint {
    pub fn new(permission_mode: &str, model: Option<&str>) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        permission_mode.hash(&mut hasher);
        model.hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// The child configuration a queued message was submitted under. Carried
/// alongside the fingerprint so a batch can be turned directly into a
/// [`crate::child::driver::Batch`] without the caller having to keep its
/// own fingerprint → descriptor side table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDescriptor {
    pub permission_mode: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
struct PendingMessage {
    text: String,
    fingerprint: ModeFingerprint,
    descriptor: ModeDescriptor,
}

/// Ordered buffer of pending remote messages keyed by mode fingerprint.
///
/// Single-producer per scope, single-consumer (the remote turn is the only
/// consumer of `wait_for_messages_as_string`).
pub struct MessageQueue {
    items: Mutex<VecDeque<PendingMessage>>,
    notify: Notify,
    on_push: broadcast::Sender<(String, ModeFingerprint)>,
}

impl MessageQueue {
    pub fn new() -> Self {
        let (on_push, _) = broadcast::channel(256);
        Self { items: Mutex::new(VecDeque::new()), notify: Notify::new(), on_push }
    }

    /// Append a message under the given mode descriptor. Fires the push
    /// listener synchronously to whoever is subscribed (the local-mode
    /// supervisor uses this to request a switch the moment a remote
    /// message arrives).
    pub async fn push(&self, text: String, permission_mode: String, model: Option<String>) {
        let fingerprint = ModeFingerprint::new(&permission_mode, model.as_deref());
        let _ = self.on_push.send((text.clone(), fingerprint));
        self.items.lock().await.push_back(PendingMessage {
            text,
            fingerprint,
            descriptor: ModeDescriptor { permission_mode, model },
        });
        self.notify.notify_one();
    }

    /// Subscribe to the synchronous push listener.
    pub fn subscribe(&self) -> broadcast::Receiver<(String, ModeFingerprint)> {
        self.on_push.subscribe()
    }

    /// Block until at least one item is present or `cancel` fires, then
    /// drain consecutive items sharing the head's fingerprint and return
    /// their concatenation. The remainder is left for the next call.
    pub async fn wait_for_messages_as_string(&self, cancel: &CancellationToken) -> Option<String> {
        self.wait_for_messages(cancel).await.map(|(text, _)| text)
    }

    /// Like [`Self::wait_for_messages_as_string`], but also returns the
    /// mode descriptor the batch was cut under, so the caller can spawn
    /// the child with the right permission mode and model.
    pub async fn wait_for_messages(&self, cancel: &CancellationToken) -> Option<(String, ModeDescriptor)> {
        loop {
            {
                let mut guard = self.items.lock().await;
                if let Some(front) = guard.front() {
                    let fingerprint = front.fingerprint;
                    let descriptor = front.descriptor.clone();
                    let mut batch = Vec::new();
                    while guard.front().map(|m| m.fingerprint) == Some(fingerprint) {
                        let Some(item) = guard.pop_front() else { break };
                        batch.push(item.text);
                    }
                    return Some((batch.join("\n"), descriptor));
                }
            }

            tokio::select! {
                _ = self.notify.notified() => continue,
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Drop all queued items. Used on remote → local switch.
    pub async fn reset(&self) {
        self.items.lock().await.clear();
    }

    /// Advisory only; not safe to use for flow control.
    pub async fn size(&self) -> usize {
        self.items.lock().await.len()
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
