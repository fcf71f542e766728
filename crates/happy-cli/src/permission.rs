// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps intercepted tool-call approval requests from the child into
//! round-tripped remote RPCs. The broker owns the pending-request map;
//! mutation is single-writer (supervisor-driven) per the concurrency model.

use std::collections::HashMap;
use std::time::SystemTime;

use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

/// The final disposition of a permission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionStatus {
    Approved,
    Denied,
    /// Forced cancel on switch to local mode.
    Canceled,
    /// Disconnect timeout.
    Expired,
    /// All outstanding requests are marked this way on `reset()`.
    Aborted,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Approved => "approved",
            CompletionStatus::Denied => "denied",
            CompletionStatus::Canceled => "canceled",
            CompletionStatus::Expired => "expired",
            CompletionStatus::Aborted => "abort",
        }
    }
}

/// What the child driver receives once a request resolves.
#[derive(Debug, Clone)]
pub struct PermissionOutcome {
    pub approved: bool,
    pub reason: Option<String>,
}

/// Emitted so the remote session client can mirror the pending-request map
/// into encrypted agent-state and push a mobile notification.
#[derive(Debug, Clone)]
pub enum PermissionEvent {
    Created { id: String, tool_name: String, arguments: serde_json::Value },
    Completed { id: String, status: CompletionStatus, completed_at: SystemTime },
}

struct PendingEntry {
    resolver: oneshot::Sender<PermissionOutcome>,
}

pub struct PermissionBroker {
    pending: Mutex<HashMap<String, PendingEntry>>,
    completed: Mutex<HashMap<String, CompletionStatus>>,
    events: mpsc::UnboundedSender<PermissionEvent>,
}

impl PermissionBroker {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PermissionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { pending: Mutex::new(HashMap::new()), completed: Mutex::new(HashMap::new()), events }, rx)
    }

    /// Register a new request and return its id plus a receiver that
    /// resolves with the first arriving outcome.
    pub async fn request(
        &self,
        tool_name: String,
        arguments: serde_json::Value,
    ) -> (String, oneshot::Receiver<PermissionOutcome>) {
        let id = Uuid::new_v4().to_string();
        let (resolver, receiver) = oneshot::channel();

        self.pending.lock().await.insert(id.clone(), PendingEntry { resolver });
        let _ = self.events.send(PermissionEvent::Created {
            id: id.clone(),
            tool_name,
            arguments,
        });

        (id, receiver)
    }

    /// Apply a remote `permission` RPC reply. Discards duplicate replies
    /// for an id that already completed.
    pub async fn resolve_remote(&self, id: &str, approved: bool, reason: Option<String>) {
        self.complete(id, PermissionOutcome { approved, reason }, if approved {
            CompletionStatus::Approved
        } else {
            CompletionStatus::Denied
        })
        .await;
    }

    /// Disconnect timeout: expire a single outstanding request.
    pub async fn expire(&self, id: &str) {
        self.complete(
            id,
            PermissionOutcome { approved: false, reason: Some("disconnect timeout".to_string()) },
            CompletionStatus::Expired,
        )
        .await;
    }

    /// On switch to local mode, every outstanding request resolves as
    /// `{approved:false, reason:"session switched to local mode"}`.
    pub async fn switch_to_local(&self) {
        let ids: Vec<String> = self.pending.lock().await.keys().cloned().collect();
        for id in ids {
            self.complete(
                &id,
                PermissionOutcome {
                    approved: false,
                    reason: Some("session switched to local mode".to_string()),
                },
                CompletionStatus::Canceled,
            )
            .await;
        }
    }

    /// On full reset, every outstanding request is marked `abort`.
    pub async fn reset(&self) {
        let ids: Vec<String> = self.pending.lock().await.keys().cloned().collect();
        for id in ids {
            self.complete(
                &id,
                PermissionOutcome { approved: false, reason: Some("reset".to_string()) },
                CompletionStatus::Aborted,
            )
            .await;
        }
    }

    /// True once every request that existed at some point has a completed
    /// status and none remain pending.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    async fn complete(&self, id: &str, outcome: PermissionOutcome, status: CompletionStatus) {
        let entry = self.pending.lock().await.remove(id);
        let Some(entry) = entry else {
            // Already completed (or never existed): duplicate reply, discard.
            return;
        };
        let _ = entry.resolver.send(outcome);
        self.completed.lock().await.insert(id.to_string(), status.clone());
        let _ = self.events.send(PermissionEvent::Completed {
            id: id.to_string(),
            status,
            completed_at: SystemTime::now(),
        });
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
