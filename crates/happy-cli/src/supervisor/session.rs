// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable server-side identity of a wrapped conversation
//! (`HappySession`), plus the two independently versioned encrypted
//! documents it maintains with the server: `Metadata` and `AgentState`.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permission::CompletionStatus;
use crate::remote::reconcile::VersionedDoc;

/// Durable identity of the conversation as seen by the server.
///
/// Created once via `getOrCreateSession(tag)` at startup; its lifetime is
/// the process lifetime. `tag` is a stable identifier for the working
/// directory so the server can recognize a returning session across
/// restarts, even though this implementation always mints a fresh id.
#[derive(Debug, Clone)]
pub struct HappySession {
    pub id: String,
    pub creation_tag: String,
}

impl HappySession {
    /// `getOrCreateSession(tag)`: this process never resumes a prior
    /// server-side session record, so it always mints a fresh id scoped
    /// to `tag` (the project directory).
    pub fn create(tag: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4().to_string(), creation_tag: tag.into() }
    }
}

/// Per-machine metadata, independent of any one session. Written through
/// the same versioned-document reconciliation protocol as session
/// metadata, one level up in scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineMetadata {
    pub host: String,
    pub platform: String,
    pub arch: String,
    pub happy_cli_version: String,
}

impl MachineMetadata {
    pub fn detect(happy_cli_version: impl Into<String>) -> Self {
        Self {
            host: hostname(),
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            happy_cli_version: happy_cli_version.into(),
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Encrypted session metadata: working directory, host, platform,
/// happy-cli version, machine id. Immutable for the life of the process
/// once computed, but still written through the versioned-document
/// protocol since the server is the source of truth for the counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    pub cwd: String,
    pub host: String,
    pub platform: String,
    pub happy_cli_version: String,
    pub machine_id: Uuid,
}

impl Metadata {
    pub fn new(cwd: impl Into<String>, machine_id: Uuid, happy_cli_version: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            host: hostname(),
            platform: std::env::consts::OS.to_string(),
            happy_cli_version: happy_cli_version.into(),
            machine_id,
        }
    }
}

/// Lifecycle of the agent-state document. `Archived` is set once, on
/// `kill`, and never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Active,
    Archived,
}

/// A permission request as mirrored into agent-state, independent of the
/// broker's in-memory resolver. Rebuilt from [`crate::permission::PermissionEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedRecord {
    pub status: String,
    pub completed_at_unix_ms: u64,
}

/// Encrypted agent-state: `controlledByUser`, the pending/completed
/// permission-request maps, and lifecycle. This is the plaintext shape;
/// callers serialize/encrypt it through [`crate::remote::reconcile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub controlled_by_user: bool,
    pub requests: HashMap<String, RequestRecord>,
    pub completed_requests: HashMap<String, CompletedRecord>,
    pub lifecycle_state: LifecycleState,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            controlled_by_user: true,
            requests: HashMap::new(),
            completed_requests: HashMap::new(),
            lifecycle_state: LifecycleState::Active,
        }
    }
}

impl AgentState {
    pub fn record_created(&mut self, id: String, tool_name: String, arguments: serde_json::Value) {
        self.requests.insert(id, RequestRecord { tool_name, arguments });
    }

    pub fn record_completed(&mut self, id: &str, status: CompletionStatus) {
        self.requests.remove(id);
        let completed_at_unix_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0);
        self.completed_requests
            .insert(id.to_string(), CompletedRecord { status: status.as_str().to_string(), completed_at_unix_ms });
    }

    pub fn archive(&mut self) {
        self.lifecycle_state = LifecycleState::Archived;
    }
}

/// A plaintext document plus the [`VersionedDoc`] tracking its server
/// version, bundled so callers don't have to keep the two in sync by hand.
pub struct TrackedDoc<T> {
    pub value: T,
    pub doc: VersionedDoc,
}

impl<T> TrackedDoc<T>
where
    T: Serialize + for<'de> Deserialize<'de> + Clone,
{
    pub fn new(value: T) -> anyhow::Result<Self> {
        let plaintext = serde_json::to_vec(&value)?;
        Ok(Self { value, doc: VersionedDoc { version: 0, plaintext } })
    }

    /// Re-derive `value` from `doc.plaintext`, e.g. after a reconciliation
    /// adopted a fresher server value.
    pub fn resync(&mut self) -> anyhow::Result<()> {
        self.value = serde_json::from_slice(&self.doc.plaintext)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
