// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget HTTP notification to a surrounding daemon process, if
//! any. Absence of the daemon is never a fatal error.

use tracing::{debug, warn};

/// POST `session-started {sessionId, metadata}` to the daemon's loopback
/// port. Logged and ignored on any failure — the daemon, if present, is a
/// convenience observer, never a dependency of the session.
pub async fn notify_session_started(daemon_port: Option<u16>, session_id: &str, metadata: serde_json::Value) {
    let Some(port) = daemon_port else {
        debug!("no daemon port configured, skipping session-started notification");
        return;
    };

    let url = format!("http://127.0.0.1:{port}/session-started");
    let body = serde_json::json!({ "sessionId": session_id, "metadata": metadata });

    let client = reqwest::Client::new();
    match client.post(&url).json(&body).send().await {
        Ok(resp) if resp.status().is_success() => debug!(%url, "notified daemon of session start"),
        Ok(resp) => warn!(%url, status = %resp.status(), "daemon rejected session-started notification"),
        Err(e) => warn!(%url, error = %e, "could not reach daemon, continuing without it"),
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
