// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic "thinking + mode" heartbeat so the mobile client sees accurate
//! activity state. Session scope ticks every 2s; the optional machine
//! scope ticks every 20s. Cancellation stops the loop; the supervisor
//! restarts it on reconnect by constructing a fresh `Keepalive`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::remote::client::RemoteClient;
use crate::supervisor::Mode;

pub const SESSION_INTERVAL: Duration = Duration::from_secs(2);
pub const MACHINE_INTERVAL: Duration = Duration::from_secs(20);

/// Emits a periodic "alive" session event carrying the current mode and
/// whether a child turn is in flight.
pub struct Keepalive {
    remote: Arc<RemoteClient>,
    mode: watch::Receiver<Mode>,
    thinking: watch::Receiver<bool>,
    interval: Duration,
}

impl Keepalive {
    pub fn new(
        remote: Arc<RemoteClient>,
        mode: watch::Receiver<Mode>,
        thinking: watch::Receiver<bool>,
        interval: Duration,
    ) -> Self {
        Self { remote, mode, thinking, interval }
    }

    pub async fn run(&mut self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tick.tick() => {
                    let mode = *self.mode.borrow();
                    let thinking = *self.thinking.borrow();
                    let _ = self
                        .remote
                        .publish_session_event("alive", json!({ "mode": mode.as_str(), "thinking": thinking }))
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "keepalive_tests.rs"]
mod tests;
