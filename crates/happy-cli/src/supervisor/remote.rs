// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One remote-mode turn: pull batches off the message queue, run each
//! through a fresh one-shot child invocation, and watch for whatever ends
//! the turn — a local keystroke, an RPC switch/kill, or running dry with
//! nothing left to do but wait.

use std::sync::Arc;

use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::child::driver::{Batch, ChildDriver};
use crate::dedup::ScannerDedup;
use crate::permission::PermissionBroker;
use crate::queue::MessageQueue;
use crate::remote::client::RemoteClient;

use super::ControlSignal;

/// Why a remote turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteTurnOutcome {
    /// A local keystroke was detected, or an RPC requested a switch.
    SwitchToLocal,
    /// An RPC requested the session be killed.
    Killed,
}

pub struct RemoteTurnResult {
    pub outcome: RemoteTurnOutcome,
    pub resume_id: Option<String>,
}

pub struct RemoteTurnCtx<'a> {
    pub driver: &'a ChildDriver,
    pub queue: Arc<MessageQueue>,
    pub broker: Arc<PermissionBroker>,
    pub remote: Arc<RemoteClient>,
    pub dedup: &'a mut ScannerDedup,
    pub resume_id: Option<String>,
    pub control_rx: broadcast::Receiver<ControlSignal>,
    pub thinking_tx: watch::Sender<bool>,
}

/// Run one remote turn to completion. Cuts batches off the queue one mode
/// descriptor at a time, spawns a one-shot child per batch, and keeps
/// going until the turn is ended from outside (local keystroke, switch,
/// kill) or the queue wait itself is cancelled.
pub async fn run_remote_turn(mut ctx: RemoteTurnCtx<'_>) -> anyhow::Result<RemoteTurnResult> {
    let mut resume_id = ctx.resume_id;
    let turn_cancel = CancellationToken::new();

    let (local_input_tx, mut local_input_rx) = mpsc::channel::<()>(1);
    let stdin_cancel = turn_cancel.clone();
    let stdin_handle = tokio::spawn(watch_local_stdin(local_input_tx, stdin_cancel));

    let outcome = 'turn: loop {
        let wait_cancel = CancellationToken::new();
        let wait_result = tokio::select! {
            batch = ctx.queue.wait_for_messages(&wait_cancel) => batch,
            _ = local_input_rx.recv() => break 'turn RemoteTurnOutcome::SwitchToLocal,
            signal = ctx.control_rx.recv() => {
                match signal {
                    Ok(ControlSignal::Switch) => break 'turn RemoteTurnOutcome::SwitchToLocal,
                    Ok(ControlSignal::Kill) => break 'turn RemoteTurnOutcome::Killed,
                    Ok(ControlSignal::Abort) | Err(_) => continue 'turn,
                }
            }
        };

        let Some((text, descriptor)) = wait_result else { continue 'turn };

        for line in text.split('\n') {
            ctx.dedup.record_delivered(line);
        }

        let batch = Batch { text, permission_mode: descriptor.permission_mode, model: descriptor.model };
        ctx.thinking_tx.send_replace(true);

        let run_cancel = turn_cancel.clone();
        let mut driver_future =
            Box::pin(ctx.driver.run_batch(&batch, resume_id.as_deref(), &ctx.broker, &ctx.remote, &run_cancel));

        let mut pending: Option<RemoteTurnOutcome> = None;
        loop {
            tokio::select! {
                result = &mut driver_future => {
                    ctx.thinking_tx.send_replace(false);
                    match result {
                        Ok((_outcome, id)) => {
                            if let Some(id) = id {
                                resume_id = Some(id);
                            }
                            // Only announce readiness if nothing preempted this
                            // batch — a pending switch/kill already owns the
                            // turn's outcome and drains instead of idling.
                            if pending.is_none() {
                                let _ = ctx.remote.publish_session_event("ready", json!({})).await;
                            }
                        }
                        Err(e) => warn!(error = %e, "remote batch failed"),
                    }
                    break;
                }
                _ = local_input_rx.recv(), if !run_cancel.is_cancelled() => {
                    pending = Some(RemoteTurnOutcome::SwitchToLocal);
                    run_cancel.cancel();
                }
                signal = ctx.control_rx.recv(), if !run_cancel.is_cancelled() => {
                    match signal {
                        Ok(ControlSignal::Switch) => {
                            pending = Some(RemoteTurnOutcome::SwitchToLocal);
                            run_cancel.cancel();
                        }
                        Ok(ControlSignal::Kill) => {
                            pending = Some(RemoteTurnOutcome::Killed);
                            run_cancel.cancel();
                        }
                        Ok(ControlSignal::Abort) => run_cancel.cancel(),
                        Err(_) => {}
                    }
                }
            }
        }

        if let Some(outcome) = pending {
            break 'turn outcome;
        }
    };

    turn_cancel.cancel();
    let _ = stdin_handle.await;

    Ok(RemoteTurnResult { outcome, resume_id })
}

/// Detect the user typing at the local terminal while the child is not
/// attached to it. A single byte is enough to signal "take control back";
/// the local turn that follows spawns a fresh child with its own inherited
/// stdio, so nothing read here needs to be replayed to it.
///
/// A daemon-started session may have no terminal attached at all, in which
/// case stdin reads EOF immediately. That must not be treated as "switch to
/// local" — it just means there is nothing to watch, so the sender is kept
/// alive and this simply waits for cancellation instead of returning.
async fn watch_local_stdin(signal: mpsc::Sender<()>, cancel: CancellationToken) {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 1];
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = stdin.read(&mut buf) => {
            if matches!(result, Ok(n) if n > 0) {
                let _ = signal.send(()).await;
            } else {
                cancel.cancelled().await;
            }
        }
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
