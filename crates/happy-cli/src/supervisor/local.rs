// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One local-mode turn: the child owns the terminal directly while this
//! process watches its transcript as a passive observer and waits for a
//! reason to hand control to the remote side.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::child::classify::extract_user_text;
use crate::child::launcher::ChildLauncher;
use crate::dedup::ScannerDedup;
use crate::queue::MessageQueue;
use crate::remote::client::RemoteClient;
use crate::transcript::{TranscriptRecord, TranscriptWatcher};

use super::ControlSignal;

/// Why a local turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTurnOutcome {
    /// A remote message arrived, or an RPC requested a switch.
    SwitchToRemote,
    /// The child exited on its own.
    Terminate,
    /// An RPC requested the session be killed.
    Killed,
}

pub struct LocalTurnResult {
    pub outcome: LocalTurnOutcome,
    pub resume_id: Option<String>,
}

pub struct LocalTurnCtx<'a> {
    pub launcher: &'a ChildLauncher,
    pub transcripts_dir: PathBuf,
    pub resume_id: Option<String>,
    pub extra_args: &'a [String],
    pub remote: Arc<RemoteClient>,
    pub queue: Arc<MessageQueue>,
    pub dedup: &'a mut ScannerDedup,
    pub control_rx: broadcast::Receiver<ControlSignal>,
}

/// Run one local turn to completion. Spawns the child with inherited
/// stdio, tails its transcript as a passive observer, and returns once the
/// child exits, a switch is requested (by a queued remote message or an
/// RPC), or the session is killed.
pub async fn run_local_turn(mut ctx: LocalTurnCtx<'_>) -> anyhow::Result<LocalTurnResult> {
    let turn_cancel = CancellationToken::new();

    let watcher = match ctx.resume_id.clone() {
        Some(id) => TranscriptWatcher::with_known_session(ctx.transcripts_dir.clone(), id),
        None => TranscriptWatcher::new(ctx.transcripts_dir.clone()),
    };
    let (record_tx, mut record_rx) = mpsc::channel::<TranscriptRecord>(256);
    let watcher_cancel = turn_cancel.clone();
    let watcher_handle = tokio::spawn(watcher.run(record_tx, watcher_cancel));

    let mut child = ctx.launcher.spawn(ctx.resume_id.as_deref(), ctx.extra_args)?;
    let mut queue_rx = ctx.queue.subscribe();

    // A remote message may already be waiting from before this turn
    // started (e.g. one arrived while the previous remote turn was
    // wrapping up); honor it immediately instead of waiting for a new push.
    let outcome = if ctx.queue.size().await > 0 {
        LocalTurnOutcome::SwitchToRemote
    } else {
        loop {
            tokio::select! {
                status = child.run_until(&turn_cancel) => {
                    status?;
                    break LocalTurnOutcome::Terminate;
                }
                _ = queue_rx.recv() => {
                    break LocalTurnOutcome::SwitchToRemote;
                }
                signal = ctx.control_rx.recv() => {
                    match signal {
                        Ok(ControlSignal::Switch) => break LocalTurnOutcome::SwitchToRemote,
                        Ok(ControlSignal::Kill) => break LocalTurnOutcome::Killed,
                        Ok(ControlSignal::Abort) | Err(_) => continue,
                    }
                }
                record = record_rx.recv() => {
                    let Some(record) = record else { continue };
                    if let Some(text) = extract_user_text(&record.value) {
                        if ctx.dedup.should_suppress(&text) {
                            continue;
                        }
                    }
                    let _ = ctx.remote.publish_assistant_message("output-passive-observer", record.value.clone()).await;
                }
            }
        }
    };

    turn_cancel.cancel();
    if matches!(outcome, LocalTurnOutcome::SwitchToRemote | LocalTurnOutcome::Killed) {
        let _ = child.terminate().await;
    }

    let mut resume_id = ctx.resume_id;
    if let Ok(Ok(Some(id))) = watcher_handle.await {
        resume_id = Some(id);
    }

    Ok(LocalTurnResult { outcome, resume_id })
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
