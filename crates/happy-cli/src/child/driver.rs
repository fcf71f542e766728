// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invokes the child in one-shot stream-json mode per batch, classifies
//! each decoded record, and forwards it through the remote session client.
//! Tracks `isResponseInProgress` / `accumulatedResponse` so the first model
//! output delta opens a new assistant message and later deltas append to
//! it; completion flushes the accumulator as a final `message` envelope.

use std::path::PathBuf;
use std::process::Stdio;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::classify::{classify, extract_assistant_text, extract_session_id, RecordKind};
use super::launcher::resume_args;
use crate::permission::{PermissionBroker, PermissionOutcome};
use crate::remote::client::RemoteClient;

/// One unit of work for the child driver: a concatenated text prompt plus
/// the mode descriptor it was batched under.
#[derive(Debug, Clone)]
pub struct Batch {
    pub text: String,
    pub permission_mode: String,
    pub model: Option<String>,
}

/// How a batch turn finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed,
    Aborted,
}

/// Runs one-shot child invocations, one process per batch.
pub struct ChildDriver {
    claude_bin: PathBuf,
    project_dir: PathBuf,
}

impl ChildDriver {
    pub fn new(claude_bin: PathBuf, project_dir: PathBuf) -> Self {
        Self { claude_bin, project_dir }
    }

    /// Run a single batch to completion or abort. On a change in mode
    /// fingerprint between batches the caller is expected to call this
    /// again with a fresh `Self` bound to the new mode — the driver itself
    /// disposes its child at the end of every batch regardless.
    ///
    /// Returns the batch outcome plus the transcript session id observed
    /// in the child's own records, if any, so the caller can thread it
    /// through as the next `--resume` argument.
    pub async fn run_batch(
        &self,
        batch: &Batch,
        resume_id: Option<&str>,
        broker: &PermissionBroker,
        remote: &RemoteClient,
        cancel: &CancellationToken,
    ) -> anyhow::Result<(BatchOutcome, Option<String>)> {
        let mut child = self.spawn(batch, resume_id)?;
        let mut stdin = child.stdin.take().ok_or_else(|| anyhow::anyhow!("child stdin unavailable"))?;
        write_prompt(&mut stdin, &batch.text).await?;

        let stdout = child.stdout.take().ok_or_else(|| anyhow::anyhow!("child stdout unavailable"))?;
        let mut lines = BufReader::new(stdout).lines();

        let mut in_progress = false;
        let mut accumulated = String::new();
        let mut session_id: Option<String> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.start_kill();
                    let _ = remote.publish_assistant_message("turn_aborted", json!({})).await;
                    return Ok((BatchOutcome::Aborted, session_id));
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let value: serde_json::Value = match serde_json::from_str(&line) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(error = %e, "skipping unparseable child record");
                            continue;
                        }
                    };

                    if let Some(id) = extract_session_id(&value) {
                        session_id = Some(id);
                    }

                    let Some(kind) = classify(&value) else { continue };
                    if self
                        .handle_record(kind, &value, &mut stdin, &mut in_progress, &mut accumulated, broker, remote, cancel)
                        .await?
                    {
                        break;
                    }
                }
            }
        }

        if in_progress {
            let _ = remote.publish_assistant_message("message", json!({ "text": accumulated })).await;
        }

        drop(stdin);
        let _ = child.wait().await;
        Ok((BatchOutcome::Completed, session_id))
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_record(
        &self,
        kind: RecordKind,
        value: &serde_json::Value,
        stdin: &mut ChildStdin,
        in_progress: &mut bool,
        accumulated: &mut String,
        broker: &PermissionBroker,
        remote: &RemoteClient,
        cancel: &CancellationToken,
    ) -> anyhow::Result<bool> {
        match kind {
            RecordKind::ModelOutput => {
                if let Some(text) = extract_assistant_text(value) {
                    if !*in_progress {
                        *in_progress = true;
                        accumulated.clear();
                    }
                    let _ = remote.publish_assistant_message("output", json!({ "text": text })).await;
                    accumulated.push_str(&text);
                }
            }
            RecordKind::ToolCall { name } => {
                let _ = remote.publish_assistant_message("tool-call", json!({ "name": name })).await;
            }
            RecordKind::FsEdit { name } => {
                let _ = remote.publish_assistant_message("fs-edit", json!({ "name": name })).await;
            }
            RecordKind::ToolResult => {
                let _ = remote.publish_assistant_message("tool-call-result", json!({})).await;
            }
            RecordKind::Thinking => {
                let _ = remote.publish_assistant_message("thinking", json!({})).await;
            }
            RecordKind::Status => {
                let _ = remote.publish_assistant_message("status", value.clone()).await;
            }
            RecordKind::TaskStarted => {
                let _ = remote.publish_assistant_message("task_started", json!({})).await;
            }
            RecordKind::PermissionRequest { tool_name, arguments } => {
                let (id, receiver) = broker.request(tool_name.clone(), arguments.clone()).await;
                let _ = remote
                    .publish_assistant_message(
                        "permission-request",
                        json!({ "id": id, "toolName": tool_name, "arguments": arguments }),
                    )
                    .await;

                let outcome = tokio::select! {
                    outcome = receiver => outcome.unwrap_or(PermissionOutcome {
                        approved: false,
                        reason: Some("permission broker dropped the request".to_string()),
                    }),
                    _ = cancel.cancelled() => PermissionOutcome {
                        approved: false,
                        reason: Some("turn aborted".to_string()),
                    },
                };
                respond_to_child(stdin, &id, &outcome).await?;
            }
            RecordKind::TaskComplete => {
                if *in_progress {
                    let _ = remote.publish_assistant_message("message", json!({ "text": accumulated.clone() })).await;
                }
                *in_progress = false;
                accumulated.clear();
                let _ = remote.publish_assistant_message("task_complete", json!({})).await;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn spawn(&self, batch: &Batch, resume_id: Option<&str>) -> anyhow::Result<Child> {
        let mut command = tokio::process::Command::new(&self.claude_bin);
        command.current_dir(&self.project_dir);
        command.args(["--print", "--output-format", "stream-json"]);
        command.args(["--permission-mode", &batch.permission_mode]);
        if let Some(model) = &batch.model {
            command.args(["--model", model]);
        }
        command.args(resume_args(resume_id));
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::null());

        command.spawn().map_err(|e| anyhow::anyhow!("failed to spawn child driver process: {e}"))
    }
}

async fn write_prompt(stdin: &mut ChildStdin, text: &str) -> anyhow::Result<()> {
    let record = json!({
        "type": "user",
        "message": { "role": "user", "content": [{ "type": "text", "text": text }] },
    });
    let mut line = record.to_string();
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

async fn respond_to_child(stdin: &mut ChildStdin, id: &str, outcome: &PermissionOutcome) -> anyhow::Result<()> {
    let behavior = if outcome.approved { "allow" } else { "deny" };
    let record = json!({
        "type": "control_response",
        "id": id,
        "response": { "behavior": behavior, "message": outcome.reason },
    });
    let mut line = record.to_string();
    line.push('\n');
    stdin.write_all(line.as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
