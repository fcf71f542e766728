// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classifies decoded stream-json records from the child into the
//! categories the remote driver forwards to the remote session client.

use serde_json::Value;

const FS_EDIT_TOOLS: &[&str] = &["Write", "Edit", "NotebookEdit", "MultiEdit"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    ModelOutput,
    Status,
    ToolCall { name: String },
    ToolResult,
    Thinking,
    FsEdit { name: String },
    PermissionRequest { tool_name: String, arguments: Value },
    TaskStarted,
    TaskComplete,
}

/// Classify a single decoded JSON record. Returns `None` for records that
/// carry no actionable content (e.g. an empty content array).
pub fn classify(value: &Value) -> Option<RecordKind> {
    match value.get("type").and_then(Value::as_str) {
        Some("system") => {
            if value.get("subtype").and_then(Value::as_str) == Some("init") {
                Some(RecordKind::TaskStarted)
            } else {
                Some(RecordKind::Status)
            }
        }
        Some("user") => Some(RecordKind::Status),
        Some("result") => Some(RecordKind::TaskComplete),
        Some("control_request") => {
            let tool_name = value.get("tool_name").and_then(Value::as_str)?.to_string();
            let arguments = value.get("arguments").cloned().unwrap_or(Value::Null);
            Some(RecordKind::PermissionRequest { tool_name, arguments })
        }
        Some("assistant") => classify_assistant_message(value),
        _ => None,
    }
}

fn classify_assistant_message(value: &Value) -> Option<RecordKind> {
    let blocks = value.get("message")?.get("content")?.as_array()?;

    for block in blocks {
        if let Some("tool_use") = block.get("type").and_then(Value::as_str) {
            let name = block.get("name").and_then(Value::as_str).unwrap_or("unknown").to_string();
            return Some(if FS_EDIT_TOOLS.contains(&name.as_str()) {
                RecordKind::FsEdit { name }
            } else {
                RecordKind::ToolCall { name }
            });
        }
    }

    for block in blocks {
        if let Some("tool_result") = block.get("type").and_then(Value::as_str) {
            return Some(RecordKind::ToolResult);
        }
    }

    for block in blocks {
        if let Some("thinking") = block.get("type").and_then(Value::as_str) {
            return Some(RecordKind::Thinking);
        }
    }

    for block in blocks {
        if let Some("text") = block.get("type").and_then(Value::as_str) {
            return Some(RecordKind::ModelOutput);
        }
    }

    None
}

/// Concatenate all `text` content blocks of a user-turn record, for the
/// transcript scanner's duplicate-suppression comparison against what was
/// just delivered as a remote message.
pub fn extract_user_text(value: &Value) -> Option<String> {
    if value.get("type").and_then(Value::as_str) != Some("user") {
        return None;
    }
    let content = value.get("message")?.get("content")?;

    if let Some(text) = content.as_str() {
        return if text.is_empty() { None } else { Some(text.to_string()) };
    }

    let blocks = content.as_array()?;
    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Read the transcript session id a record was written under, when the
/// child includes one. Used to learn the resume id for the next turn
/// without relying solely on the transcript filename.
pub fn extract_session_id(value: &Value) -> Option<String> {
    value.get("session_id").and_then(Value::as_str).map(str::to_string)
}

/// Concatenate all `text` content blocks of an assistant message.
pub fn extract_assistant_text(value: &Value) -> Option<String> {
    if value.get("type").and_then(Value::as_str) != Some("assistant") {
        return None;
    }
    let blocks = value.get("message")?.get("content")?.as_array()?;

    let text: String = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
