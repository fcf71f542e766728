use serde_json::json;

use super::*;

#[yare::parameterized(
    system_message = {
        json!({ "type": "system" }),
        Some(RecordKind::Status)
    },
    system_init_message = {
        json!({ "type": "system", "subtype": "init" }),
        Some(RecordKind::TaskStarted)
    },
    user_message = {
        json!({ "type": "user" }),
        Some(RecordKind::Status)
    },
    result_message = {
        json!({ "type": "result", "subtype": "success" }),
        Some(RecordKind::TaskComplete)
    },
    assistant_text_only = {
        json!({ "type": "assistant", "message": { "content": [{ "type": "text", "text": "hi" }] } }),
        Some(RecordKind::ModelOutput)
    },
    assistant_thinking = {
        json!({ "type": "assistant", "message": { "content": [{ "type": "thinking", "thinking": "..." }] } }),
        Some(RecordKind::Thinking)
    },
    assistant_tool_result = {
        json!({ "type": "assistant", "message": { "content": [{ "type": "tool_result" }] } }),
        Some(RecordKind::ToolResult)
    },
    assistant_empty_content = {
        json!({ "type": "assistant", "message": { "content": [] } }),
        None
    },
    unknown_type = {
        json!({ "type": "ping" }),
        None
    },
)]
fn classify_matches(value: serde_json::Value, expected: Option<RecordKind>) {
    assert_eq!(classify(&value), expected);
}

#[test]
fn tool_use_on_a_write_tool_is_classified_as_fs_edit() {
    let value = json!({
        "type": "assistant",
        "message": { "content": [{ "type": "tool_use", "name": "Write", "input": {} }] }
    });
    assert_eq!(classify(&value), Some(RecordKind::FsEdit { name: "Write".to_string() }));
}

#[test]
fn tool_use_on_a_non_editing_tool_is_a_plain_tool_call() {
    let value = json!({
        "type": "assistant",
        "message": { "content": [{ "type": "tool_use", "name": "Bash", "input": {} }] }
    });
    assert_eq!(classify(&value), Some(RecordKind::ToolCall { name: "Bash".to_string() }));
}

#[test]
fn control_request_carries_tool_name_and_arguments() {
    let value = json!({
        "type": "control_request",
        "tool_name": "write_file",
        "arguments": { "path": "/tmp/x" }
    });
    assert_eq!(
        classify(&value),
        Some(RecordKind::PermissionRequest {
            tool_name: "write_file".to_string(),
            arguments: json!({ "path": "/tmp/x" }),
        })
    );
}

#[test]
fn extract_assistant_text_concatenates_text_blocks() {
    let value = json!({
        "type": "assistant",
        "message": { "content": [
            { "type": "text", "text": "Hello " },
            { "type": "text", "text": "world" }
        ] }
    });
    assert_eq!(extract_assistant_text(&value).as_deref(), Some("Hello world"));
}

#[test]
fn extract_assistant_text_is_none_for_non_assistant_records() {
    assert_eq!(extract_assistant_text(&json!({ "type": "system" })), None);
}
