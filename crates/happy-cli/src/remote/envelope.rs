// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelope shapes exchanged with the server over the WebSocket
//! transport. Serialized as tagged JSON per envelope kind.

use serde::{Deserialize, Serialize};

/// Inbound envelopes the server may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Inbound {
    Update { body: UpdateBody },
    RpcRequest { id: String, method: String, params: Option<String> },
    SessionUpdateStateAck(StateAck),
    MachineUpdateStateAck(StateAck),
    Pong,
}

/// Tagged body of an `update` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UpdateBody {
    UpdateMachine { value: String, version: u64 },
    NewMessage { value: String },
    NewSession { value: String },
}

/// Result of a versioned state write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AckResult {
    Success,
    VersionMismatch,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateAck {
    pub field: String,
    pub result: AckResult,
    pub version: u64,
    pub ciphertext: Option<String>,
}

/// Outbound envelopes this client may publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Outbound {
    /// Session events: ready, message, switch.
    SessionEvent { scope: String, event: String, data: serde_json::Value },
    /// Assistant messages: output, output-passive-observer, message,
    /// tool-call, tool-call-result, thinking, turn_aborted, task_started,
    /// task_complete.
    AssistantMessage { scope: String, kind: String, data: serde_json::Value },
    SessionUpdateState { scope: String, field: String, expected_version: u64, ciphertext: String },
    MachineUpdateState { scope: String, field: String, expected_version: u64, ciphertext: String },
    RpcRegister { scope: String, method: String },
    RpcUnregister { scope: String, method: String },
    RpcResponse { id: String, ciphertext: Option<String>, error: Option<String> },
    Ping { scope: String },
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
