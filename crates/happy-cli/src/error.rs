// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Classified, recoverable error conditions named by the error handling
//! design. Everything else propagates as `anyhow::Error`.

use std::fmt;

/// Outcome of dispatching an inbound RPC request to a registered handler.
///
/// Both variants are encoded back to the caller as an encrypted `{error}`
/// reply; neither tears down the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// No handler is registered under the requested scope/method.
    UnknownMethod { method: String },
    /// A registered handler returned an error.
    HandlerFailed { method: String, detail: String },
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::UnknownMethod { method } => write!(f, "unknown method: {method}"),
            RpcError::HandlerFailed { method, detail } => {
                write!(f, "handler for {method} failed: {detail}")
            }
        }
    }
}

impl std::error::Error for RpcError {}

/// Fatal conditions detected before a session is created. These are reported
/// to stderr and the process exits non-zero; no partial session exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    MissingMachineId,
    UnreadableCredentials { detail: String },
    AuthRejected { detail: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::MissingMachineId => write!(f, "machine id is missing"),
            StartupError::UnreadableCredentials { detail } => {
                write!(f, "credentials file is unreadable: {detail}")
            }
            StartupError::AuthRejected { detail } => write!(f, "authentication rejected: {detail}"),
        }
    }
}

impl std::error::Error for StartupError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
