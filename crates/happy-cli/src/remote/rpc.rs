// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound RPC dispatch: `{method, params}` → lookup handler under the
//! scope → await handler → reply. Method names may arrive scoped
//! (`sid:name`) or bare (`name`); the registry accepts both.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::RpcError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type HandlerFn = dyn Fn(serde_json::Value) -> BoxFuture<anyhow::Result<serde_json::Value>> + Send + Sync;

/// Registered handler keyed by bare method name within one scope.
#[derive(Clone)]
pub struct RpcHandler(Arc<HandlerFn>);

impl RpcHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<serde_json::Value>> + Send + 'static,
    {
        Self(Arc::new(move |params| Box::pin(f(params))))
    }

    async fn call(&self, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        (self.0)(params).await
    }
}

/// Methods registered under one scope (e.g. the session scope `sid`).
pub struct RpcRegistry {
    scope: String,
    handlers: Mutex<HashMap<String, RpcHandler>>,
}

impl RpcRegistry {
    pub fn new(scope: impl Into<String>) -> Self {
        Self { scope: scope.into(), handlers: Mutex::new(HashMap::new()) }
    }

    pub async fn register(&self, method: impl Into<String>, handler: RpcHandler) {
        self.handlers.lock().await.insert(method.into(), handler);
    }

    pub async fn unregister(&self, method: &str) {
        self.handlers.lock().await.remove(method);
    }

    /// Every bare method name currently registered, for `rpc-register`
    /// announcements on (re)connect.
    pub async fn registered_methods(&self) -> Vec<String> {
        self.handlers.lock().await.keys().cloned().collect()
    }

    /// Dispatch `method`, which may be scoped (`scope:name`) or bare
    /// (`name`). Decrypted `params` are passed straight through; the caller
    /// is responsible for decrypting inbound and encrypting the result.
    pub async fn dispatch(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RpcError> {
        let bare = method.strip_prefix(&format!("{}:", self.scope)).unwrap_or(method);

        let handler = {
            let guard = self.handlers.lock().await;
            guard.get(bare).cloned()
        };

        let Some(handler) = handler else {
            return Err(RpcError::UnknownMethod { method: method.to_string() });
        };

        handler
            .call(params)
            .await
            .map_err(|e| RpcError::HandlerFailed { method: method.to_string(), detail: e.to_string() })
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
