// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The encrypted, versioned, reconnectable connection to the server.
//! Publishes session events, assistant messages, and versioned state
//! writes; dispatches inbound RPC requests; auto-reconnects with
//! exponential backoff and re-registers RPC methods + heartbeat on every
//! (re)connect.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::crypto::Cipher;
use crate::remote::envelope::{AckResult, Inbound, Outbound, StateAck, UpdateBody};
use crate::remote::reconcile::StateWriter;
use crate::remote::rpc::RpcRegistry;

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(5);
const SESSION_HEARTBEAT: Duration = Duration::from_secs(2);
const MACHINE_HEARTBEAT: Duration = Duration::from_secs(20);
const OUTBOUND_BUFFER: usize = 256;

/// One connection scope (`session` or `machine`). Each owns its own RPC
/// namespace, heartbeat cadence, and outbound ordering.
pub struct RemoteClient {
    scope: String,
    is_machine_scope: bool,
    cipher: Arc<Cipher>,
    outbound_tx: mpsc::Sender<Outbound>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Outbound>>>,
    rpc_registry: Arc<RpcRegistry>,
    pending_acks: Arc<Mutex<HashMap<String, oneshot::Sender<StateAck>>>>,
    updates_tx: mpsc::Sender<UpdateBody>,
}

impl RemoteClient {
    pub fn new(
        scope: impl Into<String>,
        is_machine_scope: bool,
        cipher: Arc<Cipher>,
    ) -> (Self, mpsc::Receiver<UpdateBody>) {
        let scope = scope.into();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (updates_tx, updates_rx) = mpsc::channel(OUTBOUND_BUFFER);

        let client = Self {
            rpc_registry: Arc::new(RpcRegistry::new(scope.clone())),
            scope,
            is_machine_scope,
            cipher,
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            pending_acks: Arc::new(Mutex::new(HashMap::new())),
            updates_tx,
        };
        (client, updates_rx)
    }

    pub fn rpc_registry(&self) -> Arc<RpcRegistry> {
        self.rpc_registry.clone()
    }

    /// Take the outbound receiver without going through `run()`, so a test
    /// in another module can inspect what gets published.
    #[cfg(test)]
    pub(crate) async fn outbound_rx_for_test(&self) -> mpsc::Receiver<Outbound> {
        self.outbound_rx.lock().await.take().expect("outbound receiver already taken")
    }

    pub async fn publish_session_event(&self, event: &str, data: serde_json::Value) -> anyhow::Result<()> {
        self.send(Outbound::SessionEvent { scope: self.scope.clone(), event: event.to_string(), data }).await
    }

    pub async fn publish_assistant_message(&self, kind: &str, data: serde_json::Value) -> anyhow::Result<()> {
        self.send(Outbound::AssistantMessage { scope: self.scope.clone(), kind: kind.to_string(), data }).await
    }

    async fn send(&self, envelope: Outbound) -> anyhow::Result<()> {
        self.outbound_tx.send(envelope).await.map_err(|_| anyhow::anyhow!("remote client is shut down"))
    }

    /// Connect, pump, and auto-reconnect with exponential backoff until
    /// `cancel` fires. Call once; the outbound receiver is consumed here.
    pub async fn run(&self, url: &str, cancel: CancellationToken) -> anyhow::Result<()> {
        let mut outbound_rx =
            self.outbound_rx.lock().await.take().ok_or_else(|| anyhow::anyhow!("run() called twice"))?;
        let mut backoff = MIN_BACKOFF;

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            match tokio_tungstenite::connect_async(url).await {
                Ok((stream, _)) => {
                    backoff = MIN_BACKOFF;
                    if let Err(e) = self.pump(stream, &mut outbound_rx, &cancel).await {
                        warn!(error = %e, scope = %self.scope, "remote session connection lost");
                    }
                }
                Err(e) => warn!(error = %e, scope = %self.scope, "remote session connect failed"),
            }

            if cancel.is_cancelled() {
                return Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {},
                _ = cancel.cancelled() => return Ok(()),
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn pump(
        &self,
        stream: tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
        outbound_rx: &mut mpsc::Receiver<Outbound>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let (mut sink, mut stream) = stream.split();

        for method in self.rpc_registry.registered_methods().await {
            sink.send(to_message(&Outbound::RpcRegister { scope: self.scope.clone(), method })?).await?;
        }

        let cadence = if self.is_machine_scope { MACHINE_HEARTBEAT } else { SESSION_HEARTBEAT };
        let mut heartbeat = tokio::time::interval(cadence);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = heartbeat.tick() => {
                    sink.send(to_message(&Outbound::Ping { scope: self.scope.clone() })?).await?;
                }
                maybe_out = outbound_rx.recv() => {
                    let Some(out) = maybe_out else { return Ok(()) };
                    sink.send(to_message(&out)?).await?;
                }
                maybe_in = stream.next() => {
                    let Some(msg) = maybe_in else { anyhow::bail!("socket closed by peer") };
                    if let Message::Text(text) = msg? {
                        self.handle_inbound(&text, &mut sink).await?;
                    }
                }
            }
        }
    }

    async fn handle_inbound(
        &self,
        text: &str,
        sink: &mut (impl futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    ) -> anyhow::Result<()> {
        let inbound: Inbound = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "skipping unparseable inbound envelope");
                return Ok(());
            }
        };

        match inbound {
            Inbound::Update { body } => {
                let _ = self.updates_tx.send(body).await;
            }
            Inbound::Pong => {}
            Inbound::SessionUpdateStateAck(ack) | Inbound::MachineUpdateStateAck(ack) => {
                if let Some(tx) = self.pending_acks.lock().await.remove(&ack.field) {
                    let _ = tx.send(ack);
                }
            }
            Inbound::RpcRequest { id, method, params } => {
                // Params and the success result carry user/session content
                // and are decrypted/encrypted here, at the dispatch
                // boundary; only envelope fields (id, method name) stay
                // plaintext on the wire.
                let params_value = params
                    .as_deref()
                    .and_then(|ct| self.cipher.decrypt(ct))
                    .and_then(|bytes| serde_json::from_slice(&bytes).ok())
                    .unwrap_or(serde_json::Value::Null);

                let reply = match self.rpc_registry.dispatch(&method, params_value).await {
                    Ok(result) => match serde_json::to_vec(&result).map_err(anyhow::Error::from).and_then(|bytes| self.cipher.encrypt(&bytes)) {
                        Ok(ciphertext) => Outbound::RpcResponse { id, ciphertext: Some(ciphertext), error: None },
                        Err(e) => Outbound::RpcResponse { id, ciphertext: None, error: Some(e.to_string()) },
                    },
                    Err(e) => Outbound::RpcResponse { id, ciphertext: None, error: Some(e.to_string()) },
                };
                sink.send(to_message(&reply)?).await?;
            }
        }

        Ok(())
    }
}

impl StateWriter for RemoteClient {
    fn write<'a>(
        &'a self,
        field: &'a str,
        expected_version: u64,
        ciphertext: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<StateAck>> + Send + 'a>> {
        Box::pin(async move {
            let (tx, rx) = oneshot::channel();
            self.pending_acks.lock().await.insert(field.to_string(), tx);

            let envelope = if self.is_machine_scope {
                Outbound::MachineUpdateState {
                    scope: self.scope.clone(),
                    field: field.to_string(),
                    expected_version,
                    ciphertext,
                }
            } else {
                Outbound::SessionUpdateState {
                    scope: self.scope.clone(),
                    field: field.to_string(),
                    expected_version,
                    ciphertext,
                }
            };
            self.send(envelope).await?;

            match tokio::time::timeout(Duration::from_secs(30), rx).await {
                Ok(Ok(ack)) => Ok(ack),
                Ok(Err(_)) => anyhow::bail!("state writer dropped before ack arrived"),
                Err(_) => {
                    self.pending_acks.lock().await.remove(field);
                    Ok(StateAck { field: field.to_string(), result: AckResult::Error, version: expected_version, ciphertext: None })
                }
            }
        })
    }
}

fn to_message(envelope: &Outbound) -> anyhow::Result<Message> {
    Ok(Message::Text(serde_json::to_string(envelope)?.into()))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
