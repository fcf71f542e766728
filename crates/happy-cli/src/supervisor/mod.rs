// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the mode-switching state machine: starts the ambient services
//! (remote connections, keep-alive, permission broker, message queue),
//! registers the RPC surface the server drives, then alternates local and
//! remote turns until the session is killed.

pub mod local;
pub mod remote;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::child::driver::ChildDriver;
use crate::child::launcher::ChildLauncher;
use crate::config::Config;
use crate::credentials::Credentials;
use crate::crypto::Cipher;
use crate::daemon;
use crate::dedup::ScannerDedup;
use crate::keepalive::{Keepalive, SESSION_INTERVAL};
use crate::permission::PermissionBroker;
use crate::queue::MessageQueue;
use crate::remote::client::RemoteClient;
use crate::remote::envelope::UpdateBody;
use crate::remote::reconcile::reconcile_write;
use crate::remote::rpc::RpcHandler;
use crate::settings::Settings;
use crate::transcript::transcripts_dir;

use session::{AgentState, HappySession, MachineMetadata, Metadata, TrackedDoc};

/// Which side is currently driving the child: the local terminal, or the
/// remote mobile client via one-shot batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Local,
    Remote,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Remote => "remote",
        }
    }
}

/// Out-of-band control delivered by an RPC handler to whichever turn is
/// currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Force a switch to the other mode.
    Switch,
    /// Abort the in-flight child turn without switching mode.
    Abort,
    /// Terminate the session entirely.
    Kill,
}

/// Why the supervisor loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    ChildExited,
    Killed,
}

/// The plaintext shape of a decrypted `new-message` update: the prompt text
/// plus the child configuration it should be batched under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomingMessage {
    text: String,
    #[serde(default = "default_permission_mode")]
    permission_mode: String,
    #[serde(default)]
    model: Option<String>,
}

fn default_permission_mode() -> String {
    "default".to_string()
}

/// Lets a process-level signal handler (SIGINT/SIGTERM) request the same
/// preemptive kill an RPC `kill` would, without reaching into the
/// supervisor's private turn-loop state. Cloneable so it can be handed to a
/// background task while `run()` consumes `self`.
#[derive(Clone)]
pub struct ShutdownHandle(broadcast::Sender<ControlSignal>);

impl ShutdownHandle {
    pub fn kill(&self) {
        let _ = self.0.send(ControlSignal::Kill);
    }
}

/// Ties every already-built component together into the session lifecycle:
/// startup, RPC registration, the local/remote turn loop, and shutdown.
pub struct Supervisor {
    config: Config,
    project_dir: PathBuf,
    home_dir: PathBuf,
    session: HappySession,
    remote: Arc<RemoteClient>,
    machine_remote: Option<Arc<RemoteClient>>,
    updates_rx: mpsc::Receiver<UpdateBody>,
    broker: Arc<PermissionBroker>,
    permission_events: mpsc::UnboundedReceiver<crate::permission::PermissionEvent>,
    queue: Arc<MessageQueue>,
    cipher: Arc<Cipher>,
    control_tx: broadcast::Sender<ControlSignal>,
    mode_tx: watch::Sender<Mode>,
    mode_rx: watch::Receiver<Mode>,
    thinking_tx: watch::Sender<bool>,
    thinking_rx: watch::Receiver<bool>,
    metadata: TrackedDoc<Metadata>,
    agent_state: TrackedDoc<AgentState>,
    machine_metadata: Option<TrackedDoc<MachineMetadata>>,
}

impl Supervisor {
    pub async fn new(config: Config, credentials: &Credentials, settings: &Settings) -> anyhow::Result<Self> {
        let cipher = Arc::new(credentials.build_cipher()?);
        let project_dir = config.resolved_project_dir()?;
        let home_dir = config.resolved_home_dir()?;
        let initial_mode = config.resolved_initial_mode()?;

        let session = HappySession::create(project_dir.to_string_lossy());

        let (remote, updates_rx) = RemoteClient::new(session.id.clone(), false, cipher.clone());
        let remote = Arc::new(remote);

        let machine_remote = if settings.machine_id_confirmed_by_server {
            let (client, _machine_updates) =
                RemoteClient::new(format!("machine:{}", settings.machine_id), true, cipher.clone());
            Some(Arc::new(client))
        } else {
            None
        };

        // Only a confirmed machine id has anything meaningful to report
        // over the machine scope; see the "machine scope is optional" open
        // question in DESIGN.md.
        let machine_metadata = if machine_remote.is_some() {
            Some(TrackedDoc::new(MachineMetadata::detect(env!("CARGO_PKG_VERSION")))?)
        } else {
            None
        };

        let (broker, permission_events) = PermissionBroker::new();
        let broker = Arc::new(broker);

        let queue = Arc::new(MessageQueue::new());
        let (control_tx, _) = broadcast::channel(32);
        let (mode_tx, mode_rx) = watch::channel(initial_mode);
        let (thinking_tx, thinking_rx) = watch::channel(false);

        let metadata = TrackedDoc::new(Metadata::new(
            project_dir.to_string_lossy(),
            settings.machine_id,
            env!("CARGO_PKG_VERSION"),
        ))?;
        let agent_state = TrackedDoc::new(AgentState::default())?;

        register_rpc_handlers(&remote, broker.clone(), control_tx.clone()).await;

        Ok(Self {
            config,
            project_dir,
            home_dir,
            session,
            remote,
            machine_remote,
            updates_rx,
            broker,
            permission_events,
            queue,
            cipher,
            control_tx,
            mode_tx,
            mode_rx,
            thinking_tx,
            thinking_rx,
            metadata,
            agent_state,
            machine_metadata,
        })
    }

    /// A handle the process entry point can use to request a graceful kill
    /// from outside the turn loop, e.g. on SIGINT/SIGTERM.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.control_tx.clone())
    }

    /// Run the session to completion: start ambient services, alternate
    /// local/remote turns, then archive and shut everything down.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let top_cancel = CancellationToken::new();

        daemon::notify_session_started(
            self.config.daemon_port,
            &self.session.id,
            json!({
                "cwd": self.metadata.value.cwd,
                "machineId": self.metadata.value.machine_id,
            }),
        )
        .await;

        let remote_pump = spawn_pump(self.remote.clone(), self.config.server_url.clone(), top_cancel.clone());
        let machine_pump = self
            .machine_remote
            .clone()
            .map(|client| spawn_pump(client, self.config.server_url.clone(), top_cancel.clone()));

        if let (Some(client), Some(mut doc)) = (self.machine_remote.clone(), self.machine_metadata.take()) {
            let cipher = self.cipher.clone();
            tokio::spawn(async move {
                let Ok(bytes) = serde_json::to_vec(&doc.value) else { return };
                let _ = reconcile_write(
                    &mut doc.doc,
                    "machine-metadata",
                    &cipher,
                    client.as_ref(),
                    move |_prev| bytes.clone(),
                    3,
                )
                .await;
            });
        }

        let keepalive_handle = {
            let mut keepalive =
                Keepalive::new(self.remote.clone(), self.mode_rx.clone(), self.thinking_rx.clone(), SESSION_INTERVAL);
            let cancel = top_cancel.clone();
            tokio::spawn(async move { keepalive.run(cancel).await })
        };

        let updates_handle = {
            let queue = self.queue.clone();
            let cipher = self.cipher.clone();
            let mut updates_rx = self.updates_rx;
            let cancel = top_cancel.clone();
            tokio::spawn(async move {
                route_updates(&mut updates_rx, &queue, &cipher, cancel).await;
            })
        };

        let agent_state_shared = Arc::new(AsyncMutex::new(self.agent_state.value.clone()));
        let mirror_cancel = CancellationToken::new();

        let permission_mirror_handle = {
            let broker_events = self.permission_events;
            let remote = self.remote.clone();
            let agent_state_shared = agent_state_shared.clone();
            let cancel = mirror_cancel.clone();
            tokio::spawn(async move {
                mirror_permission_events(broker_events, remote, agent_state_shared, cancel).await;
            })
        };

        let transcripts_dir = transcripts_dir(&self.home_dir, &self.project_dir);
        let launcher = ChildLauncher::new(self.config.claude_bin.clone(), self.project_dir.clone());
        let driver = ChildDriver::new(self.config.claude_bin.clone(), self.project_dir.clone());
        let mut dedup = ScannerDedup::new();
        let mut resume_id: Option<String> = None;
        let mut mode = *self.mode_rx.borrow();

        let reason = loop {
            self.mode_tx.send_replace(mode);
            let _ = self
                .remote
                .publish_session_event("switch", json!({ "mode": mode.as_str() }))
                .await;

            match mode {
                Mode::Local => {
                    let ctx = local::LocalTurnCtx {
                        launcher: &launcher,
                        transcripts_dir: transcripts_dir.clone(),
                        resume_id: resume_id.clone(),
                        extra_args: &self.config.extra_args,
                        remote: self.remote.clone(),
                        queue: self.queue.clone(),
                        dedup: &mut dedup,
                        control_rx: self.control_tx.subscribe(),
                    };
                    let result = local::run_local_turn(ctx).await?;
                    resume_id = result.resume_id.or(resume_id);
                    match result.outcome {
                        local::LocalTurnOutcome::SwitchToRemote => mode = Mode::Remote,
                        local::LocalTurnOutcome::Terminate => break TerminationReason::ChildExited,
                        local::LocalTurnOutcome::Killed => break TerminationReason::Killed,
                    }
                }
                Mode::Remote => {
                    self.queue.reset().await;
                    reconcile_controlled_by_user(
                        false,
                        &mut self.agent_state,
                        &agent_state_shared,
                        &self.cipher,
                        self.remote.as_ref(),
                    )
                    .await;
                    let ctx = remote::RemoteTurnCtx {
                        driver: &driver,
                        queue: self.queue.clone(),
                        broker: self.broker.clone(),
                        remote: self.remote.clone(),
                        dedup: &mut dedup,
                        resume_id: resume_id.clone(),
                        control_rx: self.control_tx.subscribe(),
                        thinking_tx: self.thinking_tx.clone(),
                    };
                    let result = remote::run_remote_turn(ctx).await?;
                    resume_id = result.resume_id.or(resume_id);
                    self.broker.switch_to_local().await;
                    match result.outcome {
                        remote::RemoteTurnOutcome::SwitchToLocal => {
                            reconcile_controlled_by_user(
                                true,
                                &mut self.agent_state,
                                &agent_state_shared,
                                &self.cipher,
                                self.remote.as_ref(),
                            )
                            .await;
                            mode = Mode::Local;
                        }
                        remote::RemoteTurnOutcome::Killed => break TerminationReason::Killed,
                    }
                }
            }
        };

        mirror_cancel.cancel();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), permission_mirror_handle).await;

        self.agent_state.value = agent_state_shared.lock().await.clone();
        self.agent_state.value.archive();
        let agent_state_bytes = serde_json::to_vec(&self.agent_state.value).unwrap_or_default();
        let agent_state_cipher = self.cipher.clone();
        let remote_for_write = self.remote.clone();
        let _ = reconcile_write(
            &mut self.agent_state.doc,
            "agent-state",
            &agent_state_cipher,
            remote_for_write.as_ref(),
            |_prev| agent_state_bytes.clone(),
            3,
        )
        .await;

        let _ = self
            .remote
            .publish_session_event("death", json!({ "reason": format!("{reason:?}") }))
            .await;

        top_cancel.cancel();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), remote_pump).await;
        if let Some(handle) = machine_pump {
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        }
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), keepalive_handle).await;
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), updates_handle).await;

        info!(session_id = %self.session.id, reason = ?reason, "session terminated");
        Ok(())
    }
}

/// Flip `controlledByUser` in agent-state and reconcile-write it to the
/// server immediately — spec §4.H requires the flag to go `false` the
/// instant a remote turn is announced and `true` the instant control
/// returns to the local terminal, not just at shutdown-archive time.
async fn reconcile_controlled_by_user(
    controlled_by_user: bool,
    tracked: &mut TrackedDoc<AgentState>,
    shared: &AsyncMutex<AgentState>,
    cipher: &Cipher,
    remote: &RemoteClient,
) {
    let snapshot = {
        let mut guard = shared.lock().await;
        guard.controlled_by_user = controlled_by_user;
        guard.clone()
    };
    tracked.value = snapshot.clone();
    let Ok(bytes) = serde_json::to_vec(&snapshot) else { return };
    let _ = reconcile_write(&mut tracked.doc, "agent-state", cipher, remote, move |_prev| bytes.clone(), 3).await;
}

fn spawn_pump(
    client: Arc<RemoteClient>,
    url: String,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { client.run(&url, cancel).await })
}

/// Register the RPC methods the server drives: remote approval/denial of a
/// pending permission request, and the three session-control verbs.
async fn register_rpc_handlers(
    remote: &RemoteClient,
    broker: Arc<PermissionBroker>,
    control_tx: broadcast::Sender<ControlSignal>,
) {
    let registry = remote.rpc_registry();

    let permission_broker = broker.clone();
    registry
        .register(
            "permission",
            RpcHandler::new(move |params| {
                let broker = permission_broker.clone();
                async move {
                    let id = params
                        .get("id")
                        .and_then(serde_json::Value::as_str)
                        .ok_or_else(|| anyhow::anyhow!("permission RPC missing id"))?
                        .to_string();
                    let approved = params.get("approved").and_then(serde_json::Value::as_bool).unwrap_or(false);
                    let reason = params.get("reason").and_then(serde_json::Value::as_str).map(str::to_string);
                    broker.resolve_remote(&id, approved, reason).await;
                    Ok(json!({ "ok": true }))
                }
            }),
        )
        .await;

    let abort_tx = control_tx.clone();
    registry
        .register(
            "abort",
            RpcHandler::new(move |_params| {
                let abort_tx = abort_tx.clone();
                async move {
                    let _ = abort_tx.send(ControlSignal::Abort);
                    Ok(json!({ "ok": true }))
                }
            }),
        )
        .await;

    let switch_tx = control_tx.clone();
    registry
        .register(
            "switch",
            RpcHandler::new(move |_params| {
                let switch_tx = switch_tx.clone();
                async move {
                    let _ = switch_tx.send(ControlSignal::Switch);
                    Ok(json!({ "ok": true }))
                }
            }),
        )
        .await;

    let kill_tx = control_tx.clone();
    registry
        .register(
            "kill",
            RpcHandler::new(move |_params| {
                let kill_tx = kill_tx.clone();
                async move {
                    let _ = kill_tx.send(ControlSignal::Kill);
                    Ok(json!({ "ok": true }))
                }
            }),
        )
        .await;
}

/// Decrypt and decode every `new-message` update, pushing the prompt onto
/// the message queue under its own mode descriptor. Other update kinds
/// (`update-machine`, `new-session`) are not queue inputs and are ignored
/// here; the server's own bookkeeping covers them.
async fn route_updates(
    updates_rx: &mut mpsc::Receiver<UpdateBody>,
    queue: &MessageQueue,
    cipher: &Cipher,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            maybe = updates_rx.recv() => {
                let Some(body) = maybe else { return };
                let UpdateBody::NewMessage { value } = body else { continue };
                let Some(plaintext) = cipher.decrypt(&value) else {
                    warn!("dropping new-message update: decryption failed");
                    continue;
                };
                match serde_json::from_slice::<IncomingMessage>(&plaintext) {
                    Ok(msg) => queue.push(msg.text, msg.permission_mode, msg.model).await,
                    Err(e) => warn!(error = %e, "dropping malformed new-message update"),
                }
            }
        }
    }
}

/// Mirror permission-broker events into the remote client's live feed and
/// into the encrypted agent-state document. Kept as its own task so the
/// broker never blocks on a slow reconciliation write; `agent_state` is
/// read back and persisted once, at shutdown.
async fn mirror_permission_events(
    mut events: mpsc::UnboundedReceiver<crate::permission::PermissionEvent>,
    remote: Arc<RemoteClient>,
    agent_state: Arc<AsyncMutex<AgentState>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            maybe = events.recv() => {
                let Some(event) = maybe else { return };
                match event {
                    crate::permission::PermissionEvent::Created { id, tool_name, arguments } => {
                        agent_state.lock().await.record_created(id.clone(), tool_name.clone(), arguments.clone());
                        let _ = remote
                            .publish_assistant_message(
                                "permission-request",
                                json!({ "id": id, "toolName": tool_name, "arguments": arguments }),
                            )
                            .await;
                    }
                    crate::permission::PermissionEvent::Completed { id, status, .. } => {
                        let status_str = status.as_str();
                        agent_state.lock().await.record_completed(&id, status);
                        let _ = remote
                            .publish_assistant_message(
                                "permission-resolved",
                                json!({ "id": id, "status": status_str }),
                            )
                            .await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
