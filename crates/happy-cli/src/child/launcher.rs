// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawns the child binary in local mode with the parent's standard streams
//! attached directly. The child owns its own terminal rendering, so unlike a
//! PTY-multiplexing driver this launcher never allocates a pseudo-terminal or
//! scrapes a screen buffer.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// How a child process finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// Grace period between a graceful signal and forceful kill.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Spawns the local-mode child with inherited stdio.
pub struct ChildLauncher {
    claude_bin: PathBuf,
    project_dir: PathBuf,
}

impl ChildLauncher {
    pub fn new(claude_bin: PathBuf, project_dir: PathBuf) -> Self {
        Self { claude_bin, project_dir }
    }

    /// Spawn the child, inheriting stdin/stdout/stderr, with `resume_id`
    /// threaded through as `--resume <id>` when known.
    ///
    /// Returns a user-facing install instruction when the binary cannot be
    /// found, matching the "binary not found" error surfaced by the spec.
    pub fn spawn(&self, resume_id: Option<&str>, extra_args: &[String]) -> anyhow::Result<ChildHandle> {
        if !binary_resolves(&self.claude_bin) {
            anyhow::bail!(
                "could not find '{}' on PATH — install the Claude CLI and ensure it is on PATH",
                self.claude_bin.display()
            );
        }

        let mut command = Command::new(&self.claude_bin);
        command.current_dir(&self.project_dir);
        command.args(resume_args(resume_id));
        command.args(extra_args);
        command.stdin(Stdio::inherit());
        command.stdout(Stdio::inherit());
        command.stderr(Stdio::inherit());

        let child = command.spawn().map_err(|e| anyhow::anyhow!("failed to spawn child process: {e}"))?;
        Ok(ChildHandle { child })
    }
}

/// Turn a known transcript-session id into the `--resume <id>` argument
/// pair shared by both the local launcher and the remote driver.
pub fn resume_args(resume_id: Option<&str>) -> Vec<String> {
    match resume_id {
        Some(id) => vec!["--resume".to_string(), id.to_string()],
        None => Vec::new(),
    }
}

fn binary_resolves(bin: &Path) -> bool {
    if bin.components().count() > 1 {
        return bin.is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file()))
        .unwrap_or(false)
}

/// A running local-mode child. Owns the process handle and exposes the
/// graceful-then-forceful cancellation the launcher spec requires.
pub struct ChildHandle {
    child: Child,
}

impl ChildHandle {
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Await child exit, or cancellation — whichever comes first. On
    /// cancellation the child is signaled SIGTERM, given `KILL_GRACE` to
    /// exit, and SIGKILLed if it hasn't.
    pub async fn run_until(&mut self, cancel: &CancellationToken) -> anyhow::Result<ExitStatus> {
        tokio::select! {
            status = self.child.wait() => Ok(to_exit_status(status?)),
            _ = cancel.cancelled() => self.terminate().await,
        }
    }

    /// Signal the child to stop: SIGTERM, wait up to `KILL_GRACE`, SIGKILL.
    pub async fn terminate(&mut self) -> anyhow::Result<ExitStatus> {
        if let Some(pid) = self.pid() {
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }

        match tokio::time::timeout(KILL_GRACE, self.child.wait()).await {
            Ok(status) => Ok(to_exit_status(status?)),
            Err(_) => {
                if let Some(pid) = self.pid() {
                    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                }
                Ok(to_exit_status(self.child.wait().await?))
            }
        }
    }
}

fn to_exit_status(status: std::process::ExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus { code: status.code(), signal: status.signal() }
}

#[cfg(test)]
#[path = "launcher_tests.rs"]
mod tests;
