// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;

use crate::supervisor::Mode;

/// Wraps a local coding-assistant child process and hands control between
/// the local terminal and a remote mobile client.
#[derive(Debug, Parser)]
#[command(name = "happy", version, about)]
pub struct Config {
    /// Path to the Claude binary.
    #[arg(long, env = "HAPPY_CLAUDE_BIN", default_value = "claude")]
    pub claude_bin: PathBuf,

    /// Project working directory. Defaults to the current directory.
    #[arg(long, env = "HAPPY_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// Happy home directory holding settings, credentials, and machine id.
    #[arg(long, env = "HAPPY_HOME_DIR")]
    pub home_dir: Option<PathBuf>,

    /// WebSocket URL of the remote server.
    #[arg(long, env = "HAPPY_SERVER_URL", default_value = "wss://api.happy.engineering/ws")]
    pub server_url: String,

    /// Loopback port of a surrounding daemon process to notify on session start.
    #[arg(long, env = "HAPPY_DAEMON_PORT")]
    pub daemon_port: Option<u16>,

    /// Initial mode. Defaults to remote when started by a daemon, local otherwise.
    #[arg(long, env = "HAPPY_INITIAL_MODE")]
    pub initial_mode: Option<String>,

    /// Set when this process was spawned by the daemon rather than interactively.
    #[arg(long, env = "HAPPY_STARTED_BY_DAEMON", default_value = "false")]
    pub started_by_daemon: bool,

    /// Permission mode passed through to the child (e.g. default, plan, acceptEdits).
    #[arg(long, env = "HAPPY_PERMISSION_MODE", default_value = "default")]
    pub permission_mode: String,

    /// Model passed through to the child.
    #[arg(long, env = "HAPPY_MODEL")]
    pub model: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "HAPPY_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "HAPPY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Additional arguments forwarded verbatim to the child (after --).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra_args: Vec<String>,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ref m) = self.initial_mode {
            self.initial_mode_enum(m)?;
        }
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            anyhow::bail!("--server-url must be a ws:// or wss:// URL");
        }
        Ok(())
    }

    /// Resolve the project directory, defaulting to the process's current directory.
    pub fn resolved_project_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.project_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Resolve the Happy home directory, defaulting to `~/.happy`.
    pub fn resolved_home_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(ref h) = self.home_dir {
            return Ok(h.clone());
        }
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME is not set"))?;
        Ok(PathBuf::from(home).join(".happy"))
    }

    /// Resolve the initial supervisor mode.
    ///
    /// Defaults to remote when daemon-spawned, local otherwise, per the data
    /// model's `Mode` initial-value rule.
    pub fn resolved_initial_mode(&self) -> anyhow::Result<Mode> {
        match &self.initial_mode {
            Some(m) => self.initial_mode_enum(m),
            None => Ok(if self.started_by_daemon { Mode::Remote } else { Mode::Local }),
        }
    }

    fn initial_mode_enum(&self, raw: &str) -> anyhow::Result<Mode> {
        match raw.to_lowercase().as_str() {
            "local" => Ok(Mode::Local),
            "remote" => Ok(Mode::Remote),
            other => anyhow::bail!("invalid initial mode: {other}"),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
