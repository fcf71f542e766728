// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::{error, info};

use happy::config::Config;
use happy::credentials::Credentials;
use happy::settings::Settings;
use happy::supervisor::Supervisor;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let home_dir = config.resolved_home_dir()?;
    let settings = Settings::load(&home_dir);
    let credentials = Credentials::load(&home_dir.join("credentials.json"))?;

    let supervisor = Supervisor::new(config, &credentials, &settings).await?;
    let shutdown = supervisor.shutdown_handle();
    tokio::spawn(watch_shutdown_signals(shutdown));
    supervisor.run().await
}

/// SIGINT/SIGTERM request the same graceful kill an RPC `kill` would: child
/// cancel, session-death emission, flush, close, exit 0. A second signal
/// while that shutdown is still in flight forces an immediate exit instead
/// of waiting on a hung teardown.
async fn watch_shutdown_signals(shutdown: happy::supervisor::ShutdownHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();

    // First signal: request the graceful kill path.
    tokio::select! {
        _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGTERM");
        }
        _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGINT");
        }
    }
    shutdown.kill();

    // Second signal: the graceful teardown is taking too long, force it.
    tokio::select! {
        _ = async { if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGTERM again, forcing exit");
        }
        _ = async { if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await } } => {
            info!("received SIGINT again, forcing exit");
        }
    }
    std::process::exit(130);
}

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    // Priority: --log-level / HAPPY_LOG_LEVEL > RUST_LOG > default ("info").
    let filter = if std::env::var("HAPPY_LOG_LEVEL").is_err() && config.log_level == "info" {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}
