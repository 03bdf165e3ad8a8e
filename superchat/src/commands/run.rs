//! `superchat run` — the long-running server process: load config, build
//! `Services`, collect one future per transport into a `FuturesUnordered`,
//! log a "now running" banner when attended, and `select!` on Ctrl-C /
//! SIGUSR1 / a transport future returning. SuperChat always runs exactly
//! TCP, SSH, and WS, so the three futures are listed directly rather than
//! built from a configurable protocol set. `superchat.toml` is read once at
//! startup; there's no config-file watcher or long-lived target-health loop
//! to report on, so the systemd integration is just the readiness
//! notification and a watchdog ping.

use std::path::PathBuf;

use anyhow::Result;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use superchat_core::Services;
use tracing::{error, info};

use crate::config::load_config;

/// Distinguishes "a transport couldn't bind its listen address" (exit 2)
/// from any other startup failure (exit 1), by checking whether the error
/// chain contains the `.context("binding ... listener")` wrapper each
/// transport's `run_server` attaches around its bind step.
pub enum RunFailure {
    Config(anyhow::Error),
    BindFailed(anyhow::Error),
    StorageInit(anyhow::Error),
    Other(anyhow::Error),
}

impl RunFailure {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunFailure::Config(_) => 1,
            RunFailure::BindFailed(_) => 2,
            RunFailure::StorageInit(_) => 3,
            RunFailure::Other(_) => 1,
        }
    }

    pub fn into_error(self) -> anyhow::Error {
        match self {
            RunFailure::Config(e)
            | RunFailure::BindFailed(e)
            | RunFailure::StorageInit(e)
            | RunFailure::Other(e) => e,
        }
    }
}

fn looks_like_bind_failure(error: &anyhow::Error) -> bool {
    format!("{error:#}").contains("binding")
}

fn looks_like_storage_failure(error: &anyhow::Error) -> bool {
    let chain = format!("{error:#}");
    chain.contains("connecting to the database")
        || chain.contains("running migrations")
        || chain.contains("database")
}

pub async fn command(config_path: &PathBuf) -> Result<(), RunFailure> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "SuperChat");

    let config = load_config(config_path).map_err(RunFailure::Config)?;

    let services = Services::new(config)
        .await
        .map_err(|e| if looks_like_storage_failure(&e) { RunFailure::StorageInit(e) } else { RunFailure::Config(e) })?;

    let mut protocol_futures = FuturesUnordered::new();
    protocol_futures.push(Box::pin(superchat_protocol_tcp::run_server(
        services.clone(),
        services.config.store.server.tcp_port.clone(),
    )) as std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>);
    protocol_futures.push(Box::pin(superchat_protocol_ssh::run_server(
        services.clone(),
        services.config.store.server.ssh_port.clone(),
    )));
    protocol_futures.push(Box::pin(superchat_protocol_ws::run_server(
        services.clone(),
        services.config.store.server.ws_port.clone(),
    )));

    if std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        info!("--------------------------------------------");
        info!("SuperChat is now running.");
        info!(port = services.config.store.server.tcp_port.port(), "accepting TCP connections");
        info!(port = services.config.store.server.ssh_port.port(), "accepting SSH connections");
        info!(port = services.config.store.server.ws_port.port(), "accepting WebSocket connections");
        info!("--------------------------------------------");
    }

    #[cfg(target_os = "linux")]
    if let Ok(true) = sd_notify::booted() {
        tokio::spawn(async {
            if let Err(error) = async {
                sd_notify::notify(false, &[sd_notify::NotifyState::Ready])?;
                loop {
                    sd_notify::notify(false, &[sd_notify::NotifyState::Watchdog])?;
                    tokio::time::sleep(std::time::Duration::from_secs(15)).await;
                }
                #[allow(unreachable_code)]
                Ok::<(), anyhow::Error>(())
            }
            .await
            {
                error!(%error, "failed to communicate with systemd");
            }
        });
    }

    let mut sigusr1 =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
            .map_err(|e| RunFailure::Other(e.into()))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received interrupt, exiting");
                return Ok(());
            }
            _ = sigusr1.recv() => {
                info!("received SIGUSR1, exiting");
                return Ok(());
            }
            result = protocol_futures.next() => {
                match result {
                    Some(Err(error)) => {
                        error!(%error, "a transport failed");
                        return Err(if looks_like_bind_failure(&error) {
                            RunFailure::BindFailed(error)
                        } else {
                            RunFailure::Other(error)
                        });
                    }
                    None => {
                        info!("all transports exited");
                        return Ok(());
                    }
                    Some(Ok(())) => {}
                }
            }
        }
    }
}
