//! `superchat healthcheck` — a liveness probe suited to a `docker
//! HEALTHCHECK`/systemd `ExecStartPost`: connect to the configured TCP port
//! and confirm the listener is accepting. There's no HTTP admin API to
//! probe, so the liveness signal is just "something is listening".

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::load_config;

pub async fn command(config_path: &PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    let addr = config.store.server.tcp_port.addresses_to_listen_on();
    let addr = addr.first().context("no TCP listen address configured")?;

    timeout(Duration::from_secs(5), TcpStream::connect(addr))
        .await
        .context("timed out connecting to the TCP listener")?
        .context("failed to connect to the TCP listener")?;

    Ok(())
}
