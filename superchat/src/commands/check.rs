//! `superchat check` — validates the config file parses and reports which
//! ports it would bind, without starting any transport.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::config::load_config;

pub fn command(config_path: &PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    info!(
        tcp_port = config.store.server.tcp_port.port(),
        ssh_port = config.store.server.ssh_port.port(),
        ws_port = config.store.server.ws_port.port(),
        "no problems found"
    );
    Ok(())
}
