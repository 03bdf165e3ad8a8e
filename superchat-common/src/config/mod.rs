mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use defaults::*;
use serde::{Deserialize, Serialize};

use crate::types::{ListenEndpoint, Secret};

/// `server.*` — listen addresses, transport-level limits, and the rate/size
/// limits advertised to clients in `SERVER_CONFIG`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerSection {
    #[serde(default = "_default_tcp_listen")]
    pub tcp_port: ListenEndpoint,

    #[serde(default = "_default_ssh_listen")]
    pub ssh_port: ListenEndpoint,

    #[serde(default = "_default_ssh_host_key_path")]
    pub ssh_host_key: String,

    #[serde(default = "_default_ws_listen")]
    pub ws_port: ListenEndpoint,

    #[serde(default = "_default_max_connections_per_ip")]
    pub max_connections_per_ip: u32,

    /// Posts per 10 seconds per session.
    #[serde(default = "_default_message_rate_limit")]
    pub message_rate_limit: u32,

    #[serde(default = "_default_max_message_length")]
    pub max_message_length: usize,

    #[serde(default = "_default_session_timeout_seconds")]
    pub session_timeout_seconds: u64,

    /// Nicknames with the `admin` flag implied at startup, in addition to
    /// whatever is persisted in the `users` table.
    #[serde(default)]
    pub admin_users: Vec<String>,

    #[serde(default = "_default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    #[serde(default = "_default_channel_create_rate_per_hour")]
    pub channel_create_rate_per_hour: u32,

    #[serde(default = "_default_max_channel_subscriptions")]
    pub max_channel_subscriptions: usize,

    #[serde(default = "_default_max_thread_subscriptions")]
    pub max_thread_subscriptions: usize,

    #[serde(default = "_default_retention_sweep_interval", with = "humantime_serde")]
    pub retention_sweep_interval: Duration,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            tcp_port: _default_tcp_listen(),
            ssh_port: _default_ssh_listen(),
            ssh_host_key: _default_ssh_host_key_path(),
            ws_port: _default_ws_listen(),
            max_connections_per_ip: _default_max_connections_per_ip(),
            message_rate_limit: _default_message_rate_limit(),
            max_message_length: _default_max_message_length(),
            session_timeout_seconds: _default_session_timeout_seconds(),
            admin_users: vec![],
            outbound_queue_capacity: _default_outbound_queue_capacity(),
            channel_create_rate_per_hour: _default_channel_create_rate_per_hour(),
            max_channel_subscriptions: _default_max_channel_subscriptions(),
            max_thread_subscriptions: _default_max_thread_subscriptions(),
            retention_sweep_interval: _default_retention_sweep_interval(),
        }
    }
}

/// `discovery.*` — shape only. The directory-registry publishing loop that
/// would consume these fields is an out-of-scope external collaborator
/// the fields still round-trip through config so the seam
/// exists for it.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct DiscoverySection {
    #[serde(default)]
    pub directory_enabled: bool,
    #[serde(default)]
    pub public_hostname: Option<String>,
    #[serde(default = "_default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub server_description: String,
    #[serde(default)]
    pub max_users: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConfigStore {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default = "_default_database_url")]
    pub database_url: Secret<String>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            discovery: DiscoverySection::default(),
            database_url: _default_database_url(),
        }
    }
}

/// The loaded, validated configuration plus the directory paths in it were
/// resolved relative to (so `ssh_host_key`/`database_url` can be relative).
#[derive(Debug, Clone)]
pub struct Config {
    pub store: ConfigStore,
    pub paths_relative_to: PathBuf,
}

impl Config {
    pub fn ssh_host_key_path(&self) -> PathBuf {
        self.paths_relative_to.join(&self.store.server.ssh_host_key)
    }
}
