use std::net::{Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::types::{ListenEndpoint, Secret};

pub fn _default_tcp_listen() -> ListenEndpoint {
    ListenEndpoint(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 6465))
}

pub fn _default_ssh_listen() -> ListenEndpoint {
    ListenEndpoint(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 6466))
}

pub fn _default_ws_listen() -> ListenEndpoint {
    ListenEndpoint(SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 6467))
}

pub fn _default_ssh_host_key_path() -> String {
    "ssh_host_key".to_owned()
}

pub fn _default_max_connections_per_ip() -> u32 {
    10
}

pub fn _default_message_rate_limit() -> u32 {
    10
}

pub fn _default_max_message_length() -> usize {
    4096
}

pub fn _default_session_timeout_seconds() -> u64 {
    60
}

pub fn _default_outbound_queue_capacity() -> usize {
    128
}

pub fn _default_channel_create_rate_per_hour() -> u32 {
    5
}

pub fn _default_max_channel_subscriptions() -> usize {
    20
}

pub fn _default_max_thread_subscriptions() -> usize {
    50
}

pub fn _default_retention_sweep_interval() -> Duration {
    Duration::from_secs(3600)
}

pub fn _default_server_name() -> String {
    "SuperChat Server".to_owned()
}

pub fn _default_database_url() -> Secret<String> {
    Secret::new("sqlite://superchat.sqlite3?mode=rwc".to_owned())
}
