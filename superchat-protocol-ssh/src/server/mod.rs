mod handler;

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use russh::keys::{Algorithm, HashAlg};
use russh::{MethodSet, Preferred};
use superchat_common::ListenEndpoint;
use superchat_core::consts::DEFAULT_KEEPALIVE_INTERVAL_SECS;
use superchat_core::Services;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::keys::load_or_generate_host_key;
use handler::SshHandler;

/// Binds every address `listen` resolves to and serves SSH connections until
/// the process is asked to stop: bind, loop accept, spawn a per-connection
/// task, log and continue past one bad accept, adapted to `ListenEndpoint`'s
/// multi-address binding and the shared [`ConnectionLimiter`].
pub async fn run_server(services: Services, listen: ListenEndpoint) -> Result<()> {
    let host_key =
        load_or_generate_host_key(&services.config.ssh_host_key_path()).context("loading SSH host key")?;

    let russh_config = Arc::new(russh::server::Config {
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        inactivity_timeout: Some(Duration::from_secs(
            services.config.store.server.session_timeout_seconds,
        )),
        keepalive_interval: Some(Duration::from_secs(DEFAULT_KEEPALIVE_INTERVAL_SECS)),
        methods: MethodSet::from(&[russh::MethodKind::PublicKey, russh::MethodKind::Password][..]),
        keys: vec![host_key],
        preferred: Preferred {
            key: Cow::Borrowed(&[
                Algorithm::Ed25519,
                Algorithm::Rsa {
                    hash: Some(HashAlg::Sha512),
                },
                Algorithm::Rsa {
                    hash: Some(HashAlg::Sha256),
                },
            ]),
            ..<_>::default()
        },
        ..<_>::default()
    });

    let listeners = listen.tcp_listeners().await.context("binding SSH listener")?;
    info!(port = listen.port(), "SSH listener ready");

    loop {
        let (stream, remote_address) = match superchat_common::accept_any(&listeners).await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "SSH accept failed");
                continue;
            }
        };

        let limit = services.config.store.server.max_connections_per_ip;
        let Some(guard) = services.connections.acquire(remote_address.ip(), limit) else {
            debug!(%remote_address, "connection refused, per-IP limit reached");
            continue;
        };

        let services = services.clone();
        let russh_config = russh_config.clone();
        tokio::spawn(async move {
            if let Err(error) =
                handle_connection(services, stream, remote_address, russh_config, guard).await
            {
                warn!(%remote_address, %error, "SSH session ended with an error");
            }
        });
    }
}

async fn handle_connection(
    services: Services,
    stream: TcpStream,
    remote_address: std::net::SocketAddr,
    russh_config: Arc<russh::server::Config>,
    guard: superchat_core::connections::ConnectionGuard,
) -> Result<()> {
    let _guard = guard;

    let (handler, core_session) = SshHandler::new(services.clone(), remote_address);

    let run_result = async {
        let connection = russh::server::run_stream(russh_config, stream, handler)
            .await
            .context("SSH handshake failed")?;
        connection.await.context("SSH connection loop failed")?;
        Ok::<(), anyhow::Error>(())
    }
    .await;

    services.dispatcher.disconnect(&core_session).await;
    core_session.close().await;

    run_result
}
