//! WebSocket transport adapter: binary frames carry the same length-prefixed
//! payload as the other transports, on a separate listen port. Grounded on
//! the same accept-loop shape as `superchat-protocol-tcp`, swapping the raw
//! byte-stream reader for one WebSocket binary message per wire frame — the
//! WebSocket layer already delimits message boundaries, so there's no
//! byte-stream buffering to do here, just `Frame::try_parse` against each
//! message's bytes and a `Frame::encode` back into an outgoing one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use superchat_common::ListenEndpoint;
use superchat_core::session::{Session, SessionHandle};
use superchat_core::{Dispatcher, Services};
use superchat_wire::messages::ServerConfig;
use superchat_wire::{ClientMessage, Frame};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const PROTOCOL_NAME: &str = "ws";
const PROTOCOL_VERSION: u8 = 1;

/// Signals the reader loop to stop. `closed` is checked before every wait so
/// a `close()` called inline from the same task that's about to loop back
/// into `tokio::select!` isn't lost — `Notify::notify_waiters` only wakes a
/// task already parked in `.notified()`.
struct WsSessionHandle {
    close_notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle for WsSessionHandle {
    fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_waiters();
    }
}

pub async fn run_server(services: Services, listen: ListenEndpoint) -> Result<()> {
    let listeners = listen
        .tcp_listeners()
        .await
        .context("binding WebSocket listener")?;
    info!(port = listen.port(), "WebSocket listener ready");

    loop {
        let (stream, remote_address) = match superchat_common::accept_any(&listeners).await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "WebSocket accept failed");
                continue;
            }
        };

        let limit = services.config.store.server.max_connections_per_ip;
        let Some(guard) = services.connections.acquire(remote_address.ip(), limit) else {
            debug!(%remote_address, "connection refused, per-IP limit reached");
            continue;
        };

        let services = services.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(error) = handle_connection(services, stream, remote_address).await {
                warn!(%remote_address, %error, "WebSocket session ended with an error");
            }
        });
    }
}

async fn handle_connection(
    services: Services,
    stream: TcpStream,
    remote_address: std::net::SocketAddr,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;
    let (mut write, mut read) = ws.split();

    let close_notify = Arc::new(Notify::new());
    let closed = Arc::new(AtomicBool::new(false));
    let (session, mut outbound_rx) = Session::new(
        PROTOCOL_NAME,
        Some(remote_address),
        Box::new(WsSessionHandle {
            close_notify: close_notify.clone(),
            closed: closed.clone(),
        }),
    );

    let server = &services.config.store.server;
    let server_config = ServerConfig {
        protocol_version: PROTOCOL_VERSION,
        server_name: services.config.store.discovery.server_name.clone(),
        message_rate_limit: server.message_rate_limit,
        max_message_length: server.max_message_length as u32,
        session_timeout_seconds: server.session_timeout_seconds as u32,
        max_channel_subscriptions: server.max_channel_subscriptions as u32,
        max_thread_subscriptions: server.max_thread_subscriptions as u32,
        subchannel_id: None,
    };
    session
        .respond(superchat_wire::ServerMessage::ServerConfig(server_config))
        .await;

    let timeout = Duration::from_secs(server.session_timeout_seconds);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Ok(payload) = message.encode() else {
                continue;
            };
            let frame = Frame::new(message.message_type(), payload.freeze());
            let encoded = frame.encode().to_vec();
            if write.send(Message::Binary(encoded.into())).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    let dispatcher = services.dispatcher.clone();
    let result = reader_loop(&dispatcher, &session, &mut read, &close_notify, &closed, timeout).await;

    dispatcher.disconnect(&session).await;
    session.close().await;
    writer.abort();

    result
}

async fn reader_loop<S>(
    dispatcher: &Arc<Dispatcher>,
    session: &Arc<Session>,
    read: &mut futures::stream::SplitStream<tokio_tungstenite::WebSocketStream<S>>,
    close_notify: &Notify,
    closed: &AtomicBool,
    idle_timeout: Duration,
) -> Result<()>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        if closed.load(Ordering::Acquire) {
            debug!(session_id = %session.id, "session closed");
            return Ok(());
        }
        let next = tokio::select! {
            result = tokio::time::timeout(idle_timeout, read.next()) => match result {
                Ok(Some(next)) => next,
                Ok(None) => return Ok(()),
                Err(_) => {
                    debug!(session_id = %session.id, "session idle past the timeout, closing");
                    return Ok(());
                }
            },
            _ = close_notify.notified() => {
                debug!(session_id = %session.id, "session closed");
                return Ok(());
            }
        };

        let message = match next {
            Ok(message) => message,
            Err(error) => {
                debug!(session_id = %session.id, %error, "WebSocket connection closed or errored");
                return Ok(());
            }
        };

        let mut data = match message {
            Message::Binary(data) => bytes::BytesMut::from(&data[..]),
            Message::Close(_) => return Ok(()),
            // Pings/pongs are handled by tokio-tungstenite itself; text frames
            // carry no meaning in this protocol.
            _ => continue,
        };

        let frame = match Frame::try_parse(&mut data) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(session_id = %session.id, "dropping WebSocket message shorter than one frame");
                continue;
            }
            Err(error) => {
                debug!(session_id = %session.id, %error, "dropping unparseable WebSocket frame");
                continue;
            }
        };

        let decoded = match ClientMessage::decode(frame.message_type, frame.payload) {
            Ok(decoded) => decoded,
            Err(error) => {
                debug!(session_id = %session.id, %error, "dropping unparseable frame");
                continue;
            }
        };

        dispatcher.dispatch(session, decoded).await;
    }
}
