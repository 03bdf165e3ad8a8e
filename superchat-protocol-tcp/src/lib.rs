//! Plain TCP transport adapter: accept, spawn a per-connection task, log and
//! continue past one bad accept rather than exiting the whole listener. A
//! raw TCP connection has no handshake of its own — every byte read off the
//! socket is already wire-protocol framing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use superchat_common::ListenEndpoint;
use superchat_core::session::{Session, SessionHandle};
use superchat_core::{Dispatcher, Services};
use superchat_wire::messages::ServerConfig;
use superchat_wire::{ClientMessage, Frame};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

const PROTOCOL_NAME: &str = "tcp";
const PROTOCOL_VERSION: u8 = 1;

/// Signals the reader loop to stop. `closed` is checked before every wait so
/// a `close()` called inline from the same task that's about to loop back
/// into `tokio::select!` (e.g. the dispatcher closing a session mid-request)
/// isn't lost — `Notify::notify_waiters` only wakes a task already parked in
/// `.notified()`, it has no effect on a task that hasn't started waiting yet.
struct TcpSessionHandle {
    close_notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle for TcpSessionHandle {
    fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.close_notify.notify_waiters();
    }
}

/// Binds every address `listen` resolves to and serves connections until the
/// process is asked to stop.
pub async fn run_server(services: Services, listen: ListenEndpoint) -> Result<()> {
    let listeners = listen
        .tcp_listeners()
        .await
        .context("binding TCP listener")?;
    info!(port = listen.port(), "TCP listener ready");

    loop {
        let (stream, remote_address) = match superchat_common::accept_any(&listeners).await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "TCP accept failed");
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
                warn!(%remote_address, %error, "TCP session ended with an error");
            }
        });
    }
}

async fn handle_connection(
    services: Services,
    stream: TcpStream,
    remote_address: std::net::SocketAddr,
) -> Result<()> {
    stream.set_nodelay(true).ok();
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let close_notify = Arc::new(Notify::new());
    let closed = Arc::new(AtomicBool::new(false));
    let (session, mut outbound_rx) = Session::new(
        PROTOCOL_NAME,
        Some(remote_address),
        Box::new(TcpSessionHandle {
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
            if frame.write_to(&mut write_half).await.is_err() {
                break;
            }
        }
    });

    let dispatcher = services.dispatcher.clone();
    let result = reader_loop(&dispatcher, &session, &mut reader, &close_notify, &closed, timeout).await;

    dispatcher.disconnect(&session).await;
    session.close().await;
    writer.abort();

    result
}

async fn reader_loop<R>(
    dispatcher: &Arc<Dispatcher>,
    session: &Arc<Session>,
    reader: &mut R,
    close_notify: &Notify,
    closed: &AtomicBool,
    idle_timeout: Duration,
) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        if closed.load(Ordering::Acquire) {
            debug!(session_id = %session.id, "session closed");
            return Ok(());
        }
        let frame = tokio::select! {
            result = tokio::time::timeout(idle_timeout, Frame::read_from(reader)) => match result {
                Ok(Ok(frame)) => frame,
                Ok(Err(error)) => {
                    debug!(session_id = %session.id, %error, "connection closed or framing error");
                    return Ok(());
                }
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

        let message = match ClientMessage::decode(frame.message_type, frame.payload) {
            Ok(message) => message,
            Err(error) => {
                debug!(session_id = %session.id, %error, "dropping unparseable frame");
                continue;
            }
        };

        dispatcher.dispatch(session, message).await;
    }
}

/// End-to-end coverage driving a real TCP loopback pair through
/// [`handle_connection`] rather than calling the dispatcher directly, so
/// these exercise the exact bytes a client would see on the wire: the
/// `SERVER_CONFIG` preamble, response framing, and broadcast fan-out.
#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::PathBuf;

    use sea_orm::Database;
    use superchat_common::{Config, ConfigStore};
    use superchat_core::{ConnectionLimiter, Storage};
    use superchat_wire::messages::*;
    use superchat_wire::ServerMessage;
    use tokio::net::TcpListener;
    use tokio::time::sleep;

    use super::*;

    async fn test_services() -> Services {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        superchat_db_migrations::migrate_database(&db).await.unwrap();
        Services {
            config: Arc::new(Config {
                store: ConfigStore::default(),
                paths_relative_to: PathBuf::new(),
            }),
            dispatcher: Arc::new(Dispatcher::new(Storage::new(db))),
            connections: ConnectionLimiter::new(),
        }
    }

    async fn spawn_test_server(services: Services) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, remote_address)) = listener.accept().await else {
                    return;
                };
                let services = services.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(services, stream, remote_address).await;
                });
            }
        });
        addr
    }

    async fn read_message(stream: &mut TcpStream) -> ServerMessage {
        let frame = Frame::read_from(stream).await.expect("read a frame");
        ServerMessage::decode(frame.message_type, frame.payload).expect("decode a server message")
    }

    async fn write_message(stream: &mut TcpStream, message: ClientMessage) {
        let payload = message.encode().expect("encode a client message");
        Frame::new(message.message_type(), payload.freeze())
            .write_to(stream)
            .await
            .expect("write a frame");
    }

    async fn connect_and_claim_nickname(addr: SocketAddr, nickname: &str) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(
            read_message(&mut stream).await,
            ServerMessage::ServerConfig(_)
        ));
        write_message(
            &mut stream,
            ClientMessage::SetNickname(SetNickname {
                nickname: nickname.into(),
                subchannel_id: None,
            }),
        )
        .await;
        match read_message(&mut stream).await {
            ServerMessage::NicknameResponse(r) => assert!(r.success),
            other => panic!("expected NicknameResponse, got {other:?}"),
        }
        stream
    }

    #[tokio::test]
    async fn anonymous_post_is_attributed_and_broadcast_to_the_poster() {
        let services = test_services().await;
        let owner = services.dispatcher.storage.register_user("owner", "h").await.unwrap();
        let channel = services
            .dispatcher
            .storage
            .create_channel("general", "General", "", 0, 0, owner.id)
            .await
            .unwrap();
        let addr = spawn_test_server(services).await;

        let mut stream = connect_and_claim_nickname(addr, "guest1").await;

        write_message(
            &mut stream,
            ClientMessage::SubscribeChannel(SubscribeChannel {
                channel_id: channel.id,
                subchannel_id: None,
            }),
        )
        .await;
        match read_message(&mut stream).await {
            ServerMessage::SubscribeResponse(r) => assert!(r.success),
            other => panic!("expected SubscribeResponse, got {other:?}"),
        }

        write_message(
            &mut stream,
            ClientMessage::PostMessage(PostMessage {
                channel_id: channel.id,
                parent_id: None,
                content: "hello".into(),
                subchannel_id: None,
            }),
        )
        .await;

        match read_message(&mut stream).await {
            ServerMessage::MessagePosted(r) => assert!(r.success),
            other => panic!("expected MessagePosted, got {other:?}"),
        }
        match read_message(&mut stream).await {
            ServerMessage::NewMessage(n) => assert_eq!(n.message.author_nickname, "~guest1"),
            other => panic!("expected NewMessage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nickname_collision_is_rejected_and_repeated_bad_auth_closes_the_session() {
        let services = test_services().await;
        let hash = superchat_common::helpers::hash::hash_password("correct horse");
        services.dispatcher.storage.register_user("bob", &hash).await.unwrap();
        let addr = spawn_test_server(services).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(
            read_message(&mut stream).await,
            ServerMessage::ServerConfig(_)
        ));

        write_message(
            &mut stream,
            ClientMessage::SetNickname(SetNickname {
                nickname: "bob".into(),
                subchannel_id: None,
            }),
        )
        .await;
        match read_message(&mut stream).await {
            ServerMessage::NicknameResponse(r) => {
                assert!(!r.success);
                assert!(r.message.unwrap_or_default().contains("registered"));
            }
            other => panic!("expected NicknameResponse, got {other:?}"),
        }

        // First three bad attempts carry no required cooldown; the fourth and
        // fifth each wait out the backoff `record_failure` just armed, per
        // `FailedAuthTracker`.
        let backoffs = [
            Duration::from_millis(0),
            Duration::from_millis(0),
            Duration::from_millis(0),
            Duration::from_millis(1100),
            Duration::from_millis(2100),
        ];
        for (attempt, backoff) in backoffs.iter().enumerate() {
            sleep(*backoff).await;
            write_message(
                &mut stream,
                ClientMessage::AuthRequest(AuthRequest {
                    nickname: "bob".into(),
                    password: "wrong".into(),
                    subchannel_id: None,
                }),
            )
            .await;
            match read_message(&mut stream).await {
                ServerMessage::AuthResponse(r) => assert!(!r.success, "attempt {attempt}"),
                other => panic!("expected AuthResponse on attempt {attempt}, got {other:?}"),
            }
        }

        // The session was closed after the fifth failure; the connection
        // should now observe EOF rather than yield another frame.
        let result = Frame::read_from(&mut stream).await;
        assert!(result.is_err(), "expected the connection to be closed");
    }

    #[tokio::test]
    async fn a_post_is_broadcast_to_every_other_subscriber_exactly_once() {
        let services = test_services().await;
        let owner = services.dispatcher.storage.register_user("owner", "h").await.unwrap();
        let channel = services
            .dispatcher
            .storage
            .create_channel("general", "General", "", 0, 0, owner.id)
            .await
            .unwrap();
        let addr = spawn_test_server(services).await;

        let mut subscribers = Vec::new();
        for nickname in ["alice", "ben", "cara"] {
            let mut stream = connect_and_claim_nickname(addr, nickname).await;
            write_message(
                &mut stream,
                ClientMessage::SubscribeChannel(SubscribeChannel {
                    channel_id: channel.id,
                    subchannel_id: None,
                }),
            )
            .await;
            match read_message(&mut stream).await {
                ServerMessage::SubscribeResponse(r) => assert!(r.success),
                other => panic!("expected SubscribeResponse, got {other:?}"),
            }
            subscribers.push(stream);
        }

        let mut poster = connect_and_claim_nickname(addr, "dana").await;
        write_message(
            &mut poster,
            ClientMessage::PostMessage(PostMessage {
                channel_id: channel.id,
                parent_id: None,
                content: "hi all".into(),
                subchannel_id: None,
            }),
        )
        .await;
        match read_message(&mut poster).await {
            ServerMessage::MessagePosted(r) => assert!(r.success),
            other => panic!("expected MessagePosted, got {other:?}"),
        }

        for mut stream in subscribers {
            match read_message(&mut stream).await {
                ServerMessage::NewMessage(n) => assert_eq!(n.message.author_nickname, "~dana"),
                other => panic!("expected NewMessage, got {other:?}"),
            }
        }
    }
}
