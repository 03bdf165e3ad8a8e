//! The session layer: one [`Session`] per live connection, shared by all
//! three transports. Each transport owns a reader task (decode frames, feed
//! them to the dispatcher) and a writer task (drain the outbox and
//! frame/write it back out); this module only supplies the shared state and
//! the bounded queue between them.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use superchat_common::{ProtocolName, SessionId};
use superchat_wire::ServerMessage;
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::auth::{AuthState, FailedAuthTracker};
use crate::consts::{DEFAULT_OUTBOUND_QUEUE_CAPACITY, DIRECT_ENQUEUE_TIMEOUT_SECS};
use crate::init_state::InitState;

/// Closes the underlying transport connection. Implemented per-transport
/// (TCP socket shutdown, SSH channel EOF, WebSocket close frame).
pub trait SessionHandle {
    fn close(&mut self);
}

/// The two ways a message can be pushed at a session's writer task, mirrored
/// by the two enqueue methods below: broadcasts never block the caller,
/// direct responses are allowed a bounded wait since the caller is the
/// dispatcher thread handling that exact session's own request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Sent,
    /// Queue was full; a broadcast enqueue dropped the message rather than
    /// block the fan-out loop on one slow reader.
    Dropped,
}

/// Per-session outbound frame queue. A broadcast producer calls
/// [`Outbox::try_enqueue`] and moves on regardless of whether the session
/// keeps up; the dispatcher answering that session's own request calls
/// [`Outbox::enqueue_direct`] and is willing to wait briefly, since direct
/// responses must not be silently dropped without the caller finding out.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<ServerMessage>,
    dropped: Arc<AtomicU64>,
}

impl Outbox {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Non-blocking; used for broadcast fan-out. A full queue means this
    /// session is falling behind — the message is dropped and the drop
    /// counter increments rather than stalling every other subscriber behind
    /// it.
    pub fn try_enqueue(&self, message: ServerMessage) -> EnqueueOutcome {
        match self.tx.try_send(message) {
            Ok(()) => EnqueueOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                EnqueueOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Dropped,
        }
    }

    /// Used for responses directly addressed to the request that produced
    /// them; allowed to wait up to [`DIRECT_ENQUEUE_TIMEOUT_SECS`] for queue
    /// space rather than drop a response the client is actively waiting on.
    pub async fn enqueue_direct(&self, message: ServerMessage) -> EnqueueOutcome {
        match tokio::time::timeout(
            Duration::from_secs(DIRECT_ENQUEUE_TIMEOUT_SECS),
            self.tx.send(message),
        )
        .await
        {
            Ok(Ok(())) => EnqueueOutcome::Sent,
            Ok(Err(_)) | Err(_) => EnqueueOutcome::Dropped,
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Per-connection state shared between the reader task, the writer task, and
/// the dispatcher. Lives for exactly as long as the connection.
pub struct Session {
    pub id: SessionId,
    pub protocol: ProtocolName,
    pub remote_address: Option<SocketAddr>,
    pub outbox: Outbox,
    pub auth: Mutex<AuthState>,
    pub init_state: Mutex<InitState>,
    pub failed_auth: Mutex<FailedAuthTracker>,
    handle: Mutex<Box<dyn SessionHandle + Send + Sync>>,
}

impl Session {
    pub fn new(
        protocol: ProtocolName,
        remote_address: Option<SocketAddr>,
        handle: Box<dyn SessionHandle + Send + Sync>,
    ) -> (Arc<Self>, mpsc::Receiver<ServerMessage>) {
        let (outbox, rx) = Outbox::new(DEFAULT_OUTBOUND_QUEUE_CAPACITY);
        let session = Arc::new(Self {
            id: SessionId::new_v4(),
            protocol,
            remote_address,
            outbox,
            auth: Mutex::new(AuthState::NotSet),
            init_state: Mutex::new(InitState::Connecting),
            failed_auth: Mutex::new(FailedAuthTracker::default()),
            handle: Mutex::new(handle),
        });
        (session, rx)
    }

    pub async fn close(&self) {
        self.handle.lock().await.close();
    }

    pub async fn send(&self, message: ServerMessage) {
        if self.outbox.try_enqueue(message) == EnqueueOutcome::Dropped {
            warn!(session_id = %self.id, "dropped broadcast message, session queue full");
        }
    }

    pub async fn respond(&self, message: ServerMessage) {
        if self.outbox.enqueue_direct(message).await == EnqueueOutcome::Dropped {
            warn!(session_id = %self.id, "direct response could not be delivered in time");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHandle;
    impl SessionHandle for NullHandle {
        fn close(&mut self) {}
    }

    #[tokio::test]
    async fn broadcast_enqueue_drops_rather_than_blocks_when_full() {
        let (outbox, mut rx) = Outbox::new(1);
        assert_eq!(
            outbox.try_enqueue(ServerMessage::Pong(superchat_wire::messages::Pong {
                timestamp: 1
            })),
            EnqueueOutcome::Sent
        );
        assert_eq!(
            outbox.try_enqueue(ServerMessage::Pong(superchat_wire::messages::Pong {
                timestamp: 2
            })),
            EnqueueOutcome::Dropped
        );
        assert_eq!(outbox.dropped_count(), 1);
        let _ = rx.recv().await;
    }

    #[tokio::test]
    async fn session_tracks_its_own_identity() {
        let (session, _rx) = Session::new("tcp", None, Box::new(NullHandle));
        assert_eq!(session.protocol, "tcp");
    }
}
