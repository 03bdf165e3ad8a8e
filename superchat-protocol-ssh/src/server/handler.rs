//! Per-connection `russh::server::Handler`: one handler instance per
//! accepted connection, implementing the trait's async callbacks directly.
//! SuperChat's session logic is just "decode wire frames, call the
//! dispatcher", small enough to live directly in the handler with no event
//! indirection.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex};

use bytes::BytesMut;
use russh::keys::PublicKey;
use russh::server::{Auth, Handle, Msg, Session as RusshSession};
use russh::{Channel, ChannelId, MethodKind, MethodSet, Pty};
use superchat_core::auth::AuthState;
use superchat_core::init_state::InitState;
use superchat_core::session::{Session, SessionHandle};
use superchat_core::{ssh_key_fingerprint, Services};
use superchat_wire::messages::{AuthResponse, ServerConfig};
use superchat_wire::{ClientMessage, Frame};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Closing an SSH session asks russh to close the channel. The handle and
/// channel id only exist once both auth and channel-open have happened, so
/// `close()` is a best-effort no-op before then.
struct SshSessionHandle {
    channel_info: Arc<StdMutex<Option<(Handle, ChannelId)>>>,
}

impl SessionHandle for SshSessionHandle {
    fn close(&mut self) {
        let Some((handle, channel)) = self
            .channel_info
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        else {
            return;
        };
        tokio::spawn(async move {
            let _ = handle.close(channel).await;
        });
    }
}

/// A public key offered during auth matched a row in `ssh_keys`: the
/// identity to apply once the handshake actually succeeds.
struct MatchedIdentity {
    key_id: i64,
    user_id: i64,
    nickname: String,
}

const PROTOCOL_VERSION: u8 = 1;

pub struct SshHandler {
    services: Services,
    core_session: Arc<Session>,
    outbound_rx: Option<mpsc::Receiver<superchat_wire::ServerMessage>>,
    handle: Option<Handle>,
    channel: Option<ChannelId>,
    channel_info: Arc<StdMutex<Option<(Handle, ChannelId)>>>,
    pending_identity: Option<MatchedIdentity>,
    inbuf: BytesMut,
    writer_task: Arc<StdMutex<Option<JoinHandle<()>>>>,
}

impl SshHandler {
    pub fn new(services: Services, remote_address: SocketAddr) -> (Self, Arc<Session>) {
        let channel_info = Arc::new(StdMutex::new(None));
        let (core_session, outbound_rx) = Session::new(
            "ssh",
            Some(remote_address),
            Box::new(SshSessionHandle {
                channel_info: channel_info.clone(),
            }),
        );
        let handler = Self {
            services,
            core_session: core_session.clone(),
            outbound_rx: Some(outbound_rx),
            handle: None,
            channel: None,
            channel_info,
            pending_identity: None,
            inbuf: BytesMut::new(),
            writer_task: Arc::new(StdMutex::new(None)),
        };
        (handler, core_session)
    }

    /// Fingerprints `key` the same way `ADD_SSH_KEY` does and looks it up
    /// against `ssh_keys`. `None` covers both "no such key" and a key that
    /// can't be re-encoded in OpenSSH form — either way, auth falls through
    /// to the password method.
    async fn lookup_identity(&self, key: &PublicKey) -> Option<MatchedIdentity> {
        let offered = key.to_openssh().ok()?;
        let fingerprint = ssh_key_fingerprint(&offered);
        let (key_row, user_row) = self
            .services
            .dispatcher
            .storage
            .find_user_by_ssh_fingerprint(&fingerprint)
            .await
            .ok()??;
        Some(MatchedIdentity {
            key_id: key_row.id,
            user_id: user_row.id,
            nickname: user_row.nickname,
        })
    }

    /// Starts the writer task (draining the session's outbound queue onto
    /// the SSH channel) the first moment both a `Handle` (available once
    /// auth succeeds) and a channel id (available once the client opens its
    /// session channel) exist. Harmless to call from either callback before
    /// the other has fired.
    fn spawn_writer_if_ready(&mut self) {
        let Some(handle) = self.handle.clone() else {
            return;
        };
        let Some(channel) = self.channel else {
            return;
        };
        *self.channel_info.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((handle.clone(), channel));

        if self.writer_task.lock().unwrap_or_else(|e| e.into_inner()).is_some() {
            return;
        }
        let Some(mut outbound_rx) = self.outbound_rx.take() else {
            return;
        };

        let task = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let Ok(payload) = message.encode() else {
                    continue;
                };
                let frame = Frame::new(message.message_type(), payload.freeze());
                let encoded = russh::CryptoVec::from(frame.encode().to_vec());
                if handle.data(channel, encoded).await.is_err() {
                    break;
                }
            }
        });
        *self.writer_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }
}

impl Drop for SshHandler {
    fn drop(&mut self) {
        if let Some(task) = self
            .writer_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

impl russh::server::Handler for SshHandler {
    type Error = anyhow::Error;

    /// No SSH-level credential to check: a password just proves the client
    /// completed the handshake, the same anonymous entry point as a raw TCP
    /// or WebSocket connection. Identity still comes from `SET_NICKNAME` /
    /// `AUTH_REQUEST` over the wire protocol once the channel is open.
    async fn auth_password(&mut self, _user: &str, _password: &str) -> Result<Auth, Self::Error> {
        Ok(Auth::Accept)
    }

    async fn auth_publickey_offered(
        &mut self,
        _user: &str,
        key: &PublicKey,
    ) -> Result<Auth, Self::Error> {
        match self.lookup_identity(key).await {
            Some(_) => Ok(Auth::Accept),
            None => Ok(Auth::Reject {
                proceed_with_methods: Some(MethodSet::from(&[MethodKind::Password][..])),
            }),
        }
    }

    async fn auth_publickey(&mut self, _user: &str, key: &PublicKey) -> Result<Auth, Self::Error> {
        match self.lookup_identity(key).await {
            Some(identity) => {
                self.pending_identity = Some(identity);
                Ok(Auth::Accept)
            }
            None => Ok(Auth::Reject {
                proceed_with_methods: Some(MethodSet::from(&[MethodKind::Password][..])),
            }),
        }
    }

    /// A pre-matched SSH key authenticates the session before a single byte
    /// of the chat protocol has been exchanged; the client still gets an
    /// unprompted `AuthResponse` so it learns its identity the same way it
    /// would after sending `AUTH_REQUEST` over TCP or WebSocket.
    async fn auth_succeeded(&mut self, session: &mut RusshSession) -> Result<(), Self::Error> {
        self.handle = Some(session.handle());

        if let Some(identity) = self.pending_identity.take() {
            *self.core_session.auth.lock().await = AuthState::Authenticated {
                user_id: identity.user_id,
                nickname: identity.nickname.clone(),
            };
            *self.core_session.init_state.lock().await = InitState::Ready;
            if let Err(error) = self
                .services
                .dispatcher
                .storage
                .touch_ssh_key(identity.key_id)
                .await
            {
                debug!(%error, "failed to update ssh key last-used timestamp");
            }
            self.core_session
                .respond(superchat_wire::ServerMessage::AuthResponse(AuthResponse {
                    success: true,
                    user_id: Some(identity.user_id),
                    nickname: Some(identity.nickname),
                    message: None,
                    subchannel_id: None,
                }))
                .await;
        }

        self.spawn_writer_if_ready();
        Ok(())
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut RusshSession,
    ) -> Result<bool, Self::Error> {
        if self.channel.is_some() {
            return Ok(false);
        }
        self.channel = Some(channel.id());
        self.spawn_writer_if_ready();

        let server = &self.services.config.store.server;
        let server_config = ServerConfig {
            protocol_version: PROTOCOL_VERSION,
            server_name: self.services.config.store.discovery.server_name.clone(),
            message_rate_limit: server.message_rate_limit,
            max_message_length: server.max_message_length as u32,
            session_timeout_seconds: server.session_timeout_seconds as u32,
            max_channel_subscriptions: server.max_channel_subscriptions as u32,
            max_thread_subscriptions: server.max_thread_subscriptions as u32,
            subchannel_id: None,
        };
        self.core_session
            .respond(superchat_wire::ServerMessage::ServerConfig(server_config))
            .await;

        Ok(true)
    }

    /// A plain `ssh host` with no command is how most clients carry the wire
    /// protocol; accept it unconditionally and let channel data flow.
    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut RusshSession,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel)?;
        Ok(())
    }

    /// Same as `shell_request` — the command text is irrelevant, the channel
    /// is a raw pipe for wire frames either way.
    async fn exec_request(
        &mut self,
        channel: ChannelId,
        _data: &[u8],
        session: &mut RusshSession,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel)?;
        Ok(())
    }

    /// No terminal semantics needed, but accepting keeps clients that
    /// negotiate a PTY before requesting a shell from stalling.
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        _row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut RusshSession,
    ) -> Result<(), Self::Error> {
        session.channel_success(channel)?;
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        _session: &mut RusshSession,
    ) -> Result<(), Self::Error> {
        if Some(channel) != self.channel {
            return Ok(());
        }
        self.inbuf.extend_from_slice(data);
        loop {
            match Frame::try_parse(&mut self.inbuf) {
                Ok(Some(frame)) => match ClientMessage::decode(frame.message_type, frame.payload) {
                    Ok(message) => {
                        self.services
                            .dispatcher
                            .dispatch(&self.core_session, message)
                            .await
                    }
                    Err(error) => {
                        debug!(session_id = %self.core_session.id, %error, "dropping unparseable frame")
                    }
                },
                Ok(None) => break,
                Err(error) => {
                    debug!(session_id = %self.core_session.id, %error, "framing error on SSH channel, closing session");
                    self.inbuf.clear();
                    self.core_session.close().await;
                    break;
                }
            }
        }
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut RusshSession,
    ) -> Result<(), Self::Error> {
        if Some(channel) == self.channel {
            self.channel = None;
        }
        Ok(())
    }
}
