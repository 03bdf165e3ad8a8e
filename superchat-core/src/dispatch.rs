//! The dispatcher: decode → init-state check → rate limit → validation →
//! storage mutation → response + broadcast. Rather than a
//! `HashMap<u8, Handler>` registry dispatching on the raw wire byte,
//! dispatch here is a single exhaustive `match` over the already-decoded
//! [`ClientMessage`] enum — the compiler enforces every variant is handled,
//! which a runtime registry cannot.

use std::sync::Arc;

use chrono::Utc;
use superchat_db_entities::{Channel, Message, SshKey, User};
use superchat_wire::messages::*;
use superchat_wire::ClientMessage;

use crate::auth::{can_create_channel, can_modify_message, is_moderator_override, AuthState};
use crate::consts::{MAX_CHANNEL_NAME_LENGTH, MAX_MESSAGE_LENGTH, MAX_NICKNAME_LENGTH, MIN_NICKNAME_LENGTH};
use crate::error::CoreError;
use crate::init_state::InitState;
use crate::rate_limiting::RateLimiters;
use crate::session::Session;
use crate::storage::{ListCursor, Storage};
use crate::subscriptions::SubscriptionRegistry;

/// Messages a session may send before it has claimed a nickname: the init
/// state machine gates everything else behind `SET_NICKNAME` or
/// `AUTH_REQUEST`.
fn requires_identity(message: &ClientMessage) -> bool {
    !matches!(
        message,
        ClientMessage::SetNickname(_) | ClientMessage::AuthRequest(_) | ClientMessage::Ping(_)
    )
}

pub struct Dispatcher {
    pub storage: Storage,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub rate_limiters: RateLimiters,
}

impl Dispatcher {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            rate_limiters: RateLimiters::new(),
        }
    }

    /// Entry point for a decoded client frame. Never returns an `Err` that
    /// should close the session — `CoreError`s from here always become an
    /// `ERROR` response, the "reply and stay open" default for everything
    /// but protocol-framing failures (those are handled earlier, in the
    /// wire layer).
    pub async fn dispatch(&self, session: &Arc<Session>, message: ClientMessage) {
        if requires_identity(&message) && !session.init_state.lock().await.is_ready() {
            self.respond_error(session, CoreError::WrongInitState, None)
                .await;
            return;
        }

        let subchannel_id = subchannel_of(&message);
        if let Err(err) = self.handle(session, message).await {
            self.respond_error(session, err, subchannel_id).await;
        }
    }

    /// Tears down every subscription a session held. Every transport adapter
    /// calls this once, when its reader or writer loop ends for any reason
    /// (clean close, read error, idle timeout), so a dead connection never
    /// keeps receiving broadcast fan-out.
    pub async fn disconnect(&self, session: &Arc<Session>) {
        self.subscriptions.remove_session(session.id).await;
    }

    async fn respond_error(&self, session: &Arc<Session>, err: CoreError, subchannel_id: Option<u32>) {
        let mut frame = ErrorFrame::new(err.wire_code(), err.to_string());
        frame.subchannel_id = subchannel_id;
        session.respond(superchat_wire::ServerMessage::Error(frame)).await;
    }

    async fn handle(&self, session: &Arc<Session>, message: ClientMessage) -> Result<(), CoreError> {
        match message {
            ClientMessage::Ping(m) => {
                session
                    .respond(superchat_wire::ServerMessage::Pong(Pong {
                        timestamp: m.timestamp,
                    }))
                    .await;
                Ok(())
            }
            ClientMessage::SetNickname(m) => self.set_nickname(session, m).await,
            ClientMessage::AuthRequest(m) => self.authenticate(session, m).await,
            ClientMessage::RegisterUser(m) => self.register_user(session, m).await,
            ClientMessage::Logout(m) => self.logout(session, m).await,
            ClientMessage::CreateChannel(m) => self.create_channel(session, m).await,
            ClientMessage::ListChannels(m) => self.list_channels(session, m).await,
            ClientMessage::JoinChannel(m) => self.join_channel(session, m).await,
            ClientMessage::LeaveChannel(m) => self.leave_channel(session, m).await,
            ClientMessage::SubscribeChannel(m) => self.subscribe_channel(session, m).await,
            ClientMessage::UnsubscribeChannel(m) => self.unsubscribe_channel(session, m).await,
            ClientMessage::SubscribeThread(m) => self.subscribe_thread(session, m).await,
            ClientMessage::UnsubscribeThread(m) => self.unsubscribe_thread(session, m).await,
            ClientMessage::PostMessage(m) => self.post_message(session, m).await,
            ClientMessage::EditMessage(m) => self.edit_message(session, m).await,
            ClientMessage::DeleteMessage(m) => self.delete_message(session, m).await,
            ClientMessage::ListMessages(m) => self.list_messages(session, m).await,
            ClientMessage::ListThreads(m) => self.list_threads(session, m).await,
            ClientMessage::AddSshKey(m) => self.add_ssh_key(session, m).await,
            ClientMessage::ListSshKeys(m) => self.list_ssh_keys(session, m).await,
            ClientMessage::DeleteSshKey(m) => self.delete_ssh_key(session, m).await,
        }
    }

    // ---- identity -------------------------------------------------------

    async fn set_nickname(&self, session: &Arc<Session>, m: SetNickname) -> Result<(), CoreError> {
        validate_nickname(&m.nickname)?;
        if self.storage.find_user_by_nickname(&m.nickname).await?.is_some() {
            session
                .respond(superchat_wire::ServerMessage::NicknameResponse(
                    NicknameResponse {
                        success: false,
                        message: Some(format!("nickname {:?} is already registered", m.nickname)),
                        subchannel_id: m.subchannel_id,
                    },
                ))
                .await;
            return Ok(());
        }
        *session.auth.lock().await = AuthState::Anonymous {
            nickname: m.nickname,
        };
        *session.init_state.lock().await = InitState::Ready;
        session
            .respond(superchat_wire::ServerMessage::NicknameResponse(
                NicknameResponse {
                    success: true,
                    message: None,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn authenticate(&self, session: &Arc<Session>, m: AuthRequest) -> Result<(), CoreError> {
        let required = session.failed_auth.lock().await.required_backoff();
        if session.failed_auth.lock().await.cooldown_remaining(required).is_some() {
            return Err(CoreError::TooManyAuthAttempts);
        }

        let verified = async {
            let user = self
                .storage
                .find_user_by_nickname(&m.nickname)
                .await?
                .ok_or(CoreError::InvalidPassword)?;
            let hash = user.password_hash.clone().ok_or(CoreError::InvalidPassword)?;
            let ok = superchat_common::helpers::hash::verify_password_hash(&m.password, &hash)
                .map_err(|_| CoreError::InvalidPassword)?;
            if !ok {
                return Err(CoreError::InvalidPassword);
            }
            Ok::<_, CoreError>(user)
        }
        .await;

        let user = match verified {
            Ok(user) => user,
            Err(_) => {
                let action = session.failed_auth.lock().await.record_failure();
                session
                    .respond(superchat_wire::ServerMessage::AuthResponse(AuthResponse {
                        success: false,
                        user_id: None,
                        nickname: None,
                        message: Some("invalid nickname or password".into()),
                        subchannel_id: m.subchannel_id,
                    }))
                    .await;
                if matches!(action, crate::auth::AuthFailureAction::Terminate) {
                    session.close().await;
                }
                return Ok(());
            }
        };

        session.failed_auth.lock().await.record_success();
        *session.auth.lock().await = AuthState::Authenticated {
            user_id: user.id,
            nickname: user.nickname.clone(),
        };
        *session.init_state.lock().await = InitState::Ready;
        session
            .respond(superchat_wire::ServerMessage::AuthResponse(AuthResponse {
                success: true,
                user_id: Some(user.id),
                nickname: Some(user.nickname),
                message: None,
                subchannel_id: m.subchannel_id,
            }))
            .await;
        Ok(())
    }

    async fn register_user(&self, session: &Arc<Session>, m: RegisterUser) -> Result<(), CoreError> {
        let nickname = {
            let auth = session.auth.lock().await;
            auth.nickname()
                .map(str::to_owned)
                .ok_or(CoreError::WrongInitState)?
        };
        let hash = superchat_common::helpers::hash::hash_password(&m.password);
        let user = self.storage.register_user(&nickname, &hash).await?;
        *session.auth.lock().await = AuthState::Authenticated {
            user_id: user.id,
            nickname: user.nickname.clone(),
        };
        session
            .respond(superchat_wire::ServerMessage::RegisterResponse(
                RegisterResponse {
                    success: true,
                    user_id: Some(user.id),
                    message: None,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn logout(&self, session: &Arc<Session>, m: Logout) -> Result<(), CoreError> {
        *session.auth.lock().await = AuthState::NotSet;
        *session.init_state.lock().await = InitState::Connecting;
        self.subscriptions.remove_session(session.id).await;
        session
            .respond(superchat_wire::ServerMessage::LogoutResponse(
                LogoutResponse {
                    success: true,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    // ---- channels ---------------------------------------------------------

    async fn create_channel(&self, session: &Arc<Session>, m: CreateChannel) -> Result<(), CoreError> {
        let auth = session.auth.lock().await.clone();
        if !can_create_channel(&auth) {
            return Err(CoreError::Forbidden);
        }
        let user_id = auth.user_id().ok_or(CoreError::Forbidden)?;
        if !self.rate_limiters.check_channel_create(user_id) {
            return Err(CoreError::ChannelCreateRateLimited);
        }
        validate_channel_name(&m.name)?;
        if m.channel_type > 1 {
            return Err(CoreError::InvalidChannelType);
        }

        let channel = self
            .storage
            .create_channel(
                &m.name,
                &m.display_name,
                &m.description,
                m.channel_type as i32,
                m.retention_hours,
                user_id,
            )
            .await?;
        session
            .respond(superchat_wire::ServerMessage::ChannelCreated(
                ChannelCreated {
                    channel: channel_info(&channel),
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn list_channels(&self, session: &Arc<Session>, m: ListChannels) -> Result<(), CoreError> {
        let channels = self.storage.list_channels().await?;
        session
            .respond(superchat_wire::ServerMessage::ChannelListResponse(
                ChannelListResponse {
                    channels: channels.iter().map(channel_info).collect(),
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn join_channel(&self, session: &Arc<Session>, m: JoinChannel) -> Result<(), CoreError> {
        let channel = self.storage.find_channel(m.channel_id).await?;
        self.subscriptions
            .subscribe_channel(m.channel_id, session)
            .await
            .map_err(|_| CoreError::Invariant("channel subscription limit reached"))?;
        session
            .respond(superchat_wire::ServerMessage::JoinResponse(JoinResponse {
                success: true,
                channel: Some(channel_info(&channel)),
                subchannel_id: m.subchannel_id,
            }))
            .await;
        Ok(())
    }

    async fn leave_channel(&self, session: &Arc<Session>, m: LeaveChannel) -> Result<(), CoreError> {
        // Removes the channel subscription, same as `UNSUBSCRIBE_CHANNEL`,
        // and any thread subscriptions rooted in this channel. The fabric
        // doesn't index threads by channel, so we cross-reference the
        // session's current thread subscriptions against storage to find
        // the ones that belong here.
        self.subscriptions
            .unsubscribe_channel(m.channel_id, session.id)
            .await;
        for thread_id in self.subscriptions.session_thread_ids(session.id).await {
            if let Ok(thread_root) = self.storage.find_message(thread_id).await {
                if thread_root.channel_id == m.channel_id {
                    self.subscriptions
                        .unsubscribe_thread(thread_id, session.id)
                        .await;
                }
            }
        }
        session
            .respond(superchat_wire::ServerMessage::LeaveResponse(LeaveResponse {
                success: true,
                channel_id: m.channel_id,
                subchannel_id: m.subchannel_id,
            }))
            .await;
        Ok(())
    }

    async fn subscribe_channel(&self, session: &Arc<Session>, m: SubscribeChannel) -> Result<(), CoreError> {
        self.storage.find_channel(m.channel_id).await?;
        self.subscriptions
            .subscribe_channel(m.channel_id, session)
            .await
            .map_err(|_| CoreError::Invariant("channel subscription limit reached"))?;
        session
            .respond(superchat_wire::ServerMessage::SubscribeResponse(
                SubscribeResponse {
                    success: true,
                    channel_id: m.channel_id,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn unsubscribe_channel(&self, session: &Arc<Session>, m: UnsubscribeChannel) -> Result<(), CoreError> {
        self.subscriptions
            .unsubscribe_channel(m.channel_id, session.id)
            .await;
        session
            .respond(superchat_wire::ServerMessage::UnsubscribeResponse(
                UnsubscribeResponse {
                    success: true,
                    channel_id: m.channel_id,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn subscribe_thread(&self, session: &Arc<Session>, m: SubscribeThread) -> Result<(), CoreError> {
        self.storage.find_message(m.thread_id).await?;
        self.subscriptions
            .subscribe_thread(m.thread_id, session)
            .await
            .map_err(|_| CoreError::Invariant("thread subscription limit reached"))?;
        session
            .respond(superchat_wire::ServerMessage::ThreadSubscribeResponse(
                ThreadSubscribeResponse {
                    success: true,
                    thread_id: m.thread_id,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn unsubscribe_thread(&self, session: &Arc<Session>, m: UnsubscribeThread) -> Result<(), CoreError> {
        self.subscriptions
            .unsubscribe_thread(m.thread_id, session.id)
            .await;
        session
            .respond(superchat_wire::ServerMessage::ThreadUnsubscribeResponse(
                ThreadUnsubscribeResponse {
                    success: true,
                    thread_id: m.thread_id,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    // ---- messages -----------------------------------------------------

    async fn post_message(&self, session: &Arc<Session>, m: PostMessage) -> Result<(), CoreError> {
        if !self.rate_limiters.check_message(session.id) {
            return Err(CoreError::MessageRateLimited);
        }
        if m.content.is_empty() || m.content.len() > MAX_MESSAGE_LENGTH {
            return Err(CoreError::InvalidMessageLength(m.content.len()));
        }
        let auth = session.auth.lock().await.clone();
        let nickname = auth.display_nickname().ok_or(CoreError::WrongInitState)?;

        let message = self
            .storage
            .post_message(m.channel_id, m.parent_id, auth.user_id(), &nickname, &m.content)
            .await?;

        session
            .respond(superchat_wire::ServerMessage::MessagePosted(
                MessagePosted {
                    success: true,
                    message_id: Some(message.id),
                    error_code: None,
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;

        let broadcast = superchat_wire::ServerMessage::NewMessage(NewMessage {
            message: message_info(&message),
            subchannel_id: None,
        });
        self.subscriptions
            .broadcast_to_channel(m.channel_id, broadcast.clone())
            .await;
        if let Some(parent_id) = message.parent_id {
            self.subscriptions.broadcast_to_thread(parent_id, broadcast).await;
        }
        Ok(())
    }

    async fn edit_message(&self, session: &Arc<Session>, m: EditMessage) -> Result<(), CoreError> {
        if m.content.is_empty() || m.content.len() > MAX_MESSAGE_LENGTH {
            return Err(CoreError::InvalidMessageLength(m.content.len()));
        }
        // A missing message and one that exists but isn't the caller's both
        // come back as Forbidden, so a client can't tell the two apart.
        let existing = match self.storage.find_message(m.message_id).await {
            Err(CoreError::MessageNotFound(_)) => return Err(CoreError::Forbidden),
            other => other?,
        };
        let auth = session.auth.lock().await.clone();
        if !can_modify_message(&auth, existing.author_user_id) {
            return Err(CoreError::Forbidden);
        }
        if existing.deleted_at.is_some() {
            return Err(CoreError::Forbidden);
        }

        let message = self.storage.edit_message(m.message_id, &m.content).await?;
        let broadcast = superchat_wire::ServerMessage::MessageEdited(MessageEdited {
            message: message_info(&message),
            subchannel_id: None,
        });
        self.subscriptions
            .broadcast_to_channel(message.channel_id, broadcast.clone())
            .await;
        if let Some(parent_id) = message.parent_id {
            self.subscriptions.broadcast_to_thread(parent_id, broadcast).await;
        }
        Ok(())
    }

    async fn delete_message(&self, session: &Arc<Session>, m: DeleteMessage) -> Result<(), CoreError> {
        // A missing message and one that exists but isn't the caller's both
        // come back as Forbidden, so a client can't tell the two apart.
        let existing = match self.storage.find_message(m.message_id).await {
            Err(CoreError::MessageNotFound(_)) => return Err(CoreError::Forbidden),
            other => other?,
        };
        let auth = session.auth.lock().await.clone();

        let is_author = can_modify_message(&auth, existing.author_user_id);
        let is_moderator = match auth.user_id() {
            Some(user_id) => is_moderator_override(self.storage.find_user_by_id(user_id).await?.as_ref()),
            None => false,
        };
        if !is_author && !is_moderator {
            return Err(CoreError::Forbidden);
        }

        self.storage
            .delete_message(m.message_id, is_moderator && !is_author)
            .await?;
        let broadcast = superchat_wire::ServerMessage::MessageDeleted(MessageDeleted {
            message_id: m.message_id,
            channel_id: existing.channel_id,
            deleted_at: Utc::now().timestamp_millis(),
            subchannel_id: None,
        });
        self.subscriptions
            .broadcast_to_channel(existing.channel_id, broadcast.clone())
            .await;
        if let Some(parent_id) = existing.parent_id {
            self.subscriptions.broadcast_to_thread(parent_id, broadcast).await;
        }
        Ok(())
    }

    async fn list_messages(&self, session: &Arc<Session>, m: ListMessages) -> Result<(), CoreError> {
        let cursor = ListCursor {
            before_id: m.before_id,
            after_id: m.after_id,
            limit: m.limit as u64,
        };
        let messages = match m.parent_id {
            Some(root_id) => self.storage.list_thread_replies_depth_first(root_id).await?,
            None => self.storage.list_channel_messages(m.channel_id, cursor).await?,
        };
        session
            .respond(superchat_wire::ServerMessage::MessageListResponse(
                MessageListResponse {
                    messages: messages.iter().map(message_info).collect(),
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn list_threads(&self, session: &Arc<Session>, m: ListThreads) -> Result<(), CoreError> {
        let cursor = ListCursor {
            before_id: m.before_id,
            after_id: m.after_id,
            limit: m.limit as u64,
        };
        let threads = self.storage.list_thread_roots(m.channel_id, cursor).await?;
        session
            .respond(superchat_wire::ServerMessage::ThreadListResponse(
                ThreadListResponse {
                    threads: threads.iter().map(message_info).collect(),
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    // ---- ssh keys -------------------------------------------------------

    async fn add_ssh_key(&self, session: &Arc<Session>, m: AddSshKey) -> Result<(), CoreError> {
        let user_id = session
            .auth
            .lock()
            .await
            .user_id()
            .ok_or(CoreError::Forbidden)?;
        let fingerprint = ssh_key_fingerprint(&m.public_key);
        let key_type = m
            .public_key
            .split_whitespace()
            .next()
            .unwrap_or("ssh-ed25519")
            .to_string();
        let key = self
            .storage
            .add_ssh_key(user_id, &fingerprint, &key_type, m.label)
            .await?;
        session
            .respond(superchat_wire::ServerMessage::SshKeyAdded(SshKeyAdded {
                key: ssh_key_info(&key),
                subchannel_id: m.subchannel_id,
            }))
            .await;
        Ok(())
    }

    async fn list_ssh_keys(&self, session: &Arc<Session>, m: ListSshKeys) -> Result<(), CoreError> {
        let user_id = session
            .auth
            .lock()
            .await
            .user_id()
            .ok_or(CoreError::Forbidden)?;
        let keys = self.storage.list_ssh_keys(user_id).await?;
        session
            .respond(superchat_wire::ServerMessage::SshKeyListResponse(
                SshKeyListResponse {
                    keys: keys.iter().map(ssh_key_info).collect(),
                    subchannel_id: m.subchannel_id,
                },
            ))
            .await;
        Ok(())
    }

    async fn delete_ssh_key(&self, session: &Arc<Session>, m: DeleteSshKey) -> Result<(), CoreError> {
        let user_id = session
            .auth
            .lock()
            .await
            .user_id()
            .ok_or(CoreError::Forbidden)?;
        self.storage.delete_ssh_key(user_id, m.key_id).await?;
        session
            .respond(superchat_wire::ServerMessage::SshKeyDeleted(SshKeyDeleted {
                key_id: m.key_id,
                subchannel_id: m.subchannel_id,
            }))
            .await;
        Ok(())
    }
}

fn validate_nickname(nickname: &str) -> Result<(), CoreError> {
    if nickname.len() < MIN_NICKNAME_LENGTH || nickname.len() > MAX_NICKNAME_LENGTH {
        return Err(CoreError::InvalidNickname(nickname.to_string()));
    }
    if !nickname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(CoreError::InvalidNickname(nickname.to_string()));
    }
    Ok(())
}

fn validate_channel_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.len() > MAX_CHANNEL_NAME_LENGTH {
        return Err(CoreError::InvalidChannelName(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(CoreError::InvalidChannelName(name.to_string()));
    }
    Ok(())
}

fn channel_info(c: &Channel::Model) -> ChannelInfo {
    ChannelInfo {
        channel_id: c.id,
        name: c.name.clone(),
        display_name: c.display_name.clone(),
        description: c.description.clone(),
        channel_type: c.channel_type as u8,
        retention_hours: c.retention_hours,
        created_by: c.created_by,
        created_at: c.created_at.timestamp_millis(),
    }
}

fn message_info(m: &Message::Model) -> MessageInfo {
    MessageInfo {
        message_id: m.id,
        channel_id: m.channel_id,
        parent_id: m.parent_id,
        author_user_id: m.author_user_id,
        author_nickname: m.author_nickname.clone(),
        content: m.content.clone(),
        created_at: m.created_at.timestamp_millis(),
        edited_at: m.edited_at.map(|t| t.timestamp_millis()),
        deleted_at: m.deleted_at.map(|t| t.timestamp_millis()),
        thread_depth: m.thread_depth as u32,
        reply_count: m.reply_count as u64,
    }
}

/// OpenSSH-style `SHA256:<hex digest>` fingerprint of an authorized-keys
/// line, computed directly here since the value only ever needs to be a
/// stable, collision-resistant key for lookup — not a parsed key. Also
/// called by `superchat-protocol-ssh` so the fingerprint a key is stored
/// under (via `ADD_SSH_KEY`) and the fingerprint its transport-level pubkey
/// auth looks up are always the same function.
pub fn ssh_key_fingerprint(public_key: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(public_key.trim().as_bytes());
    format!("SHA256:{}", hex::encode(hasher.finalize()))
}

fn ssh_key_info(k: &SshKey::Model) -> SshKeyInfo {
    SshKeyInfo {
        key_id: k.id,
        fingerprint: k.fingerprint.clone(),
        key_type: k.key_type.clone(),
        label: k.label.clone(),
        added_at: k.added_at.timestamp_millis(),
        last_used_at: k.last_used_at.map(|t| t.timestamp_millis()),
    }
}

fn subchannel_of(message: &ClientMessage) -> Option<u32> {
    match message {
        ClientMessage::SetNickname(m) => m.subchannel_id,
        ClientMessage::AuthRequest(m) => m.subchannel_id,
        ClientMessage::RegisterUser(m) => m.subchannel_id,
        ClientMessage::Logout(m) => m.subchannel_id,
        ClientMessage::CreateChannel(m) => m.subchannel_id,
        ClientMessage::ListChannels(m) => m.subchannel_id,
        ClientMessage::JoinChannel(m) => m.subchannel_id,
        ClientMessage::LeaveChannel(m) => m.subchannel_id,
        ClientMessage::SubscribeChannel(m) => m.subchannel_id,
        ClientMessage::UnsubscribeChannel(m) => m.subchannel_id,
        ClientMessage::SubscribeThread(m) => m.subchannel_id,
        ClientMessage::UnsubscribeThread(m) => m.subchannel_id,
        ClientMessage::PostMessage(m) => m.subchannel_id,
        ClientMessage::EditMessage(m) => m.subchannel_id,
        ClientMessage::DeleteMessage(m) => m.subchannel_id,
        ClientMessage::ListMessages(m) => m.subchannel_id,
        ClientMessage::ListThreads(m) => m.subchannel_id,
        ClientMessage::AddSshKey(m) => m.subchannel_id,
        ClientMessage::ListSshKeys(m) => m.subchannel_id,
        ClientMessage::DeleteSshKey(m) => m.subchannel_id,
        ClientMessage::Ping(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use sea_orm::Database;

    struct NullHandle;
    impl SessionHandle for NullHandle {
        fn close(&mut self) {}
    }

    async fn dispatcher() -> Dispatcher {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        superchat_db_migrations::migrate_database(&db).await.unwrap();
        Dispatcher::new(Storage::new(db))
    }

    fn new_session() -> (Arc<Session>, tokio::sync::mpsc::Receiver<superchat_wire::ServerMessage>) {
        Session::new("tcp", None, Box::new(NullHandle))
    }

    #[tokio::test]
    async fn anonymous_post_is_attributed_with_a_tilde_prefix() {
        let dispatcher = dispatcher().await;
        let (session, mut rx) = new_session();

        dispatcher
            .dispatch(
                &session,
                ClientMessage::SetNickname(SetNickname {
                    nickname: "guest1".into(),
                    subchannel_id: None,
                }),
            )
            .await;
        let _ = rx.recv().await;

        let channel = dispatcher
            .storage
            .create_channel("general", "General", "", 0, 0, {
                let user = dispatcher.storage.register_user("owner", "h").await.unwrap();
                user.id
            })
            .await
            .unwrap();

        dispatcher
            .dispatch(
                &session,
                ClientMessage::PostMessage(PostMessage {
                    channel_id: channel.id,
                    parent_id: None,
                    content: "hello".into(),
                    subchannel_id: None,
                }),
            )
            .await;
        let _ = rx.recv().await; // MessagePosted

        let messages = dispatcher
            .storage
            .list_channel_messages(channel.id, ListCursor { limit: 10, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author_nickname, "~guest1");
    }

    #[tokio::test]
    async fn registered_user_cannot_edit_anothers_message() {
        let dispatcher = dispatcher().await;
        let owner = dispatcher.storage.register_user("alice", "h").await.unwrap();
        let other = dispatcher.storage.register_user("mallory", "h").await.unwrap();
        let channel = dispatcher
            .storage
            .create_channel("general", "General", "", 0, 0, owner.id)
            .await
            .unwrap();
        let message = dispatcher
            .storage
            .post_message(channel.id, None, Some(owner.id), "alice", "mine")
            .await
            .unwrap();

        let (session, mut rx) = new_session();
        *session.auth.lock().await = AuthState::Authenticated {
            user_id: other.id,
            nickname: "mallory".into(),
        };
        *session.init_state.lock().await = InitState::Ready;

        dispatcher
            .dispatch(
                &session,
                ClientMessage::EditMessage(EditMessage {
                    message_id: message.id,
                    content: "hijacked".into(),
                    subchannel_id: None,
                }),
            )
            .await;

        let response = rx.recv().await.unwrap();
        assert!(matches!(response, superchat_wire::ServerMessage::Error(_)));
    }
}
