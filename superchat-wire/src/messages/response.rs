use bytes::{Bytes, BytesMut};

use super::info::{ChannelInfo, MessageInfo, SshKeyInfo};
use super::opcode::response::*;
use crate::error::WireError;
use crate::error_code::ErrorCode;
use crate::primitive::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub protocol_version: u8,
    pub server_name: String,
    pub message_rate_limit: u32,
    pub max_message_length: u32,
    pub session_timeout_seconds: u32,
    pub max_channel_subscriptions: u32,
    pub max_thread_subscriptions: u32,
    /// Always `None` on the wire today; reserved for hierarchical
    /// channels. Preserved verbatim on decode.
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicknameResponse {
    pub success: bool,
    pub message: Option<String>,
    /// Always `None` on the wire today; reserved for hierarchical
    /// channels. Preserved verbatim on decode.
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub success: bool,
    pub user_id: Option<i64>,
    pub nickname: Option<String>,
    pub message: Option<String>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: Option<i64>,
    pub message: Option<String>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutResponse {
    pub success: bool,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelListResponse {
    pub channels: Vec<ChannelInfo>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCreated {
    pub channel: ChannelInfo,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinResponse {
    pub success: bool,
    pub channel: Option<ChannelInfo>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveResponse {
    pub success: bool,
    pub channel_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    pub success: bool,
    pub channel_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeResponse {
    pub success: bool,
    pub channel_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSubscribeResponse {
    pub success: bool,
    pub thread_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadUnsubscribeResponse {
    pub success: bool,
    pub thread_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePosted {
    pub success: bool,
    pub message_id: Option<i64>,
    pub error_code: Option<u16>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub message: MessageInfo,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEdited {
    pub message: MessageInfo,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDeleted {
    pub message_id: i64,
    pub channel_id: i64,
    pub deleted_at: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageListResponse {
    pub messages: Vec<MessageInfo>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadListResponse {
    pub threads: Vec<MessageInfo>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyAdded {
    pub key: SshKeyInfo,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyListResponse {
    pub keys: Vec<SshKeyInfo>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyDeleted {
    pub key_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorFrame {
    pub code: u16,
    pub message: String,
    pub subchannel_id: Option<u32>,
}

impl ErrorFrame {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_u16(),
            message: message.into(),
            subchannel_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    ServerConfig(ServerConfig),
    NicknameResponse(NicknameResponse),
    AuthResponse(AuthResponse),
    RegisterResponse(RegisterResponse),
    LogoutResponse(LogoutResponse),
    ChannelListResponse(ChannelListResponse),
    ChannelCreated(ChannelCreated),
    JoinResponse(JoinResponse),
    LeaveResponse(LeaveResponse),
    SubscribeResponse(SubscribeResponse),
    UnsubscribeResponse(UnsubscribeResponse),
    ThreadSubscribeResponse(ThreadSubscribeResponse),
    ThreadUnsubscribeResponse(ThreadUnsubscribeResponse),
    MessagePosted(MessagePosted),
    NewMessage(NewMessage),
    MessageEdited(MessageEdited),
    MessageDeleted(MessageDeleted),
    MessageListResponse(MessageListResponse),
    ThreadListResponse(ThreadListResponse),
    SshKeyAdded(SshKeyAdded),
    SshKeyListResponse(SshKeyListResponse),
    SshKeyDeleted(SshKeyDeleted),
    Pong(Pong),
    Error(ErrorFrame),
}

fn put_vec<T>(
    buf: &mut BytesMut,
    items: &[T],
    write: impl Fn(&mut BytesMut, &T) -> Result<(), WireError>,
) -> Result<(), WireError> {
    if items.len() > u16::MAX as usize {
        return Err(WireError::OutOfRange {
            field: "vec length",
            value: items.len() as i64,
        });
    }
    put_u16(buf, items.len() as u16);
    for item in items {
        write(buf, item)?;
    }
    Ok(())
}

fn get_vec<T>(
    buf: &mut Bytes,
    field: &'static str,
    read: impl Fn(&mut Bytes) -> Result<T, WireError>,
) -> Result<Vec<T>, WireError> {
    let len = get_u16(buf, field)? as usize;
    let mut out = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        out.push(read(buf)?);
    }
    Ok(out)
}

fn opt_i64(buf: &mut BytesMut, v: &Option<i64>) -> Result<(), WireError> {
    put_optional(buf, v, |b, x| {
        put_i64(b, *x);
        Ok(())
    })
}

fn get_opt_i64(buf: &mut Bytes, field: &'static str) -> Result<Option<i64>, WireError> {
    get_optional(buf, field, |b| get_i64(b, field))
}

fn opt_string(buf: &mut BytesMut, v: &Option<String>) -> Result<(), WireError> {
    put_optional(buf, v, |b, s| put_string(b, s))
}

fn get_opt_string(buf: &mut Bytes, field: &'static str) -> Result<Option<String>, WireError> {
    get_optional(buf, field, |b| get_string(b, field))
}

impl ServerMessage {
    pub fn message_type(&self) -> u8 {
        match self {
            Self::ServerConfig(_) => SERVER_CONFIG,
            Self::NicknameResponse(_) => NICKNAME_RESPONSE,
            Self::AuthResponse(_) => AUTH_RESPONSE,
            Self::RegisterResponse(_) => REGISTER_RESPONSE,
            Self::LogoutResponse(_) => LOGOUT_RESPONSE,
            Self::ChannelListResponse(_) => CHANNEL_LIST_RESPONSE,
            Self::ChannelCreated(_) => CHANNEL_CREATED,
            Self::JoinResponse(_) => JOIN_RESPONSE,
            Self::LeaveResponse(_) => LEAVE_RESPONSE,
            Self::SubscribeResponse(_) => SUBSCRIBE_RESPONSE,
            Self::UnsubscribeResponse(_) => UNSUBSCRIBE_RESPONSE,
            Self::ThreadSubscribeResponse(_) => THREAD_SUBSCRIBE_RESPONSE,
            Self::ThreadUnsubscribeResponse(_) => THREAD_UNSUBSCRIBE_RESPONSE,
            Self::MessagePosted(_) => MESSAGE_POSTED,
            Self::NewMessage(_) => NEW_MESSAGE,
            Self::MessageEdited(_) => MESSAGE_EDITED,
            Self::MessageDeleted(_) => MESSAGE_DELETED,
            Self::MessageListResponse(_) => MESSAGE_LIST_RESPONSE,
            Self::ThreadListResponse(_) => THREAD_LIST_RESPONSE,
            Self::SshKeyAdded(_) => SSH_KEY_ADDED,
            Self::SshKeyListResponse(_) => SSH_KEY_LIST_RESPONSE,
            Self::SshKeyDeleted(_) => SSH_KEY_DELETED,
            Self::Pong(_) => PONG,
            Self::Error(_) => ERROR,
        }
    }

    pub fn encode(&self) -> Result<BytesMut, WireError> {
        let mut buf = BytesMut::new();
        match self {
            Self::ServerConfig(m) => {
                put_u8(&mut buf, m.protocol_version);
                put_string(&mut buf, &m.server_name)?;
                put_u32(&mut buf, m.message_rate_limit);
                put_u32(&mut buf, m.max_message_length);
                put_u32(&mut buf, m.session_timeout_seconds);
                put_u32(&mut buf, m.max_channel_subscriptions);
                put_u32(&mut buf, m.max_thread_subscriptions);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::NicknameResponse(m) => {
                put_bool(&mut buf, m.success);
                opt_string(&mut buf, &m.message)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::AuthResponse(m) => {
                put_bool(&mut buf, m.success);
                opt_i64(&mut buf, &m.user_id)?;
                opt_string(&mut buf, &m.nickname)?;
                opt_string(&mut buf, &m.message)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::RegisterResponse(m) => {
                put_bool(&mut buf, m.success);
                opt_i64(&mut buf, &m.user_id)?;
                opt_string(&mut buf, &m.message)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::LogoutResponse(m) => {
                put_bool(&mut buf, m.success);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ChannelListResponse(m) => {
                put_vec(&mut buf, &m.channels, |b, c| c.encode_to(b))?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ChannelCreated(m) => {
                m.channel.encode_to(&mut buf)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::JoinResponse(m) => {
                put_bool(&mut buf, m.success);
                put_optional(&mut buf, &m.channel, |b, c| c.encode_to(b))?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::LeaveResponse(m) => {
                put_bool(&mut buf, m.success);
                put_i64(&mut buf, m.channel_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::SubscribeResponse(m) => {
                put_bool(&mut buf, m.success);
                put_i64(&mut buf, m.channel_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::UnsubscribeResponse(m) => {
                put_bool(&mut buf, m.success);
                put_i64(&mut buf, m.channel_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ThreadSubscribeResponse(m) => {
                put_bool(&mut buf, m.success);
                put_i64(&mut buf, m.thread_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ThreadUnsubscribeResponse(m) => {
                put_bool(&mut buf, m.success);
                put_i64(&mut buf, m.thread_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::MessagePosted(m) => {
                put_bool(&mut buf, m.success);
                opt_i64(&mut buf, &m.message_id)?;
                put_optional(&mut buf, &m.error_code, |b, c| {
                    put_u16(b, *c);
                    Ok(())
                })?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::NewMessage(m) => {
                m.message.encode_to(&mut buf)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::MessageEdited(m) => {
                m.message.encode_to(&mut buf)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::MessageDeleted(m) => {
                put_i64(&mut buf, m.message_id);
                put_i64(&mut buf, m.channel_id);
                put_timestamp_ms(&mut buf, m.deleted_at);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::MessageListResponse(m) => {
                put_vec(&mut buf, &m.messages, |b, msg| msg.encode_to(b))?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ThreadListResponse(m) => {
                put_vec(&mut buf, &m.threads, |b, msg| msg.encode_to(b))?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::SshKeyAdded(m) => {
                m.key.encode_to(&mut buf)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::SshKeyListResponse(m) => {
                put_vec(&mut buf, &m.keys, |b, k| k.encode_to(b))?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::SshKeyDeleted(m) => {
                put_i64(&mut buf, m.key_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::Pong(m) => {
                put_timestamp_ms(&mut buf, m.timestamp);
            }
            Self::Error(m) => {
                put_u16(&mut buf, m.code);
                put_string(&mut buf, &m.message)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
        }
        Ok(buf)
    }

    pub fn decode(message_type: u8, payload: Bytes) -> Result<Self, WireError> {
        let mut buf = payload;
        let msg = match message_type {
            SERVER_CONFIG => Self::ServerConfig(ServerConfig {
                protocol_version: get_u8(&mut buf, "protocol_version")?,
                server_name: get_string(&mut buf, "server_name")?,
                message_rate_limit: get_u32(&mut buf, "message_rate_limit")?,
                max_message_length: get_u32(&mut buf, "max_message_length")?,
                session_timeout_seconds: get_u32(&mut buf, "session_timeout_seconds")?,
                max_channel_subscriptions: get_u32(&mut buf, "max_channel_subscriptions")?,
                max_thread_subscriptions: get_u32(&mut buf, "max_thread_subscriptions")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            NICKNAME_RESPONSE => Self::NicknameResponse(NicknameResponse {
                success: get_bool(&mut buf, "success")?,
                message: get_opt_string(&mut buf, "message")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            AUTH_RESPONSE => Self::AuthResponse(AuthResponse {
                success: get_bool(&mut buf, "success")?,
                user_id: get_opt_i64(&mut buf, "user_id")?,
                nickname: get_opt_string(&mut buf, "nickname")?,
                message: get_opt_string(&mut buf, "message")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            REGISTER_RESPONSE => Self::RegisterResponse(RegisterResponse {
                success: get_bool(&mut buf, "success")?,
                user_id: get_opt_i64(&mut buf, "user_id")?,
                message: get_opt_string(&mut buf, "message")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LOGOUT_RESPONSE => Self::LogoutResponse(LogoutResponse {
                success: get_bool(&mut buf, "success")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            CHANNEL_LIST_RESPONSE => Self::ChannelListResponse(ChannelListResponse {
                channels: get_vec(&mut buf, "channels", ChannelInfo::decode)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            CHANNEL_CREATED => Self::ChannelCreated(ChannelCreated {
                channel: ChannelInfo::decode(&mut buf)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            JOIN_RESPONSE => Self::JoinResponse(JoinResponse {
                success: get_bool(&mut buf, "success")?,
                channel: get_optional(&mut buf, "channel", ChannelInfo::decode)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LEAVE_RESPONSE => Self::LeaveResponse(LeaveResponse {
                success: get_bool(&mut buf, "success")?,
                channel_id: get_i64(&mut buf, "channel_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            SUBSCRIBE_RESPONSE => Self::SubscribeResponse(SubscribeResponse {
                success: get_bool(&mut buf, "success")?,
                channel_id: get_i64(&mut buf, "channel_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            UNSUBSCRIBE_RESPONSE => Self::UnsubscribeResponse(UnsubscribeResponse {
                success: get_bool(&mut buf, "success")?,
                channel_id: get_i64(&mut buf, "channel_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            THREAD_SUBSCRIBE_RESPONSE => {
                Self::ThreadSubscribeResponse(ThreadSubscribeResponse {
                    success: get_bool(&mut buf, "success")?,
                    thread_id: get_i64(&mut buf, "thread_id")?,
                    subchannel_id: get_subchannel_id(&mut buf)?,
                })
            }
            THREAD_UNSUBSCRIBE_RESPONSE => {
                Self::ThreadUnsubscribeResponse(ThreadUnsubscribeResponse {
                    success: get_bool(&mut buf, "success")?,
                    thread_id: get_i64(&mut buf, "thread_id")?,
                    subchannel_id: get_subchannel_id(&mut buf)?,
                })
            }
            MESSAGE_POSTED => Self::MessagePosted(MessagePosted {
                success: get_bool(&mut buf, "success")?,
                message_id: get_opt_i64(&mut buf, "message_id")?,
                error_code: get_optional(&mut buf, "error_code", |b| get_u16(b, "error_code"))?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            NEW_MESSAGE => Self::NewMessage(NewMessage {
                message: MessageInfo::decode(&mut buf)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            MESSAGE_EDITED => Self::MessageEdited(MessageEdited {
                message: MessageInfo::decode(&mut buf)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            MESSAGE_DELETED => Self::MessageDeleted(MessageDeleted {
                message_id: get_i64(&mut buf, "message_id")?,
                channel_id: get_i64(&mut buf, "channel_id")?,
                deleted_at: get_timestamp_ms(&mut buf, "deleted_at")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            MESSAGE_LIST_RESPONSE => Self::MessageListResponse(MessageListResponse {
                messages: get_vec(&mut buf, "messages", MessageInfo::decode)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            THREAD_LIST_RESPONSE => Self::ThreadListResponse(ThreadListResponse {
                threads: get_vec(&mut buf, "threads", MessageInfo::decode)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            SSH_KEY_ADDED => Self::SshKeyAdded(SshKeyAdded {
                key: SshKeyInfo::decode(&mut buf)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            SSH_KEY_LIST_RESPONSE => Self::SshKeyListResponse(SshKeyListResponse {
                keys: get_vec(&mut buf, "keys", SshKeyInfo::decode)?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            SSH_KEY_DELETED => Self::SshKeyDeleted(SshKeyDeleted {
                key_id: get_i64(&mut buf, "key_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            PONG => Self::Pong(Pong {
                timestamp: get_timestamp_ms(&mut buf, "timestamp")?,
            }),
            ERROR => Self::Error(ErrorFrame {
                code: get_u16(&mut buf, "code")?,
                message: get_string(&mut buf, "message")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            other => return Err(WireError::UnknownMessageType(other)),
        };
        if !buf.is_empty() {
            return Err(WireError::TrailingBytes(buf.len()));
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: ServerMessage) {
        let encoded = msg.encode().unwrap().freeze();
        let decoded = ServerMessage::decode(msg.message_type(), encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn server_config_round_trips() {
        round_trip(ServerMessage::ServerConfig(ServerConfig {
            protocol_version: 1,
            server_name: "SuperChat Server".into(),
            message_rate_limit: 10,
            max_message_length: 4096,
            session_timeout_seconds: 600,
            max_channel_subscriptions: 20,
            max_thread_subscriptions: 50,
            subchannel_id: None,
        }));
    }

    #[test]
    fn new_message_with_deleted_content_round_trips() {
        round_trip(ServerMessage::NewMessage(NewMessage {
            message: MessageInfo {
                message_id: 1,
                channel_id: 1,
                parent_id: None,
                author_user_id: None,
                author_nickname: "~alice".into(),
                content: "[deleted by author]".into(),
                created_at: 0,
                edited_at: None,
                deleted_at: Some(1000),
                thread_depth: 0,
                reply_count: 0,
            },
            subchannel_id: None,
        }));
    }

    #[test]
    fn empty_vec_round_trips() {
        round_trip(ServerMessage::ChannelListResponse(ChannelListResponse {
            channels: vec![],
            subchannel_id: None,
        }));
    }

    #[test]
    fn error_frame_round_trips() {
        round_trip(ServerMessage::Error(ErrorFrame::new(
            ErrorCode::Forbidden,
            "not the author",
        )));
    }

    #[test]
    fn truncated_vec_length_errors() {
        let mut buf = BytesMut::new();
        put_u16(&mut buf, 5); // claims 5 elements, provides none
        put_subchannel_id(&mut buf, None).unwrap();
        assert!(ServerMessage::decode(CHANNEL_LIST_RESPONSE, buf.freeze()).is_err());
    }
}
