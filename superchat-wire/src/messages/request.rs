use bytes::{Bytes, BytesMut};

use super::opcode::request::*;
use crate::error::WireError;
use crate::primitive::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetNickname {
    pub nickname: String,
    /// Always `None` on the wire today; reserved for hierarchical
    /// channels. Preserved verbatim on decode.
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub nickname: String,
    pub password: String,
    /// Always `None` on the wire today; reserved for hierarchical
    /// channels. Preserved verbatim on decode.
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUser {
    pub password: String,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logout {
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChannel {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub channel_type: u8,
    pub retention_hours: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChannels {
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinChannel {
    pub channel_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveChannel {
    pub channel_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeChannel {
    pub channel_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeChannel {
    pub channel_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeThread {
    pub thread_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeThread {
    pub thread_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage {
    pub channel_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditMessage {
    pub message_id: i64,
    pub content: String,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMessage {
    pub message_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMessages {
    pub channel_id: i64,
    /// `Some(id)` lists the replies of a specific forum message; `None`
    /// lists the channel's root/chat stream.
    pub parent_id: Option<i64>,
    pub before_id: Option<i64>,
    pub after_id: Option<i64>,
    pub limit: u16,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListThreads {
    pub channel_id: i64,
    pub before_id: Option<i64>,
    pub after_id: Option<i64>,
    pub limit: u16,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSshKey {
    pub public_key: String,
    pub label: Option<String>,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSshKeys {
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSshKey {
    pub key_id: i64,
    pub subchannel_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    SetNickname(SetNickname),
    AuthRequest(AuthRequest),
    RegisterUser(RegisterUser),
    Logout(Logout),
    CreateChannel(CreateChannel),
    ListChannels(ListChannels),
    JoinChannel(JoinChannel),
    LeaveChannel(LeaveChannel),
    SubscribeChannel(SubscribeChannel),
    UnsubscribeChannel(UnsubscribeChannel),
    SubscribeThread(SubscribeThread),
    UnsubscribeThread(UnsubscribeThread),
    PostMessage(PostMessage),
    EditMessage(EditMessage),
    DeleteMessage(DeleteMessage),
    ListMessages(ListMessages),
    ListThreads(ListThreads),
    AddSshKey(AddSshKey),
    ListSshKeys(ListSshKeys),
    DeleteSshKey(DeleteSshKey),
    Ping(Ping),
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

impl ClientMessage {
    pub fn message_type(&self) -> u8 {
        match self {
            Self::SetNickname(_) => SET_NICKNAME,
            Self::AuthRequest(_) => AUTH_REQUEST,
            Self::RegisterUser(_) => REGISTER_USER,
            Self::Logout(_) => LOGOUT,
            Self::CreateChannel(_) => CREATE_CHANNEL,
            Self::ListChannels(_) => LIST_CHANNELS,
            Self::JoinChannel(_) => JOIN_CHANNEL,
            Self::LeaveChannel(_) => LEAVE_CHANNEL,
            Self::SubscribeChannel(_) => SUBSCRIBE_CHANNEL,
            Self::UnsubscribeChannel(_) => UNSUBSCRIBE_CHANNEL,
            Self::SubscribeThread(_) => SUBSCRIBE_THREAD,
            Self::UnsubscribeThread(_) => UNSUBSCRIBE_THREAD,
            Self::PostMessage(_) => POST_MESSAGE,
            Self::EditMessage(_) => EDIT_MESSAGE,
            Self::DeleteMessage(_) => DELETE_MESSAGE,
            Self::ListMessages(_) => LIST_MESSAGES,
            Self::ListThreads(_) => LIST_THREADS,
            Self::AddSshKey(_) => ADD_SSH_KEY,
            Self::ListSshKeys(_) => LIST_SSH_KEYS,
            Self::DeleteSshKey(_) => DELETE_SSH_KEY,
            Self::Ping(_) => PING,
        }
    }

    pub fn encode(&self) -> Result<BytesMut, WireError> {
        let mut buf = BytesMut::new();
        match self {
            Self::SetNickname(m) => {
                put_string(&mut buf, &m.nickname)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::AuthRequest(m) => {
                put_string(&mut buf, &m.nickname)?;
                put_string(&mut buf, &m.password)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::RegisterUser(m) => {
                put_string(&mut buf, &m.password)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::Logout(m) => {
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::CreateChannel(m) => {
                put_string(&mut buf, &m.name)?;
                put_string(&mut buf, &m.display_name)?;
                put_string(&mut buf, &m.description)?;
                put_u8(&mut buf, m.channel_type);
                put_i64(&mut buf, m.retention_hours);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ListChannels(m) => {
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::JoinChannel(m) => {
                put_i64(&mut buf, m.channel_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::LeaveChannel(m) => {
                put_i64(&mut buf, m.channel_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::SubscribeChannel(m) => {
                put_i64(&mut buf, m.channel_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::UnsubscribeChannel(m) => {
                put_i64(&mut buf, m.channel_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::SubscribeThread(m) => {
                put_i64(&mut buf, m.thread_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::UnsubscribeThread(m) => {
                put_i64(&mut buf, m.thread_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::PostMessage(m) => {
                put_i64(&mut buf, m.channel_id);
                opt_i64(&mut buf, &m.parent_id)?;
                put_string(&mut buf, &m.content)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::EditMessage(m) => {
                put_i64(&mut buf, m.message_id);
                put_string(&mut buf, &m.content)?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::DeleteMessage(m) => {
                put_i64(&mut buf, m.message_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ListMessages(m) => {
                put_i64(&mut buf, m.channel_id);
                opt_i64(&mut buf, &m.parent_id)?;
                opt_i64(&mut buf, &m.before_id)?;
                opt_i64(&mut buf, &m.after_id)?;
                put_u16(&mut buf, m.limit);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ListThreads(m) => {
                put_i64(&mut buf, m.channel_id);
                opt_i64(&mut buf, &m.before_id)?;
                opt_i64(&mut buf, &m.after_id)?;
                put_u16(&mut buf, m.limit);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::AddSshKey(m) => {
                put_string(&mut buf, &m.public_key)?;
                put_optional(&mut buf, &m.label, |b, v| put_string(b, v))?;
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::ListSshKeys(m) => {
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::DeleteSshKey(m) => {
                put_i64(&mut buf, m.key_id);
                put_subchannel_id(&mut buf, m.subchannel_id)?;
            }
            Self::Ping(m) => {
                put_timestamp_ms(&mut buf, m.timestamp);
            }
        }
        Ok(buf)
    }

    pub fn decode(message_type: u8, payload: Bytes) -> Result<Self, WireError> {
        let mut buf = payload;
        let msg = match message_type {
            SET_NICKNAME => Self::SetNickname(SetNickname {
                nickname: get_string(&mut buf, "nickname")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            AUTH_REQUEST => Self::AuthRequest(AuthRequest {
                nickname: get_string(&mut buf, "nickname")?,
                password: get_string(&mut buf, "password")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            REGISTER_USER => Self::RegisterUser(RegisterUser {
                password: get_string(&mut buf, "password")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LOGOUT => Self::Logout(Logout {
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            CREATE_CHANNEL => Self::CreateChannel(CreateChannel {
                name: get_string(&mut buf, "name")?,
                display_name: get_string(&mut buf, "display_name")?,
                description: get_string(&mut buf, "description")?,
                channel_type: get_u8(&mut buf, "channel_type")?,
                retention_hours: get_i64(&mut buf, "retention_hours")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LIST_CHANNELS => Self::ListChannels(ListChannels {
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            JOIN_CHANNEL => Self::JoinChannel(JoinChannel {
                channel_id: get_i64(&mut buf, "channel_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LEAVE_CHANNEL => Self::LeaveChannel(LeaveChannel {
                channel_id: get_i64(&mut buf, "channel_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            SUBSCRIBE_CHANNEL => Self::SubscribeChannel(SubscribeChannel {
                channel_id: get_i64(&mut buf, "channel_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            UNSUBSCRIBE_CHANNEL => Self::UnsubscribeChannel(UnsubscribeChannel {
                channel_id: get_i64(&mut buf, "channel_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            SUBSCRIBE_THREAD => Self::SubscribeThread(SubscribeThread {
                thread_id: get_i64(&mut buf, "thread_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            UNSUBSCRIBE_THREAD => Self::UnsubscribeThread(UnsubscribeThread {
                thread_id: get_i64(&mut buf, "thread_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            POST_MESSAGE => Self::PostMessage(PostMessage {
                channel_id: get_i64(&mut buf, "channel_id")?,
                parent_id: get_opt_i64(&mut buf, "parent_id")?,
                content: get_string(&mut buf, "content")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            EDIT_MESSAGE => Self::EditMessage(EditMessage {
                message_id: get_i64(&mut buf, "message_id")?,
                content: get_string(&mut buf, "content")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            DELETE_MESSAGE => Self::DeleteMessage(DeleteMessage {
                message_id: get_i64(&mut buf, "message_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LIST_MESSAGES => Self::ListMessages(ListMessages {
                channel_id: get_i64(&mut buf, "channel_id")?,
                parent_id: get_opt_i64(&mut buf, "parent_id")?,
                before_id: get_opt_i64(&mut buf, "before_id")?,
                after_id: get_opt_i64(&mut buf, "after_id")?,
                limit: get_u16(&mut buf, "limit")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LIST_THREADS => Self::ListThreads(ListThreads {
                channel_id: get_i64(&mut buf, "channel_id")?,
                before_id: get_opt_i64(&mut buf, "before_id")?,
                after_id: get_opt_i64(&mut buf, "after_id")?,
                limit: get_u16(&mut buf, "limit")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            ADD_SSH_KEY => Self::AddSshKey(AddSshKey {
                public_key: get_string(&mut buf, "public_key")?,
                label: get_optional(&mut buf, "label", |b| get_string(b, "label"))?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            LIST_SSH_KEYS => Self::ListSshKeys(ListSshKeys {
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            DELETE_SSH_KEY => Self::DeleteSshKey(DeleteSshKey {
                key_id: get_i64(&mut buf, "key_id")?,
                subchannel_id: get_subchannel_id(&mut buf)?,
            }),
            PING => Self::Ping(Ping {
                timestamp: get_timestamp_ms(&mut buf, "timestamp")?,
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

    fn round_trip(msg: ClientMessage) {
        let encoded = msg.encode().unwrap().freeze();
        let decoded = ClientMessage::decode(msg.message_type(), encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn post_message_round_trips() {
        round_trip(ClientMessage::PostMessage(PostMessage {
            channel_id: 7,
            parent_id: Some(42),
            content: "hi".into(),
            subchannel_id: None,
        }));
    }

    #[test]
    fn set_nickname_round_trips() {
        round_trip(ClientMessage::SetNickname(SetNickname {
            nickname: "alice".into(),
            subchannel_id: None,
        }));
    }

    #[test]
    fn list_messages_with_all_optionals_round_trips() {
        round_trip(ClientMessage::ListMessages(ListMessages {
            channel_id: 1,
            parent_id: None,
            before_id: Some(10),
            after_id: None,
            limit: 50,
            subchannel_id: Some(9),
        }));
    }

    #[test]
    fn truncated_payload_errors() {
        let msg = ClientMessage::DeleteMessage(DeleteMessage {
            message_id: 1,
            subchannel_id: None,
        });
        let mut encoded = msg.encode().unwrap();
        encoded.truncate(encoded.len() - 1);
        assert!(ClientMessage::decode(msg.message_type(), encoded.freeze()).is_err());
    }

    #[test]
    fn unknown_type_errors() {
        assert!(matches!(
            ClientMessage::decode(0x7F, Bytes::new()),
            Err(WireError::UnknownMessageType(0x7F))
        ));
    }
}
