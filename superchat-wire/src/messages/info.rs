//! Structs embedded inside several request/response payloads: a channel's
//! public metadata, a posted message's full wire representation, and a bound
//! SSH key's metadata.

use bytes::{Bytes, BytesMut};

use crate::error::WireError;
use crate::primitive::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel_id: i64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// `0 = chat`, `1 = forum`.
    pub channel_type: u8,
    pub retention_hours: i64,
    pub created_by: i64,
    pub created_at: i64,
}

impl ChannelInfo {
    pub fn encode_to(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_i64(buf, self.channel_id);
        put_string(buf, &self.name)?;
        put_string(buf, &self.display_name)?;
        put_string(buf, &self.description)?;
        put_u8(buf, self.channel_type);
        put_i64(buf, self.retention_hours);
        put_i64(buf, self.created_by);
        put_timestamp_ms(buf, self.created_at);
        Ok(())
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            channel_id: get_i64(buf, "channel_id")?,
            name: get_string(buf, "name")?,
            display_name: get_string(buf, "display_name")?,
            description: get_string(buf, "description")?,
            channel_type: get_u8(buf, "channel_type")?,
            retention_hours: get_i64(buf, "retention_hours")?,
            created_by: get_i64(buf, "created_by")?,
            created_at: get_timestamp_ms(buf, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub message_id: i64,
    pub channel_id: i64,
    pub parent_id: Option<i64>,
    pub author_user_id: Option<i64>,
    pub author_nickname: String,
    pub content: String,
    pub created_at: i64,
    pub edited_at: Option<i64>,
    pub deleted_at: Option<i64>,
    pub thread_depth: u32,
    pub reply_count: u64,
}

impl MessageInfo {
    pub fn encode_to(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_i64(buf, self.message_id);
        put_i64(buf, self.channel_id);
        put_optional(buf, &self.parent_id, |b, v| {
            put_i64(b, *v);
            Ok(())
        })?;
        put_optional(buf, &self.author_user_id, |b, v| {
            put_i64(b, *v);
            Ok(())
        })?;
        put_string(buf, &self.author_nickname)?;
        put_string(buf, &self.content)?;
        put_timestamp_ms(buf, self.created_at);
        put_optional(buf, &self.edited_at, |b, v| {
            put_timestamp_ms(b, *v);
            Ok(())
        })?;
        put_optional(buf, &self.deleted_at, |b, v| {
            put_timestamp_ms(b, *v);
            Ok(())
        })?;
        put_u32(buf, self.thread_depth);
        put_u64(buf, self.reply_count);
        Ok(())
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            message_id: get_i64(buf, "message_id")?,
            channel_id: get_i64(buf, "channel_id")?,
            parent_id: get_optional(buf, "parent_id", |b| get_i64(b, "parent_id"))?,
            author_user_id: get_optional(buf, "author_user_id", |b| get_i64(b, "author_user_id"))?,
            author_nickname: get_string(buf, "author_nickname")?,
            content: get_string(buf, "content")?,
            created_at: get_timestamp_ms(buf, "created_at")?,
            edited_at: get_optional(buf, "edited_at", |b| get_timestamp_ms(b, "edited_at"))?,
            deleted_at: get_optional(buf, "deleted_at", |b| get_timestamp_ms(b, "deleted_at"))?,
            thread_depth: get_u32(buf, "thread_depth")?,
            reply_count: get_u64(buf, "reply_count")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyInfo {
    pub key_id: i64,
    pub fingerprint: String,
    pub key_type: String,
    pub label: Option<String>,
    pub added_at: i64,
    pub last_used_at: Option<i64>,
}

impl SshKeyInfo {
    pub fn encode_to(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_i64(buf, self.key_id);
        put_string(buf, &self.fingerprint)?;
        put_string(buf, &self.key_type)?;
        put_optional(buf, &self.label, |b, v| put_string(b, v))?;
        put_timestamp_ms(buf, self.added_at);
        put_optional(buf, &self.last_used_at, |b, v| {
            put_timestamp_ms(b, *v);
            Ok(())
        })?;
        Ok(())
    }

    pub fn decode(buf: &mut Bytes) -> Result<Self, WireError> {
        Ok(Self {
            key_id: get_i64(buf, "key_id")?,
            fingerprint: get_string(buf, "fingerprint")?,
            key_type: get_string(buf, "key_type")?,
            label: get_optional(buf, "label", |b| get_string(b, "label"))?,
            added_at: get_timestamp_ms(buf, "added_at")?,
            last_used_at: get_optional(buf, "last_used_at", |b| {
                get_timestamp_ms(b, "last_used_at")
            })?,
        })
    }
}
