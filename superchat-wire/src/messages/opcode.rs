//! Wire type codes. Requests occupy `0x01..=0x7F`; responses and broadcasts
//! occupy `0x80..=0xFF`.

pub mod request {
    pub const SET_NICKNAME: u8 = 0x01;
    pub const AUTH_REQUEST: u8 = 0x02;
    pub const REGISTER_USER: u8 = 0x03;
    pub const LOGOUT: u8 = 0x04;
    pub const CREATE_CHANNEL: u8 = 0x05;
    pub const LIST_CHANNELS: u8 = 0x06;
    pub const JOIN_CHANNEL: u8 = 0x07;
    pub const LEAVE_CHANNEL: u8 = 0x08;
    pub const SUBSCRIBE_CHANNEL: u8 = 0x09;
    pub const UNSUBSCRIBE_CHANNEL: u8 = 0x0A;
    pub const SUBSCRIBE_THREAD: u8 = 0x0B;
    pub const UNSUBSCRIBE_THREAD: u8 = 0x0C;
    pub const POST_MESSAGE: u8 = 0x0D;
    pub const EDIT_MESSAGE: u8 = 0x0E;
    pub const DELETE_MESSAGE: u8 = 0x0F;
    pub const LIST_MESSAGES: u8 = 0x10;
    pub const LIST_THREADS: u8 = 0x11;
    pub const ADD_SSH_KEY: u8 = 0x12;
    pub const LIST_SSH_KEYS: u8 = 0x13;
    pub const DELETE_SSH_KEY: u8 = 0x14;
    pub const PING: u8 = 0x15;
}

pub mod response {
    pub const SERVER_CONFIG: u8 = 0x80;
    pub const NICKNAME_RESPONSE: u8 = 0x81;
    pub const AUTH_RESPONSE: u8 = 0x82;
    pub const REGISTER_RESPONSE: u8 = 0x83;
    pub const LOGOUT_RESPONSE: u8 = 0x84;
    pub const CHANNEL_LIST_RESPONSE: u8 = 0x85;
    pub const CHANNEL_CREATED: u8 = 0x86;
    pub const JOIN_RESPONSE: u8 = 0x87;
    pub const LEAVE_RESPONSE: u8 = 0x88;
    pub const SUBSCRIBE_RESPONSE: u8 = 0x89;
    pub const UNSUBSCRIBE_RESPONSE: u8 = 0x8A;
    pub const THREAD_SUBSCRIBE_RESPONSE: u8 = 0x8B;
    pub const THREAD_UNSUBSCRIBE_RESPONSE: u8 = 0x8C;
    pub const MESSAGE_POSTED: u8 = 0x8D;
    pub const NEW_MESSAGE: u8 = 0x8E;
    pub const MESSAGE_EDITED: u8 = 0x8F;
    pub const MESSAGE_DELETED: u8 = 0x90;
    pub const MESSAGE_LIST_RESPONSE: u8 = 0x91;
    pub const THREAD_LIST_RESPONSE: u8 = 0x92;
    pub const SSH_KEY_ADDED: u8 = 0x93;
    pub const SSH_KEY_LIST_RESPONSE: u8 = 0x94;
    pub const SSH_KEY_DELETED: u8 = 0x95;
    pub const PONG: u8 = 0x96;
    pub const ERROR: u8 = 0x97;
}
