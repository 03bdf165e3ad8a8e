//! Binary wire framing and message codec for SuperChat transports.
//!
//! Frame layout: `[length:u32][version:u8][type:u8][flags:u8][payload]`, big
//! endian, capped at [`MAX_FRAME_SIZE`]. [`frame::Frame`] owns the header;
//! [`ClientMessage`]/[`ServerMessage`] own the typed payload for each of the
//! request and response/broadcast codes.

pub mod error;
pub mod error_code;
pub mod frame;
pub mod messages;
pub mod primitive;

pub use error::WireError;
pub use error_code::ErrorCode;
pub use frame::{Frame, MAX_FRAME_SIZE, PROTOCOL_VERSION};
pub use messages::{ClientMessage, ServerMessage};

#[cfg(test)]
mod integration_tests {
    use bytes::BytesMut;

    use super::*;
    use crate::messages::{Ping, Pong};

    #[test]
    fn client_message_survives_a_full_frame_round_trip() {
        let msg = ClientMessage::Ping(Ping { timestamp: 12345 });
        let payload = msg.encode().unwrap().freeze();
        let frame = Frame::new(msg.message_type(), payload);
        let mut encoded = frame.encode();
        let parsed = Frame::try_parse(&mut encoded).unwrap().unwrap();
        let decoded = ClientMessage::decode(parsed.message_type, parsed.payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn server_message_survives_a_full_frame_round_trip() {
        let msg = ServerMessage::Pong(Pong { timestamp: 99 });
        let payload = msg.encode().unwrap().freeze();
        let frame = Frame::new(msg.message_type(), payload);
        let mut encoded = frame.encode();
        let parsed = Frame::try_parse(&mut encoded).unwrap().unwrap();
        let decoded = ServerMessage::decode(parsed.message_type, parsed.payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn frame_exceeding_one_mebibyte_is_rejected_before_reading_payload() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&(MAX_FRAME_SIZE + 100).to_be_bytes());
        assert!(Frame::try_parse(&mut buf).is_err());
    }
}
