//! Frame header and on-wire framing: `[length:u32][version:u8][type:u8][flags:u8][payload]`,
//! big-endian throughout. `length` counts everything after itself, so the
//! minimum valid frame is `length = 3` (header only, empty payload).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::WireError;

pub const PROTOCOL_VERSION: u8 = 1;

/// Header fields after `length`, always 3 bytes.
const HEADER_TAIL_LEN: usize = 3;

/// Hard cap on a full frame (header + payload), 1 MiB. Checked against the
/// declared `length` before any payload bytes are read, so an attacker
/// cannot force an allocation proportional to a bogus declared size.
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

pub const FLAG_COMPRESSED: u8 = 0x01;
pub const FLAG_ENCRYPTED: u8 = 0x02;

/// A decoded frame: the recognized header fields plus the raw payload bytes.
/// Message-level decoding of `payload` happens one layer up, in
/// [`crate::messages`].
#[derive(Debug, Clone)]
pub struct Frame {
    pub version: u8,
    pub message_type: u8,
    pub flags: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(message_type: u8, payload: Bytes) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type,
            flags: 0,
            payload,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.flags & FLAG_COMPRESSED != 0
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Total on-wire length, including the 4-byte length field itself.
    pub fn encoded_len(&self) -> usize {
        4 + HEADER_TAIL_LEN + self.payload.len()
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        let length = (HEADER_TAIL_LEN + self.payload.len()) as u32;
        buf.put_u32(length);
        buf.put_u8(self.version);
        buf.put_u8(self.message_type);
        buf.put_u8(self.flags);
        buf.put_slice(&self.payload);
        buf
    }

    /// Parses a complete frame (length field plus everything it counts) from
    /// `buf`, consuming exactly that many bytes on success. Returns
    /// `Ok(None)` if `buf` does not yet hold a full frame.
    pub fn try_parse(buf: &mut BytesMut) -> Result<Option<Frame>, WireError> {
        if buf.len() < 4 {
            return Ok(None);
        }
        let length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if (length as usize) < HEADER_TAIL_LEN {
            return Err(WireError::FrameTooShort(length));
        }
        let total = 4 + length as usize;
        if total > MAX_FRAME_SIZE as usize {
            return Err(WireError::FrameTooLarge {
                length,
                max: MAX_FRAME_SIZE,
            });
        }
        if buf.len() < total {
            return Ok(None);
        }
        let mut frame_buf = buf.split_to(total);
        frame_buf.advance(4);
        let version = frame_buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let message_type = frame_buf.get_u8();
        let flags = frame_buf.get_u8();
        Ok(Some(Frame {
            version,
            message_type,
            flags,
            payload: frame_buf.freeze(),
        }))
    }

    /// Reads exactly one frame off an async byte stream, used by transports
    /// that hand the session layer a plain duplex (TCP, SSH channel data).
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, WireError> {
        let mut header = [0u8; 4];
        reader.read_exact(&mut header).await?;
        let length = u32::from_be_bytes(header);
        if (length as usize) < HEADER_TAIL_LEN {
            return Err(WireError::FrameTooShort(length));
        }
        if 4u64 + length as u64 > MAX_FRAME_SIZE as u64 {
            return Err(WireError::FrameTooLarge {
                length,
                max: MAX_FRAME_SIZE,
            });
        }
        let mut tail = vec![0u8; length as usize];
        reader.read_exact(&mut tail).await?;
        let mut tail = Bytes::from(tail);
        let version = tail.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }
        let message_type = tail.get_u8();
        let flags = tail.get_u8();
        Ok(Frame {
            version,
            message_type,
            flags,
            payload: tail,
        })
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<(), WireError> {
        let encoded = self.encode();
        writer.write_all(&encoded).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_only_frame_round_trips() {
        let frame = Frame::new(0x15, Bytes::new());
        let mut encoded = frame.encode();
        let parsed = Frame::try_parse(&mut encoded).unwrap().unwrap();
        assert_eq!(parsed.message_type, 0x15);
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn payload_round_trips() {
        let payload = Bytes::from_static(b"hello world");
        let frame = Frame::new(0x0D, payload.clone());
        let mut encoded = frame.encode();
        let parsed = Frame::try_parse(&mut encoded).unwrap().unwrap();
        assert_eq!(parsed.payload, payload);
    }

    #[test]
    fn incomplete_frame_returns_none_not_error() {
        let frame = Frame::new(0x0D, Bytes::from_static(b"hello world"));
        let mut encoded = frame.encode();
        encoded.truncate(encoded.len() - 1);
        assert!(Frame::try_parse(&mut encoded).unwrap().is_none());
    }

    #[test]
    fn length_of_two_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(2);
        buf.put_slice(&[0, 0]);
        assert!(matches!(
            Frame::try_parse(&mut buf),
            Err(WireError::FrameTooShort(2))
        ));
    }

    #[test]
    fn length_of_three_with_no_payload_is_valid() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(0x01);
        buf.put_u8(0);
        let parsed = Frame::try_parse(&mut buf).unwrap().unwrap();
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn oversized_length_rejected_without_waiting_for_payload() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_FRAME_SIZE + 1);
        assert!(matches!(
            Frame::try_parse(&mut buf),
            Err(WireError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.put_u8(7);
        buf.put_u8(0x01);
        buf.put_u8(0);
        assert!(matches!(
            Frame::try_parse(&mut buf),
            Err(WireError::UnsupportedVersion(7))
        ));
    }

    #[tokio::test]
    async fn read_from_matches_try_parse() {
        let frame = Frame::new(0x80, Bytes::from_static(b"config"));
        let encoded = frame.encode();
        let mut cursor = std::io::Cursor::new(encoded.to_vec());
        let parsed = Frame::read_from(&mut cursor).await.unwrap();
        assert_eq!(parsed.message_type, 0x80);
        assert_eq!(parsed.payload, Bytes::from_static(b"config"));
    }
}
