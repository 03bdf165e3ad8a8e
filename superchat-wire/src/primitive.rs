//! Primitive encodings shared by every message type: fixed-width big-endian
//! integers, a length-prefixed UTF-8 string, `optional T`, and a millisecond
//! Unix timestamp. Every decode helper bounds its read by the bytes actually
//! remaining in `buf` before trusting a declared length, so a truncated
//! payload returns [`WireError`] rather than panicking or over-reading.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::WireError;

pub const MAX_STRING_LEN: usize = u16::MAX as usize;

pub fn put_u8(buf: &mut BytesMut, v: u8) {
    buf.put_u8(v);
}

pub fn put_u16(buf: &mut BytesMut, v: u16) {
    buf.put_u16(v);
}

pub fn put_u32(buf: &mut BytesMut, v: u32) {
    buf.put_u32(v);
}

pub fn put_u64(buf: &mut BytesMut, v: u64) {
    buf.put_u64(v);
}

pub fn put_i64(buf: &mut BytesMut, v: i64) {
    buf.put_i64(v);
}

pub fn put_bool(buf: &mut BytesMut, v: bool) {
    buf.put_u8(u8::from(v));
}

pub fn put_timestamp_ms(buf: &mut BytesMut, v: i64) {
    buf.put_i64(v);
}

pub fn put_string(buf: &mut BytesMut, s: &str) -> Result<(), WireError> {
    if s.len() > MAX_STRING_LEN {
        return Err(WireError::OutOfRange {
            field: "string length",
            value: s.len() as i64,
        });
    }
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

pub fn put_optional<T>(
    buf: &mut BytesMut,
    value: &Option<T>,
    write: impl FnOnce(&mut BytesMut, &T) -> Result<(), WireError>,
) -> Result<(), WireError> {
    match value {
        Some(v) => {
            put_bool(buf, true);
            write(buf, v)
        }
        None => {
            put_bool(buf, false);
            Ok(())
        }
    }
}

fn need(buf: &Bytes, n: usize, field: &'static str) -> Result<(), WireError> {
    if buf.remaining() < n {
        Err(WireError::Truncated { field })
    } else {
        Ok(())
    }
}

pub fn get_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, WireError> {
    need(buf, 1, field)?;
    Ok(buf.get_u8())
}

pub fn get_u16(buf: &mut Bytes, field: &'static str) -> Result<u16, WireError> {
    need(buf, 2, field)?;
    Ok(buf.get_u16())
}

pub fn get_u32(buf: &mut Bytes, field: &'static str) -> Result<u32, WireError> {
    need(buf, 4, field)?;
    Ok(buf.get_u32())
}

pub fn get_u64(buf: &mut Bytes, field: &'static str) -> Result<u64, WireError> {
    need(buf, 8, field)?;
    Ok(buf.get_u64())
}

pub fn get_i64(buf: &mut Bytes, field: &'static str) -> Result<i64, WireError> {
    need(buf, 8, field)?;
    Ok(buf.get_i64())
}

pub fn get_bool(buf: &mut Bytes, field: &'static str) -> Result<bool, WireError> {
    Ok(get_u8(buf, field)? != 0)
}

pub fn get_timestamp_ms(buf: &mut Bytes, field: &'static str) -> Result<i64, WireError> {
    get_i64(buf, field)
}

pub fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String, WireError> {
    let len = get_u16(buf, field)? as usize;
    need(buf, len, field)?;
    let bytes = buf.copy_to_bytes(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8 { field })
}

pub fn get_optional<T>(
    buf: &mut Bytes,
    field: &'static str,
    read: impl FnOnce(&mut Bytes) -> Result<T, WireError>,
) -> Result<Option<T>, WireError> {
    if get_bool(buf, field)? {
        Ok(Some(read(buf)?))
    } else {
        Ok(None)
    }
}

/// `subchannel_id` is reserved for a future hierarchical-channel feature.
/// Every message carries it; the server always encodes `None` and
/// ignores any value a client sends.
pub fn put_subchannel_id(buf: &mut BytesMut, v: Option<u32>) -> Result<(), WireError> {
    put_optional(buf, &v, |b, x| {
        put_u32(b, *x);
        Ok(())
    })
}

pub fn get_subchannel_id(buf: &mut Bytes) -> Result<Option<u32>, WireError> {
    get_optional(buf, "subchannel_id", |b| get_u32(b, "subchannel_id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trips() {
        let mut buf = BytesMut::new();
        put_string(&mut buf, "hello").unwrap();
        let mut bytes = buf.freeze();
        assert_eq!(get_string(&mut bytes, "s").unwrap(), "hello");
    }

    #[test]
    fn optional_absent_consumes_no_value_bytes() {
        let mut buf = BytesMut::new();
        put_optional::<u32>(&mut buf, &None, |b, v| {
            put_u32(b, *v);
            Ok(())
        })
        .unwrap();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn truncated_string_errors_not_panics() {
        let mut buf = BytesMut::new();
        buf.put_u16(10);
        buf.put_slice(b"short");
        let mut bytes = buf.freeze();
        assert!(matches!(
            get_string(&mut bytes, "s"),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn truncated_u32_errors_not_panics() {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        let mut bytes = buf.freeze();
        assert!(matches!(
            get_u32(&mut bytes, "x"),
            Err(WireError::Truncated { .. })
        ));
    }
}
