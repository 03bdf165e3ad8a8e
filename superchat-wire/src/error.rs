use crate::error_code::ErrorCode;

/// Failures that can occur while framing or decoding a message. Distinct from
/// [`crate::ErrorCode`], which is the numeric taxonomy carried *inside* an
/// `ERROR` frame payload back to a client.
#[derive(thiserror::Error, Debug)]
pub enum WireError {
    #[error("frame length {0} is below the minimum header size of 3")]
    FrameTooShort(u32),
    #[error("frame length {length} exceeds the maximum of {max} bytes")]
    FrameTooLarge { length: u32, max: u32 },
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("unknown message type {0:#04x}")]
    UnknownMessageType(u8),
    #[error("unexpected end of payload while decoding {field}")]
    Truncated { field: &'static str },
    #[error("string field {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("{field} value {value} is out of the allowed range")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("payload has {0} trailing byte(s) after the last recognized field")]
    TrailingBytes(usize),
    #[error("I/O error while framing: {0}")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// All wire-level decode failures are protocol-framing errors and
    /// close the session; only `Io` has no single taxonomy code since it
    /// means the transport itself is gone.
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::FrameTooShort(_) => ErrorCode::InvalidFrameLength,
            Self::FrameTooLarge { .. } => ErrorCode::OversizedPayload,
            Self::UnsupportedVersion(_) => ErrorCode::UnsupportedVersion,
            Self::UnknownMessageType(_)
            | Self::Truncated { .. }
            | Self::InvalidUtf8 { .. }
            | Self::OutOfRange { .. }
            | Self::TrailingBytes(_) => ErrorCode::InvalidFormat,
            Self::Io(_) => ErrorCode::InvalidFormat,
        }
    }
}
