//! The numeric error taxonomy carried inside `ERROR` frame payloads.
//! Grouped by leading digit: 1xxx protocol, 2xxx auth, 3xxx authorization,
//! 4xxx not-found, 5xxx rate-limit, 6xxx validation, 9xxx internal.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    InvalidFormat = 1001,
    UnsupportedVersion = 1002,
    OversizedPayload = 1003,
    InvalidFrameLength = 1004,

    NicknameRegistered = 2001,
    InvalidPassword = 2002,
    TooManyAttempts = 2003,

    /// Edit/delete of a non-owned message, channel creation by an anonymous
    /// session, or a moderator-only action attempted without the flag.
    /// Deliberately undifferentiated: "return 3000 without revealing
    /// whether the message exists separately from authorization".
    Forbidden = 3000,

    ChannelNotFound = 4001,
    MessageNotFound = 4002,
    UserNotFound = 4003,
    SshKeyNotFound = 4004,

    MessageRateLimit = 5001,
    ChannelCreateRateLimit = 5002,

    InvalidNickname = 6001,
    InvalidMessageLength = 6002,
    InvalidChannelName = 6003,
    InvalidChannelType = 6004,

    StorageFailure = 9001,
    InvariantViolation = 9002,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1001 => Self::InvalidFormat,
            1002 => Self::UnsupportedVersion,
            1003 => Self::OversizedPayload,
            1004 => Self::InvalidFrameLength,
            2001 => Self::NicknameRegistered,
            2002 => Self::InvalidPassword,
            2003 => Self::TooManyAttempts,
            3000 => Self::Forbidden,
            4001 => Self::ChannelNotFound,
            4002 => Self::MessageNotFound,
            4003 => Self::UserNotFound,
            4004 => Self::SshKeyNotFound,
            5001 => Self::MessageRateLimit,
            5002 => Self::ChannelCreateRateLimit,
            6001 => Self::InvalidNickname,
            6002 => Self::InvalidMessageLength,
            6003 => Self::InvalidChannelName,
            6004 => Self::InvalidChannelType,
            9001 => Self::StorageFailure,
            9002 => Self::InvariantViolation,
            _ => return None,
        })
    }

    /// Protocol-framing errors close the session; everything else
    /// replies with an `ERROR` frame and leaves the session open.
    pub fn closes_session(self) -> bool {
        matches!(
            self,
            Self::InvalidFormat
                | Self::UnsupportedVersion
                | Self::OversizedPayload
                | Self::InvalidFrameLength
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_u16() {
        for code in [
            ErrorCode::InvalidFormat,
            ErrorCode::Forbidden,
            ErrorCode::ChannelCreateRateLimit,
            ErrorCode::InvariantViolation,
        ] {
            assert_eq!(ErrorCode::from_u16(code.as_u16()), Some(code));
        }
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(ErrorCode::from_u16(4242), None);
    }
}
