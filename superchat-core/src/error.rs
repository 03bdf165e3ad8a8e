use superchat_wire::ErrorCode;

/// Internal error taxonomy for the dispatcher and its subsystems. Kept
/// separate from [`ErrorCode`] (the numeric payload sent over the wire):
/// this enum carries `Debug`-only context for logs, `wire_code` carries
/// only what a client is allowed to learn.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("channel {0} not found")]
    ChannelNotFound(i64),

    #[error("message {0} not found")]
    MessageNotFound(i64),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("nickname {0:?} is already registered")]
    NicknameRegistered(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("too many authentication attempts")]
    TooManyAuthAttempts,

    #[error("not permitted")]
    Forbidden,

    #[error("rate limit exceeded")]
    MessageRateLimited,

    #[error("channel creation rate limit exceeded")]
    ChannelCreateRateLimited,

    #[error("invalid nickname: {0}")]
    InvalidNickname(String),

    #[error("message too long ({0} bytes)")]
    InvalidMessageLength(usize),

    #[error("invalid channel name: {0}")]
    InvalidChannelName(String),

    #[error("invalid channel type")]
    InvalidChannelType,

    #[error("session is not in the right init state for this request")]
    WrongInitState,

    #[error(transparent)]
    Wire(#[from] superchat_wire::WireError),

    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),
}

impl CoreError {
    /// Maps an internal error onto the numeric code a client is allowed to
    /// see. Deliberately collapses distinctions a client must not be able to
    /// probe for (e.g. "message doesn't exist" vs. "not yours").
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            Self::ChannelNotFound(_) => ErrorCode::ChannelNotFound,
            Self::MessageNotFound(_) => ErrorCode::MessageNotFound,
            Self::UserNotFound(_) => ErrorCode::UserNotFound,
            Self::NicknameRegistered(_) => ErrorCode::NicknameRegistered,
            Self::InvalidPassword => ErrorCode::InvalidPassword,
            Self::TooManyAuthAttempts => ErrorCode::TooManyAttempts,
            Self::Forbidden | Self::WrongInitState => ErrorCode::Forbidden,
            Self::MessageRateLimited => ErrorCode::MessageRateLimit,
            Self::ChannelCreateRateLimited => ErrorCode::ChannelCreateRateLimit,
            Self::InvalidNickname(_) => ErrorCode::InvalidNickname,
            Self::InvalidMessageLength(_) => ErrorCode::InvalidMessageLength,
            Self::InvalidChannelName(_) => ErrorCode::InvalidChannelName,
            Self::InvalidChannelType => ErrorCode::InvalidChannelType,
            Self::Database(_) | Self::Invariant(_) => ErrorCode::StorageFailure,
            Self::Wire(e) => e.wire_code(),
        }
    }
}
