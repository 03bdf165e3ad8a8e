#[derive(thiserror::Error, Debug)]
pub enum SuperchatError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("channel {0} not found")]
    ChannelNotFound(i64),
    #[error("message {0} not found")]
    MessageNotFound(i64),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("SSH key {0} not found")]
    SshKeyNotFound(i64),
    #[error("deserialization failed: {0}")]
    DeserializeJson(#[from] serde_json::Error),
    #[error("inconsistent state")]
    InconsistentState,
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}
