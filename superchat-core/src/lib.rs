pub mod auth;
pub mod connections;
pub mod consts;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod init_state;
pub mod rate_limiting;
pub mod services;
pub mod session;
pub mod storage;
pub mod subscriptions;

pub use connections::ConnectionLimiter;
pub use dispatch::{ssh_key_fingerprint, Dispatcher};
pub use error::CoreError;
pub use services::Services;
pub use session::Session;
pub use storage::Storage;
pub use subscriptions::SubscriptionRegistry;
