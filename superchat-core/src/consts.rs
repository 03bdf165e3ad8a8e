//! Tunable defaults. Each is overridable from `superchat.toml`; the values
//! here are what an empty config resolves to.

/// Outbound frames buffered per session before broadcast enqueue starts
/// dropping.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 128;

/// Floor a configured queue capacity is still allowed to shrink to.
pub const MIN_OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// How long a direct (non-broadcast) response may block waiting for queue
/// space before the session is considered unresponsive.
pub const DIRECT_ENQUEUE_TIMEOUT_SECS: u64 = 5;

/// Per-session channel subscription ceiling.
pub const MAX_CHANNEL_SUBSCRIPTIONS: usize = 20;

/// Per-session thread subscription ceiling.
pub const MAX_THREAD_SUBSCRIPTIONS: usize = 50;

/// Posts allowed per session in the trailing window below.
pub const DEFAULT_MESSAGE_RATE_LIMIT: u32 = 10;
pub const DEFAULT_MESSAGE_RATE_WINDOW_SECS: u64 = 10;

/// Channels a single registered user may create per hour.
pub const DEFAULT_CHANNEL_CREATE_RATE_LIMIT: u32 = 5;
pub const DEFAULT_CHANNEL_CREATE_RATE_WINDOW_SECS: u64 = 3600;

/// Idle connection timeout: no frames (including PING) in this long closes
/// the session.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 60;

/// How often the server sends an unsolicited PING on an otherwise idle
/// session, well inside `DEFAULT_SESSION_TIMEOUT_SECS`.
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Failed-login exponential backoff ladder: no delay for the first two
/// failures, then these delays for failures 3..6, then termination.
pub const AUTH_FAILURE_BACKOFF_SECS: [u64; 4] = [1, 2, 4, 8];

/// Failures after which the session is forcibly closed rather than merely
/// delayed.
pub const AUTH_FAILURE_TERMINATE_AT: u32 = 5;

/// Client init state machine deadline poll: starts at this interval.
pub const INIT_BACKOFF_START_MS: u64 = 5;

/// ...doubling each retry up to this cap.
pub const INIT_BACKOFF_MAX_MS: u64 = 200;

/// ...until this overall deadline elapses without reaching `Ready`.
pub const INIT_DEFAULT_DEADLINE_SECS: u64 = 5;

/// Retention sweep cadence.
pub const RETENTION_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Rows deleted per retention sweep batch, to avoid one long-held write lock.
pub const RETENTION_SWEEP_BATCH_SIZE: u64 = 1000;

/// Per-IP connection ceiling default.
pub const DEFAULT_MAX_CONNECTIONS_PER_IP: u32 = 10;

/// Validation bounds shared by every transport.
pub const MAX_MESSAGE_LENGTH: usize = 4096;
pub const MIN_NICKNAME_LENGTH: usize = 3;
pub const MAX_NICKNAME_LENGTH: usize = 20;
pub const MAX_CHANNEL_NAME_LENGTH: usize = 64;
