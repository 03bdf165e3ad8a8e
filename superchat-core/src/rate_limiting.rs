//! Rate limiting: per-session message rate and per-user channel-create rate,
//! both `governor`-keyed limiters. This crate only ever needs to throttle
//! discrete *actions* (posts, channel creates), so a bare keyed limiter per
//! action is enough — no byte-rate stream throttling required.

use std::num::NonZeroU32;

use governor::{Quota, RateLimiter};
use superchat_common::{SessionId, UserId};

use crate::consts::{
    DEFAULT_CHANNEL_CREATE_RATE_LIMIT, DEFAULT_CHANNEL_CREATE_RATE_WINDOW_SECS,
    DEFAULT_MESSAGE_RATE_LIMIT, DEFAULT_MESSAGE_RATE_WINDOW_SECS,
};

type KeyedLimiter<K> = RateLimiter<
    K,
    governor::state::keyed::DefaultKeyedStateStore<K>,
    governor::clock::DefaultClock,
>;

fn quota_per_window(count: u32, window_secs: u64) -> Quota {
    #[allow(clippy::unwrap_used)] // fixed, non-zero defaults
    let count = NonZeroU32::new(count.max(1)).unwrap();
    Quota::with_period(std::time::Duration::from_secs(window_secs.max(1)))
        .unwrap()
        .allow_burst(count)
}

/// One rate limiter per concern, each keyed by the entity the limit applies
/// to, rather than a single shared bucket.
pub struct RateLimiters {
    messages: KeyedLimiter<SessionId>,
    channel_creates: KeyedLimiter<UserId>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::with_quotas(
            quota_per_window(DEFAULT_MESSAGE_RATE_LIMIT, DEFAULT_MESSAGE_RATE_WINDOW_SECS),
            quota_per_window(
                DEFAULT_CHANNEL_CREATE_RATE_LIMIT,
                DEFAULT_CHANNEL_CREATE_RATE_WINDOW_SECS,
            ),
        )
    }

    pub fn with_quotas(message_quota: Quota, channel_create_quota: Quota) -> Self {
        Self {
            messages: RateLimiter::keyed(message_quota),
            channel_creates: RateLimiter::keyed(channel_create_quota),
        }
    }

    pub fn check_message(&self, session_id: SessionId) -> bool {
        self.messages.check_key(&session_id).is_ok()
    }

    pub fn check_channel_create(&self, user_id: UserId) -> bool {
        self.channel_creates.check_key(&user_id).is_ok()
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_rate_limit_trips_after_burst_is_exhausted() {
        let limiters = RateLimiters::with_quotas(
            quota_per_window(2, 60),
            quota_per_window(DEFAULT_CHANNEL_CREATE_RATE_LIMIT, 3600),
        );
        let session = SessionId::new_v4();
        assert!(limiters.check_message(session));
        assert!(limiters.check_message(session));
        assert!(!limiters.check_message(session));
    }

    #[test]
    fn rate_limits_are_independent_per_key() {
        let limiters = RateLimiters::with_quotas(quota_per_window(1, 60), quota_per_window(5, 3600));
        let a = SessionId::new_v4();
        let b = SessionId::new_v4();
        assert!(limiters.check_message(a));
        assert!(limiters.check_message(b));
        assert!(!limiters.check_message(a));
    }
}
