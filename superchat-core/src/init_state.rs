//! Client initialization state machine. Nominally client-side, but
//! implemented here as a reusable type because the SSH transport adapter is
//! the one place the server itself observably drives a session through
//! `AwaitingAuth` before the dispatcher will accept ordinary requests.

use std::time::Duration;

use crate::consts::{INIT_BACKOFF_MAX_MS, INIT_BACKOFF_START_MS, INIT_DEFAULT_DEADLINE_SECS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Connecting,
    AwaitingAuth,
    NeedsNickname,
    Ready,
}

impl InitState {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Polls a deadline with exponentially increasing backoff, doubling from
/// [`INIT_BACKOFF_START_MS`] up to a cap of [`INIT_BACKOFF_MAX_MS`], used by
/// a transport adapter waiting for a session to leave `Connecting`.
pub struct BackoffPoll {
    next_delay: Duration,
    max_delay: Duration,
    deadline: tokio::time::Instant,
}

impl BackoffPoll {
    pub fn new() -> Self {
        Self::with_deadline(Duration::from_secs(INIT_DEFAULT_DEADLINE_SECS))
    }

    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            next_delay: Duration::from_millis(INIT_BACKOFF_START_MS),
            max_delay: Duration::from_millis(INIT_BACKOFF_MAX_MS),
            deadline: tokio::time::Instant::now() + deadline,
        }
    }

    pub fn deadline_passed(&self) -> bool {
        tokio::time::Instant::now() >= self.deadline
    }

    /// Sleeps for the current backoff interval, then doubles it (capped).
    /// Returns `false` once the deadline has already elapsed, so the caller
    /// knows not to try again.
    pub async fn wait(&mut self) -> bool {
        if self.deadline_passed() {
            return false;
        }
        tokio::time::sleep(self.next_delay).await;
        self.next_delay = (self.next_delay * 2).min(self.max_delay);
        !self.deadline_passed()
    }
}

impl Default for BackoffPoll {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `is_ready` until it returns true or the deadline elapses.
pub async fn wait_until_ready(mut is_ready: impl FnMut() -> bool) -> bool {
    if is_ready() {
        return true;
    }
    let mut backoff = BackoffPoll::new();
    loop {
        if !backoff.wait().await {
            return is_ready();
        }
        if is_ready() {
            return true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles_until_cap() {
        let mut poll = BackoffPoll::with_deadline(Duration::from_secs(1));
        assert_eq!(poll.next_delay, Duration::from_millis(5));
        assert!(poll.wait().await);
        assert_eq!(poll.next_delay, Duration::from_millis(10));
        for _ in 0..10 {
            poll.wait().await;
        }
        assert_eq!(poll.next_delay, Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_ready_observes_a_flag_flipped_concurrently() {
        let ready = Arc::new(AtomicU32::new(0));
        let ready2 = ready.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            ready2.store(1, Ordering::SeqCst);
        });
        assert!(wait_until_ready(|| ready.load(Ordering::SeqCst) == 1).await);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_ready_gives_up_past_the_deadline() {
        assert!(!wait_until_ready(|| false).await);
    }
}
