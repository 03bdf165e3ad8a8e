//! Per-IP connection accounting (`max_connections_per_ip`), shared by
//! every transport adapter through [`crate::Services`]. Kept as a plain
//! `std::sync::Mutex`-guarded map rather than the `tokio::sync`-based
//! per-entry locking in [`crate::subscriptions`]: every operation here is a
//! single hashmap lookup-and-increment, never held across an `.await`, so a
//! blocking mutex is the right tool and avoids an async lock for work that's
//! never actually concurrent with itself for long.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    counts: Mutex<HashMap<IpAddr, u32>>,
}

/// Tracks live connection counts per source IP and refuses new ones past the
/// configured ceiling. Transport adapters call [`ConnectionLimiter::acquire`]
/// right after `accept()`; the returned [`ConnectionGuard`] decrements the
/// count when the connection's task ends (normally by being dropped, even on
/// panic-unwind).
#[derive(Clone, Default)]
pub struct ConnectionLimiter {
    inner: Arc<Inner>,
}

impl ConnectionLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if `ip` is already at `limit` live connections.
    pub fn acquire(&self, ip: IpAddr, limit: u32) -> Option<ConnectionGuard> {
        let mut counts = self.inner.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(ip).or_insert(0);
        if *count >= limit {
            return None;
        }
        *count += 1;
        Some(ConnectionGuard {
            inner: self.inner.clone(),
            ip,
        })
    }

    pub fn count_for(&self, ip: IpAddr) -> u32 {
        self.inner
            .counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&ip)
            .copied()
            .unwrap_or(0)
    }
}

/// RAII handle on one counted connection slot. Dropping it (connection task
/// ending, including on error) releases the slot.
pub struct ConnectionGuard {
    inner: Arc<Inner>,
    ip: IpAddr,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut counts = self.inner.counts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = counts.get_mut(&self.ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&self.ip);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_past_the_configured_limit() {
        let limiter = ConnectionLimiter::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let _a = limiter.acquire(ip, 2).unwrap();
        let _b = limiter.acquire(ip, 2).unwrap();
        assert!(limiter.acquire(ip, 2).is_none());
    }

    #[test]
    fn releasing_a_guard_frees_the_slot() {
        let limiter = ConnectionLimiter::new();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let guard = limiter.acquire(ip, 1).unwrap();
        assert!(limiter.acquire(ip, 1).is_none());
        drop(guard);
        assert!(limiter.acquire(ip, 1).is_some());
    }

    #[test]
    fn different_ips_are_independent() {
        let limiter = ConnectionLimiter::new();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        let _g = limiter.acquire(a, 1).unwrap();
        assert!(limiter.acquire(b, 1).is_some());
    }
}
