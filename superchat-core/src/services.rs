//! Top-level composition root: connect the database, build the shared
//! subsystems, spawn background maintenance, and hand a single cloneable
//! bundle to every transport adapter. Nothing here needs an
//! `Arc<Mutex<_>>` wrapper around the config or db: `Storage` is already a
//! cheap `sea_orm::DatabaseConnection` clone and the registries use
//! per-entry locking internally, so the bundle itself is `Clone` with no
//! outer lock.

use std::sync::Arc;

use governor::Quota;
use superchat_common::Config;
use tracing::{info, warn};

use crate::connections::ConnectionLimiter;
use crate::consts::{DEFAULT_CHANNEL_CREATE_RATE_WINDOW_SECS, DEFAULT_MESSAGE_RATE_WINDOW_SECS};
use crate::db::connect_to_db;
use crate::dispatch::Dispatcher;
use crate::rate_limiting::RateLimiters;
use crate::storage::Storage;
use crate::subscriptions::SubscriptionRegistry;

fn quota_per_window(count: u32, window_secs: u64) -> Quota {
    let count = std::num::NonZeroU32::new(count.max(1)).unwrap_or(std::num::NonZeroU32::MIN);
    Quota::with_period(std::time::Duration::from_secs(window_secs.max(1)))
        .unwrap_or_else(|| Quota::per_second(count))
        .allow_burst(count)
}

/// Everything a transport adapter needs to turn bytes off a socket into
/// dispatched requests: the shared dispatcher (storage + subscriptions +
/// rate limiters) plus the resolved configuration. Cloning is cheap — every
/// field is itself an `Arc` or an internally-cloneable connection pool.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub connections: ConnectionLimiter,
}

impl Services {
    /// Connects to the database, runs migrations, builds the dispatcher, and
    /// spawns the retention sweeper: connect db, build subsystems, spawn
    /// background tasks, return one bundle.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let db = connect_to_db(&config).await?;
        let storage = Storage::new(db);

        let rate_limiters = RateLimiters::with_quotas(
            quota_per_window(
                config.store.server.message_rate_limit,
                DEFAULT_MESSAGE_RATE_WINDOW_SECS,
            ),
            quota_per_window(
                config.store.server.channel_create_rate_per_hour,
                DEFAULT_CHANNEL_CREATE_RATE_WINDOW_SECS,
            ),
        );

        let dispatcher = Arc::new(Dispatcher {
            storage,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
            rate_limiters,
        });

        spawn_retention_sweeper(
            dispatcher.clone(),
            config.store.server.retention_sweep_interval,
        );

        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            connections: ConnectionLimiter::new(),
        })
    }
}

/// Periodically hard-deletes messages past their channel's retention window,
/// batched per tick so one sweep never holds a long write lock. A background
/// `tokio::spawn` + `tokio::time::interval` loop, logging only when there was
/// something to report.
fn spawn_retention_sweeper(dispatcher: Arc<Dispatcher>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match dispatcher.storage.sweep_retention().await {
                Ok(deleted) if deleted > 0 => {
                    info!(deleted, "retention sweep removed expired messages");
                }
                Ok(_) => {}
                Err(err) => warn!(%err, "retention sweep failed"),
            }
        }
    });
}
