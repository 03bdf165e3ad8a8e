//! Subscription/broadcast fabric: one sharded map per channel and one per
//! thread, so a broadcast to channel A never contends with a subscribe to
//! channel B. Each entry's own lock is held only for the duration of its
//! own fan-out or membership mutation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use superchat_common::{ChannelId, MessageId, SessionId};
use superchat_wire::ServerMessage;
use tokio::sync::RwLock;

use crate::consts::{MAX_CHANNEL_SUBSCRIPTIONS, MAX_THREAD_SUBSCRIPTIONS};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeError {
    TooManyChannelSubscriptions,
    TooManyThreadSubscriptions,
}

/// One entry's membership, guarded by its own lock.
#[derive(Default)]
struct Entry {
    members: HashMap<SessionId, Arc<Session>>,
}

/// The fabric a dispatcher consults on every `POST_MESSAGE`/`EDIT_MESSAGE`/
/// `DELETE_MESSAGE` to know who to fan a [`ServerMessage`] out to, and that
/// `JOIN_CHANNEL`/`SUBSCRIBE_CHANNEL`/`SUBSCRIBE_THREAD`/`LEAVE_CHANNEL`/
/// `UNSUBSCRIBE_CHANNEL`/`UNSUBSCRIBE_THREAD` mutate.
#[derive(Default)]
pub struct SubscriptionRegistry {
    channels: RwLock<HashMap<ChannelId, Arc<RwLock<Entry>>>>,
    threads: RwLock<HashMap<MessageId, Arc<RwLock<Entry>>>>,
    /// Per-session membership, used only to enforce the subscription-count
    /// bounds and to drive teardown on disconnect without scanning every
    /// channel/thread entry.
    session_channels: RwLock<HashMap<SessionId, HashSet<ChannelId>>>,
    session_threads: RwLock<HashMap<SessionId, HashSet<MessageId>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn channel_entry(&self, channel_id: ChannelId) -> Arc<RwLock<Entry>> {
        if let Some(entry) = self.channels.read().await.get(&channel_id) {
            return entry.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(channel_id)
            .or_insert_with(|| Arc::new(RwLock::new(Entry::default())))
            .clone()
    }

    async fn thread_entry(&self, thread_id: MessageId) -> Arc<RwLock<Entry>> {
        if let Some(entry) = self.threads.read().await.get(&thread_id) {
            return entry.clone();
        }
        let mut threads = self.threads.write().await;
        threads
            .entry(thread_id)
            .or_insert_with(|| Arc::new(RwLock::new(Entry::default())))
            .clone()
    }

    /// Idempotent: subscribing twice to the same channel is a no-op success,
    /// matching `LEAVE_CHANNEL`/`UNSUBSCRIBE_CHANNEL`'s idempotent removal.
    pub async fn subscribe_channel(
        &self,
        channel_id: ChannelId,
        session: &Arc<Session>,
    ) -> Result<(), SubscribeError> {
        {
            let mut session_channels = self.session_channels.write().await;
            let set = session_channels.entry(session.id).or_default();
            if !set.contains(&channel_id) && set.len() >= MAX_CHANNEL_SUBSCRIPTIONS {
                return Err(SubscribeError::TooManyChannelSubscriptions);
            }
            set.insert(channel_id);
        }
        let entry = self.channel_entry(channel_id).await;
        entry
            .write()
            .await
            .members
            .insert(session.id, session.clone());
        Ok(())
    }

    pub async fn unsubscribe_channel(&self, channel_id: ChannelId, session_id: SessionId) {
        if let Some(set) = self.session_channels.write().await.get_mut(&session_id) {
            set.remove(&channel_id);
        }
        if let Some(entry) = self.channels.read().await.get(&channel_id) {
            entry.write().await.members.remove(&session_id);
        }
    }

    pub async fn subscribe_thread(
        &self,
        thread_id: MessageId,
        session: &Arc<Session>,
    ) -> Result<(), SubscribeError> {
        {
            let mut session_threads = self.session_threads.write().await;
            let set = session_threads.entry(session.id).or_default();
            if !set.contains(&thread_id) && set.len() >= MAX_THREAD_SUBSCRIPTIONS {
                return Err(SubscribeError::TooManyThreadSubscriptions);
            }
            set.insert(thread_id);
        }
        let entry = self.thread_entry(thread_id).await;
        entry
            .write()
            .await
            .members
            .insert(session.id, session.clone());
        Ok(())
    }

    pub async fn unsubscribe_thread(&self, thread_id: MessageId, session_id: SessionId) {
        if let Some(set) = self.session_threads.write().await.get_mut(&session_id) {
            set.remove(&thread_id);
        }
        if let Some(entry) = self.threads.read().await.get(&thread_id) {
            entry.write().await.members.remove(&session_id);
        }
    }

    /// Removes every subscription a session holds, channel and thread alike.
    /// Used both by `LEAVE_CHANNEL` (channel-scoped) and by session
    /// teardown on disconnect (every scope).
    pub async fn remove_session(&self, session_id: SessionId) {
        let channel_ids: Vec<ChannelId> = self
            .session_channels
            .write()
            .await
            .remove(&session_id)
            .map(|s| s.into_iter().collect())
            .unwrap_or_default();
        for channel_id in channel_ids {
            if let Some(entry) = self.channels.read().await.get(&channel_id) {
                entry.write().await.members.remove(&session_id);
            }
        }

        let thread_ids: Vec<MessageId> = self
            .session_threads
            .write()
            .await
            .remove(&session_id)
            .map(|s| s.into_iter().collect())
            .unwrap_or_default();
        for thread_id in thread_ids {
            if let Some(entry) = self.threads.read().await.get(&thread_id) {
                entry.write().await.members.remove(&session_id);
            }
        }
    }

    /// Fans `message` out to every current channel subscriber. Uses
    /// [`Session::send`]'s non-blocking enqueue so one backlogged subscriber
    /// never delays delivery to the rest.
    pub async fn broadcast_to_channel(&self, channel_id: ChannelId, message: ServerMessage) {
        let Some(entry) = self.channels.read().await.get(&channel_id).cloned() else {
            return;
        };
        let members = entry.read().await;
        for session in members.members.values() {
            session.send(message.clone()).await;
        }
    }

    pub async fn broadcast_to_thread(&self, thread_id: MessageId, message: ServerMessage) {
        let Some(entry) = self.threads.read().await.get(&thread_id).cloned() else {
            return;
        };
        let members = entry.read().await;
        for session in members.members.values() {
            session.send(message.clone()).await;
        }
    }

    /// Snapshot of a session's current thread subscriptions, so a caller
    /// (`LEAVE_CHANNEL`) can cross-reference them against message storage to
    /// find the ones rooted in a particular channel without the fabric
    /// itself needing to index threads by channel.
    pub async fn session_thread_ids(&self, session_id: SessionId) -> Vec<MessageId> {
        self.session_threads
            .read()
            .await
            .get(&session_id)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn channel_subscriber_count(&self, channel_id: ChannelId) -> usize {
        match self.channels.read().await.get(&channel_id) {
            Some(entry) => entry.read().await.members.len(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionHandle;
    use superchat_wire::messages::Pong;

    struct NullHandle;
    impl SessionHandle for NullHandle {
        fn close(&mut self) {}
    }

    fn new_session() -> Arc<Session> {
        let (session, rx) = Session::new("tcp", None, Box::new(NullHandle));
        std::mem::forget(rx);
        session
    }

    #[tokio::test]
    async fn subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let session = new_session();
        registry.subscribe_channel(1, &session).await.unwrap();
        registry.subscribe_channel(1, &session).await.unwrap();
        assert_eq!(registry.channel_subscriber_count(1).await, 1);
    }

    #[tokio::test]
    async fn unsubscribe_channel_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let session = new_session();
        registry.subscribe_channel(1, &session).await.unwrap();
        registry.unsubscribe_channel(1, session.id).await;
        registry.unsubscribe_channel(1, session.id).await;
        assert_eq!(registry.channel_subscriber_count(1).await, 0);
    }

    #[tokio::test]
    async fn channel_subscription_cap_is_enforced() {
        let registry = SubscriptionRegistry::new();
        let session = new_session();
        for channel_id in 0..MAX_CHANNEL_SUBSCRIPTIONS as i64 {
            registry.subscribe_channel(channel_id, &session).await.unwrap();
        }
        assert_eq!(
            registry
                .subscribe_channel(MAX_CHANNEL_SUBSCRIPTIONS as i64, &session)
                .await,
            Err(SubscribeError::TooManyChannelSubscriptions)
        );
    }

    #[tokio::test]
    async fn remove_session_tears_down_channel_and_thread_subscriptions() {
        let registry = SubscriptionRegistry::new();
        let session = new_session();
        registry.subscribe_channel(1, &session).await.unwrap();
        registry.subscribe_thread(42, &session).await.unwrap();
        registry.remove_session(session.id).await;
        assert_eq!(registry.channel_subscriber_count(1).await, 0);
        registry
            .broadcast_to_thread(42, ServerMessage::Pong(Pong { timestamp: 0 }))
            .await;
    }
}
