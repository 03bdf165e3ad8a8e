//! Storage engine: the query/mutation surface over `superchat-db-entities`,
//! wrapping `sea-orm` behind a single seam. `Storage` is the only thing the
//! dispatcher calls into; nothing else in this crate touches `sea_orm`
//! directly.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use superchat_db_entities::{Channel, Message, SshKey, User};

use crate::consts::RETENTION_SWEEP_BATCH_SIZE;
use crate::error::CoreError;

#[derive(Clone)]
pub struct Storage {
    db: DatabaseConnection,
}

/// Cursor-based pagination direction for depth-first reply listing, via
/// `before_id`/`after_id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCursor {
    pub before_id: Option<i64>,
    pub after_id: Option<i64>,
    pub limit: u64,
}

impl Storage {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    // ---- users ----------------------------------------------------------

    pub async fn find_user_by_nickname(&self, nickname: &str) -> Result<Option<User::Model>, CoreError> {
        Ok(User::Entity::find()
            .filter(User::Column::Nickname.eq(nickname))
            .one(&self.db)
            .await?)
    }

    pub async fn find_user_by_id(&self, user_id: i64) -> Result<Option<User::Model>, CoreError> {
        Ok(User::Entity::find_by_id(user_id).one(&self.db).await?)
    }

    pub async fn register_user(
        &self,
        nickname: &str,
        password_hash: &str,
    ) -> Result<User::Model, CoreError> {
        if self.find_user_by_nickname(nickname).await?.is_some() {
            return Err(CoreError::NicknameRegistered(nickname.to_string()));
        }
        let model = User::ActiveModel {
            nickname: Set(nickname.to_string()),
            password_hash: Set(Some(password_hash.to_string())),
            flags: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn add_ssh_key(
        &self,
        user_id: i64,
        fingerprint: &str,
        key_type: &str,
        label: Option<String>,
    ) -> Result<SshKey::Model, CoreError> {
        let model = SshKey::ActiveModel {
            user_id: Set(user_id),
            fingerprint: Set(fingerprint.to_string()),
            key_type: Set(key_type.to_string()),
            label: Set(label),
            added_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn find_user_by_ssh_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<(SshKey::Model, User::Model)>, CoreError> {
        let Some(key) = SshKey::Entity::find()
            .filter(SshKey::Column::Fingerprint.eq(fingerprint))
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let user = User::Entity::find_by_id(key.user_id)
            .one(&self.db)
            .await?
            .ok_or(CoreError::UserNotFound(key.user_id))?;
        Ok(Some((key, user)))
    }

    pub async fn touch_ssh_key(&self, key_id: i64) -> Result<(), CoreError> {
        SshKey::Entity::update_many()
            .col_expr(SshKey::Column::LastUsedAt, Expr::value(Utc::now()))
            .filter(SshKey::Column::Id.eq(key_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn list_ssh_keys(&self, user_id: i64) -> Result<Vec<SshKey::Model>, CoreError> {
        Ok(SshKey::Entity::find()
            .filter(SshKey::Column::UserId.eq(user_id))
            .order_by_asc(SshKey::Column::AddedAt)
            .all(&self.db)
            .await?)
    }

    /// Only removes the row if it belongs to `user_id` — callers must not
    /// skip that ownership check by querying `SshKey::Entity` directly.
    pub async fn delete_ssh_key(&self, user_id: i64, key_id: i64) -> Result<(), CoreError> {
        let deleted = SshKey::Entity::delete_many()
            .filter(SshKey::Column::Id.eq(key_id))
            .filter(SshKey::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(CoreError::Forbidden);
        }
        Ok(())
    }

    // ---- channels ---------------------------------------------------------

    pub async fn list_channels(&self) -> Result<Vec<Channel::Model>, CoreError> {
        Ok(Channel::Entity::find()
            .order_by_asc(Channel::Column::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn find_channel(&self, channel_id: i64) -> Result<Channel::Model, CoreError> {
        Channel::Entity::find_by_id(channel_id)
            .one(&self.db)
            .await?
            .ok_or(CoreError::ChannelNotFound(channel_id))
    }

    pub async fn find_channel_by_name(&self, name: &str) -> Result<Option<Channel::Model>, CoreError> {
        Ok(Channel::Entity::find()
            .filter(Channel::Column::Name.eq(name))
            .one(&self.db)
            .await?)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_channel(
        &self,
        name: &str,
        display_name: &str,
        description: &str,
        channel_type: i32,
        retention_hours: i64,
        created_by: i64,
    ) -> Result<Channel::Model, CoreError> {
        if self.find_channel_by_name(name).await?.is_some() {
            return Err(CoreError::InvalidChannelName(format!(
                "{name} already exists"
            )));
        }
        let model = Channel::ActiveModel {
            name: Set(name.to_string()),
            display_name: Set(display_name.to_string()),
            description: Set(description.to_string()),
            channel_type: Set(channel_type),
            retention_hours: Set(retention_hours),
            created_by: Set(created_by),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(model.insert(&self.db).await?)
    }

    // ---- messages -----------------------------------------------------

    pub async fn find_message(&self, message_id: i64) -> Result<Message::Model, CoreError> {
        Message::Entity::find_by_id(message_id)
            .one(&self.db)
            .await?
            .ok_or(CoreError::MessageNotFound(message_id))
    }

    /// Inserts a new post and, for forum replies, increments `reply_count`
    /// on every ancestor up to the thread root, maintained recursively on
    /// insert. Runs in one transaction so a crash mid-chain never leaves
    /// counts inconsistent with the post.
    pub async fn post_message(
        &self,
        channel_id: i64,
        parent_id: Option<i64>,
        author_user_id: Option<i64>,
        author_nickname: &str,
        content: &str,
    ) -> Result<Message::Model, CoreError> {
        let txn = self.db.begin().await?;

        let thread_depth = match parent_id {
            None => 0,
            Some(parent_id) => {
                let parent = Message::Entity::find_by_id(parent_id)
                    .one(&txn)
                    .await?
                    .ok_or(CoreError::MessageNotFound(parent_id))?;
                parent.thread_depth + 1
            }
        };

        let model = Message::ActiveModel {
            channel_id: Set(channel_id),
            parent_id: Set(parent_id),
            author_user_id: Set(author_user_id),
            author_nickname: Set(author_nickname.to_string()),
            content: Set(content.to_string()),
            created_at: Set(Utc::now()),
            thread_depth: Set(thread_depth),
            reply_count: Set(0),
            ..Default::default()
        };
        let inserted = model.insert(&txn).await?;

        let mut ancestor = parent_id;
        while let Some(id) = ancestor {
            let current = Message::Entity::find_by_id(id)
                .one(&txn)
                .await?
                .ok_or(CoreError::MessageNotFound(id))?;
            Message::Entity::update_many()
                .col_expr(
                    Message::Column::ReplyCount,
                    Expr::col(Message::Column::ReplyCount).add(1),
                )
                .filter(Message::Column::Id.eq(id))
                .exec(&txn)
                .await?;
            ancestor = current.parent_id;
        }

        txn.commit().await?;
        Ok(inserted)
    }

    /// Soft-deletes a message: content is overwritten with the
    /// deletion marker, `deleted_at` is set, the row is never removed here
    /// (only the retention sweep removes rows, and it does so without
    /// regard to `deleted_at`). `reply_count` on ancestors is left alone —
    /// deleting a reply does not retroactively shrink a thread's count.
    pub async fn delete_message(
        &self,
        message_id: i64,
        deleted_by_moderator: bool,
    ) -> Result<(), CoreError> {
        let message = self.find_message(message_id).await?;
        let marker = Message::Model::deletion_marker(deleted_by_moderator);
        let mut active: Message::ActiveModel = message.into();
        active.content = Set(marker.to_string());
        active.deleted_at = Set(Some(Utc::now()));
        active.update(&self.db).await?;
        Ok(())
    }

    pub async fn edit_message(&self, message_id: i64, new_content: &str) -> Result<Message::Model, CoreError> {
        let message = self.find_message(message_id).await?;
        let mut active: Message::ActiveModel = message.into();
        active.content = Set(new_content.to_string());
        active.edited_at = Set(Some(Utc::now()));
        Ok(active.update(&self.db).await?)
    }

    /// Linear history for a chat channel, newest-last, cursor-paginated.
    pub async fn list_channel_messages(
        &self,
        channel_id: i64,
        cursor: ListCursor,
    ) -> Result<Vec<Message::Model>, CoreError> {
        let mut query = Message::Entity::find()
            .filter(Message::Column::ChannelId.eq(channel_id))
            .filter(Message::Column::ParentId.is_null());
        query = apply_cursor(query, cursor);
        let mut rows = query
            .order_by_desc(Message::Column::Id)
            .limit(cursor.limit.max(1))
            .all(&self.db)
            .await?;
        rows.reverse();
        Ok(rows)
    }

    /// Thread roots for a forum channel.
    pub async fn list_thread_roots(
        &self,
        channel_id: i64,
        cursor: ListCursor,
    ) -> Result<Vec<Message::Model>, CoreError> {
        self.list_channel_messages(channel_id, cursor).await
    }

    /// Depth-first reply listing under `root_id`, matching forum display
    /// order: a reply's children are listed immediately after it.
    pub async fn list_thread_replies_depth_first(
        &self,
        root_id: i64,
    ) -> Result<Vec<Message::Model>, CoreError> {
        let all = Message::Entity::find()
            .filter(Message::Column::ChannelId.eq(
                self.find_message(root_id).await?.channel_id,
            ))
            .order_by_asc(Message::Column::Id)
            .all(&self.db)
            .await?;

        let mut children: std::collections::HashMap<i64, Vec<Message::Model>> =
            std::collections::HashMap::new();
        for m in all {
            if let Some(parent_id) = m.parent_id {
                children.entry(parent_id).or_default().push(m);
            }
        }

        fn walk(
            node: Message::Model,
            children: &std::collections::HashMap<i64, Vec<Message::Model>>,
            out: &mut Vec<Message::Model>,
        ) {
            let id = node.id;
            out.push(node);
            if let Some(kids) = children.get(&id) {
                for kid in kids {
                    walk(kid.clone(), children, out);
                }
            }
        }

        let mut out = Vec::new();
        for node in children.get(&root_id).cloned().unwrap_or_default() {
            walk(node, &children, &mut out);
        }
        Ok(out)
    }

    /// Deletes rows past each channel's `retention_hours`, oldest first, in
    /// bounded batches of roughly 1000 rows. Retention deletes are hard
    /// deletes with no broadcast — this is disk reclamation, not an event
    /// subscribers should see.
    pub async fn sweep_retention(&self) -> Result<u64, DbErr> {
        let channels = Channel::Entity::find().all(&self.db).await?;
        let mut total_deleted = 0u64;
        for channel in channels {
            if channel.retention_hours <= 0 {
                continue;
            }
            let cutoff = Utc::now() - chrono::Duration::hours(channel.retention_hours);
            loop {
                let ids: Vec<i64> = Message::Entity::find()
                    .filter(Message::Column::ChannelId.eq(channel.id))
                    .filter(Message::Column::CreatedAt.lt(cutoff))
                    .order_by_asc(Message::Column::CreatedAt)
                    .limit(RETENTION_SWEEP_BATCH_SIZE)
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|m| m.id)
                    .collect();
                if ids.is_empty() {
                    break;
                }
                let batch_len = ids.len() as u64;
                Message::Entity::delete_many()
                    .filter(Message::Column::Id.is_in(ids))
                    .exec(&self.db)
                    .await?;
                total_deleted += batch_len;
                if batch_len < RETENTION_SWEEP_BATCH_SIZE {
                    break;
                }
            }
        }
        Ok(total_deleted)
    }
}

fn apply_cursor(
    query: sea_orm::Select<Message::Entity>,
    cursor: ListCursor,
) -> sea_orm::Select<Message::Entity> {
    let mut condition = Condition::all();
    if let Some(before_id) = cursor.before_id {
        condition = condition.add(Message::Column::Id.lt(before_id));
    }
    if let Some(after_id) = cursor.after_id {
        condition = condition.add(Message::Column::Id.gt(after_id));
    }
    query.filter(condition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    async fn memory_storage() -> Storage {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        superchat_db_migrations::migrate_database(&db).await.unwrap();
        Storage::new(db)
    }

    #[tokio::test]
    async fn reply_count_propagates_to_every_ancestor() {
        let storage = memory_storage().await;
        let user = storage.register_user("alice", "hash").await.unwrap();
        let channel = storage
            .create_channel("general", "General", "", 1, 0, user.id)
            .await
            .unwrap();
        let root = storage
            .post_message(channel.id, None, Some(user.id), "alice", "root")
            .await
            .unwrap();
        let reply1 = storage
            .post_message(channel.id, Some(root.id), Some(user.id), "alice", "reply 1")
            .await
            .unwrap();
        storage
            .post_message(
                channel.id,
                Some(reply1.id),
                Some(user.id),
                "alice",
                "reply 1.1",
            )
            .await
            .unwrap();

        let root = storage.find_message(root.id).await.unwrap();
        let reply1 = storage.find_message(reply1.id).await.unwrap();
        assert_eq!(root.reply_count, 2);
        assert_eq!(reply1.reply_count, 1);
    }

    #[tokio::test]
    async fn deleting_a_message_overwrites_content_but_keeps_the_row() {
        let storage = memory_storage().await;
        let user = storage.register_user("bob", "hash").await.unwrap();
        let channel = storage
            .create_channel("general", "General", "", 0, 0, user.id)
            .await
            .unwrap();
        let message = storage
            .post_message(channel.id, None, Some(user.id), "bob", "hello")
            .await
            .unwrap();

        storage.delete_message(message.id, false).await.unwrap();
        let message = storage.find_message(message.id).await.unwrap();
        assert!(message.is_deleted());
        assert_eq!(message.content, "[deleted by author]");
    }

    #[tokio::test]
    async fn depth_first_listing_visits_a_reply_before_its_siblings_children() {
        let storage = memory_storage().await;
        let user = storage.register_user("carol", "hash").await.unwrap();
        let channel = storage
            .create_channel("forum", "Forum", "", 1, 0, user.id)
            .await
            .unwrap();
        let root = storage
            .post_message(channel.id, None, Some(user.id), "carol", "root")
            .await
            .unwrap();
        let a = storage
            .post_message(channel.id, Some(root.id), Some(user.id), "carol", "a")
            .await
            .unwrap();
        let _b = storage
            .post_message(channel.id, Some(root.id), Some(user.id), "carol", "b")
            .await
            .unwrap();
        let a1 = storage
            .post_message(channel.id, Some(a.id), Some(user.id), "carol", "a1")
            .await
            .unwrap();

        let ordered = storage
            .list_thread_replies_depth_first(root.id)
            .await
            .unwrap();
        let contents: Vec<&str> = ordered.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "a1", "b"]);
        assert_eq!(ordered[1].id, a1.id);
    }

    #[tokio::test]
    async fn retention_sweep_removes_only_expired_rows() {
        let storage = memory_storage().await;
        let user = storage.register_user("dave", "hash").await.unwrap();
        let channel = storage
            .create_channel("ephemeral", "Ephemeral", "", 0, 1, user.id)
            .await
            .unwrap();
        let message = storage
            .post_message(channel.id, None, Some(user.id), "dave", "old")
            .await
            .unwrap();
        Message::Entity::update_many()
            .col_expr(
                Message::Column::CreatedAt,
                Expr::value(Utc::now() - chrono::Duration::hours(2)),
            )
            .filter(Message::Column::Id.eq(message.id))
            .exec(&storage.db)
            .await
            .unwrap();

        let deleted = storage.sweep_retention().await.unwrap();
        assert_eq!(deleted, 1);
        assert!(storage.find_message(message.id).await.is_err());
    }
}
