use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A post in a channel. `parent_id` is absent for chat messages and for
/// forum thread roots; for forum replies it names the immediate parent
/// (which may itself be a reply).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub channel_id: i64,
    pub parent_id: Option<i64>,
    pub author_user_id: Option<i64>,
    /// Nickname at post time; anonymous authorship is recorded with a
    /// `~` prefix appended by the server, not by the client.
    pub author_nickname: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub created_at: DateTimeUtc,
    pub edited_at: Option<DateTimeUtc>,
    pub deleted_at: Option<DateTimeUtc>,
    /// Forum only; 0 for chat messages and forum thread roots.
    pub thread_depth: i32,
    /// Forum only; count of all descendants reachable via `parent_id`.
    pub reply_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Channel,
    Author,
    Parent,
    Children,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Channel => Entity::belongs_to(super::Channel::Entity)
                .from(Column::ChannelId)
                .to(super::Channel::Column::Id)
                .into(),
            Self::Author => Entity::belongs_to(super::User::Entity)
                .from(Column::AuthorUserId)
                .to(super::User::Column::Id)
                .into(),
            Self::Parent => Entity::belongs_to(super::Message::Entity)
                .from(Column::ParentId)
                .to(super::Message::Column::Id)
                .into(),
            Self::Children => Entity::has_many(super::Message::Entity)
                .from(Column::Id)
                .to(super::Message::Column::ParentId)
                .into(),
        }
    }
}

impl Related<super::Channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl Related<super::User::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Model {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_thread_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// `[deleted by author]` vs `[deleted by moderator]`: the marker
    /// reflects who performed the deletion, not who authored the message.
    pub fn deletion_marker(deleted_by_moderator: bool) -> &'static str {
        if deleted_by_moderator {
            "[deleted by moderator]"
        } else {
            "[deleted by author]"
        }
    }
}
