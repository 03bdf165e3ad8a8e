use sea_orm::entity::prelude::*;
use serde::Serialize;

pub const CHANNEL_TYPE_CHAT: i32 = 0;
pub const CHANNEL_TYPE_FORUM: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lowercased `[a-z0-9_-]`, unique.
    pub name: String,
    pub display_name: String,
    pub description: String,
    #[sea_orm(column_name = "type")]
    pub channel_type: i32,
    pub retention_hours: i64,
    pub created_by: i64,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn is_forum(&self) -> bool {
        self.channel_type == CHANNEL_TYPE_FORUM
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    Creator,
    Messages,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::Creator => Entity::belongs_to(super::User::Entity)
                .from(Column::CreatedBy)
                .to(super::User::Column::Id)
                .into(),
            Self::Messages => Entity::has_many(super::Message::Entity)
                .from(Column::Id)
                .to(super::Message::Column::ChannelId)
                .into(),
        }
    }
}

impl Related<super::User::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::Message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
