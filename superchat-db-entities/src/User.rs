use sea_orm::entity::prelude::*;
use serde::Serialize;

pub const FLAG_ADMIN: i64 = 0x01;
pub const FLAG_MODERATOR: i64 = 0x02;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique only among registered (password-holding) users; anonymous
    /// sessions may reuse any nickname not claimed here.
    pub nickname: String,
    pub password_hash: Option<String>,
    pub flags: i64,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn is_admin(&self) -> bool {
        self.flags & FLAG_ADMIN != 0
    }

    pub fn is_moderator(&self) -> bool {
        self.flags & FLAG_MODERATOR != 0
    }
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    SshKeys,
    Channels,
    Messages,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Self::SshKeys => Entity::has_many(super::SshKey::Entity)
                .from(Column::Id)
                .to(super::SshKey::Column::UserId)
                .into(),
            Self::Channels => Entity::has_many(super::Channel::Entity)
                .from(Column::Id)
                .to(super::Channel::Column::CreatedBy)
                .into(),
            Self::Messages => Entity::has_many(super::Message::Entity)
                .from(Column::Id)
                .to(super::Message::Column::AuthorUserId)
                .into(),
        }
    }
}

impl Related<super::SshKey::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SshKeys.def()
    }
}

impl Related<super::Channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channels.def()
    }
}

impl Related<super::Message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
