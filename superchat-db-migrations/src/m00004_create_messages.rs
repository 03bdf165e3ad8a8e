use sea_orm::Schema;
use sea_orm_migration::prelude::*;

use crate::m00001_create_users::user;
use crate::m00003_create_channels::channel;

pub mod message {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "messages")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub channel_id: i64,
        pub parent_id: Option<i64>,
        pub author_user_id: Option<i64>,
        pub author_nickname: String,
        #[sea_orm(column_type = "Text")]
        pub content: String,
        pub created_at: DateTimeUtc,
        pub edited_at: Option<DateTimeUtc>,
        pub deleted_at: Option<DateTimeUtc>,
        pub thread_depth: i32,
        pub reply_count: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter)]
    pub enum Relation {
        Channel,
        Author,
        Parent,
    }

    impl RelationTrait for Relation {
        fn def(&self) -> RelationDef {
            match self {
                Self::Channel => Entity::belongs_to(super::channel::Entity)
                    .from(Column::ChannelId)
                    .to(super::channel::Column::Id)
                    .into(),
                Self::Author => Entity::belongs_to(super::user::Entity)
                    .from(Column::AuthorUserId)
                    .to(super::user::Column::Id)
                    .into(),
                Self::Parent => Entity::belongs_to(super::Entity)
                    .from(Column::ParentId)
                    .to(super::Column::Id)
                    .into(),
            }
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00004_create_messages"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(message::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-messages-channel_id")
                    .table(message::Entity)
                    .col(message::Column::ChannelId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-messages-parent_id")
                    .table(message::Entity)
                    .col(message::Column::ParentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(message::Entity).to_owned())
            .await
    }
}
