use sea_orm::Schema;
use sea_orm_migration::prelude::*;

use crate::m00001_create_users::user;

pub mod channel {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "channels")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub display_name: String,
        pub description: String,
        #[sea_orm(column_name = "type")]
        pub channel_type: i32,
        pub retention_hours: i64,
        pub created_by: i64,
        pub created_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter)]
    pub enum Relation {
        Creator,
    }

    impl RelationTrait for Relation {
        fn def(&self) -> RelationDef {
            match self {
                Self::Creator => Entity::belongs_to(super::user::Entity)
                    .from(Column::CreatedBy)
                    .to(super::user::Column::Id)
                    .into(),
            }
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00003_create_channels"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(channel::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-channels-name")
                    .table(channel::Entity)
                    .col(channel::Column::Name)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(channel::Entity).to_owned())
            .await
    }
}
