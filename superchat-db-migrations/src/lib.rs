use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use sea_orm_migration::MigrationTrait;

mod m00001_create_users;
mod m00002_create_ssh_keys;
mod m00003_create_channels;
mod m00004_create_messages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m00001_create_users::Migration),
            Box::new(m00002_create_ssh_keys::Migration),
            Box::new(m00003_create_channels::Migration),
            Box::new(m00004_create_messages::Migration),
        ]
    }
}

pub async fn migrate_database(connection: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(connection, None).await
}
