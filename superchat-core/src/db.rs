//! Database bootstrap for the single DB file: resolve the path, secure the
//! file, connect, run migrations. No config-into-DB migration step and no
//! seed data needed.

use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, TransactionTrait};
use superchat_common::helpers::fs::secure_file;
use superchat_common::Config;
use superchat_db_migrations::migrate_database;

pub async fn connect_to_db(config: &Config) -> anyhow::Result<DatabaseConnection> {
    let mut url = url::Url::parse(config.store.database_url.expose_secret())
        .context("parsing database_url")?;

    if url.scheme() == "sqlite" {
        let mut path = config.paths_relative_to.clone();
        path.push(url.path());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        url.set_path(
            path.to_str()
                .ok_or_else(|| anyhow::anyhow!("database path is not valid UTF-8"))?,
        );
        url.set_query(Some("mode=rwc"));

        // Creating the file requires one throwaway connection before we can
        // chmod it; sqlite only materializes the file on first write.
        let db = Database::connect(ConnectOptions::new(url.to_string()))
            .await
            .context("connecting to the database")?;
        db.begin().await?.commit().await?;
        drop(db);

        secure_file(&path)?;
    }

    let mut opt = ConnectOptions::new(url.to_string());
    opt.max_connections(20)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let connection = Database::connect(opt)
        .await
        .context("connecting to the database")?;
    migrate_database(&connection)
        .await
        .context("running database migrations")?;
    Ok(connection)
}
