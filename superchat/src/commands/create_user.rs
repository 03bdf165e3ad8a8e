//! `superchat create-user` — registers (or updates the password of) a
//! registered user directly against the database, bypassing the wire
//! protocol's `AUTH_REQUEST` flow. Find-or-insert by unique nickname, then
//! set its password hash and flags directly — there's a single `users`
//! table, so a user row carries its own `password_hash` and `flags` bitset
//! rather than a separate credential/role table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use superchat_common::helpers::hash::hash_password;
use superchat_core::db::connect_to_db;
use superchat_db_entities::User;

use crate::config::load_config;

pub async fn command(config_path: &PathBuf, nickname: &str, password: &str, admin: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let db = connect_to_db(&config).await?;

    let existing = User::Entity::find()
        .filter(User::Column::Nickname.eq(nickname))
        .one(&db)
        .await
        .context("looking up existing user")?;

    let password_hash = hash_password(password);

    match existing {
        Some(user) => {
            let mut flags = user.flags;
            if admin {
                flags |= User::FLAG_ADMIN;
            }
            let mut model: User::ActiveModel = user.into();
            model.password_hash = Set(Some(password_hash));
            model.flags = Set(flags);
            model.update(&db).await.context("updating user")?;
            println!("updated existing user {nickname:?}");
        }
        None => {
            let flags = if admin { User::FLAG_ADMIN } else { 0 };
            let model = User::ActiveModel {
                nickname: Set(nickname.to_string()),
                password_hash: Set(Some(password_hash)),
                flags: Set(flags),
                created_at: Set(chrono::Utc::now()),
                ..Default::default()
            };
            model.insert(&db).await.context("inserting user")?;
            println!("created user {nickname:?}");
        }
    }

    Ok(())
}
