use chrono::Utc;
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use crate::auth::format_naive_datetime_iso_millis;
use crate::db::Database;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub profile_picture: Option<String>,
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub total_kanji_learned: i64,
    pub total_words_added: i64,
}

pub async fn username_taken(db: &Database, username: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS taken")
        .bind(username)
        .fetch_one(db.pool())
        .await?;
    row.try_get("taken")
}

pub async fn create_user(
    db: &Database,
    username: &str,
    password_hash: &str,
    name: &str,
) -> Result<UserRecord, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = Utc::now().naive_utc();

    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, name, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(password_hash)
    .bind(name)
    .bind(now)
    .execute(db.pool())
    .await?;

    Ok(UserRecord {
        id,
        username: username.to_string(),
        name: name.to_string(),
        profile_picture: None,
        created_at: format_naive_datetime_iso_millis(now),
    })
}

pub async fn find_credentials_by_username(
    db: &Database,
    username: &str,
) -> Result<Option<UserCredentials>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, username, name, profile_picture, password_hash, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(db.pool())
    .await?;

    row.map(|r| {
        let created_at: chrono::NaiveDateTime = r.try_get("created_at")?;
        Ok(UserCredentials {
            id: r.try_get("id")?,
            username: r.try_get("username")?,
            name: r.try_get("name")?,
            profile_picture: r.try_get("profile_picture")?,
            password_hash: r.try_get("password_hash")?,
            created_at: format_naive_datetime_iso_millis(created_at),
        })
    })
    .transpose()
}

pub async fn update_profile(
    db: &Database,
    user_id: &Uuid,
    name: Option<&str>,
    profile_picture: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE($1, name),
            profile_picture = COALESCE($2, profile_picture)
        WHERE id = $3
        "#,
    )
    .bind(name)
    .bind(profile_picture)
    .bind(user_id)
    .execute(db.pool())
    .await?;
    Ok(())
}

/// Distinct-kanji and word totals shown on the profile page.
pub async fn profile_stats(db: &Database, user_id: &Uuid) -> Result<ProfileStats, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total_words,
               COUNT(DISTINCT kanji_character) AS total_kanji
        FROM user_kanji_words
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(db.pool())
    .await?;

    Ok(ProfileStats {
        total_kanji_learned: row.try_get("total_kanji")?,
        total_words_added: row.try_get("total_words")?,
    })
}
