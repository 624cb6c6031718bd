use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::auth::format_naive_datetime_iso_millis;
use crate::db::Database;
use crate::db::operations::progress::COMPLETION_THRESHOLD;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kanji_character: String,
    pub word: String,
    pub reading: Option<String>,
    pub meanings: Option<Vec<String>>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordWithKanji {
    #[serde(flatten)]
    pub entry: WordEntry,
    pub jlpt_level: String,
    pub grade: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedWords {
    pub words: Vec<WordWithKanji>,
    pub pagination: Pagination,
}

fn map_word_row(row: &PgRow) -> Result<WordEntry, sqlx::Error> {
    let created_at: NaiveDateTime = row.try_get("created_at")?;
    let updated_at: NaiveDateTime = row.try_get("updated_at")?;
    Ok(WordEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        kanji_character: row.try_get("kanji_character")?,
        word: row.try_get("word")?,
        reading: row.try_get("reading")?,
        meanings: row.try_get("meanings")?,
        created_at: format_naive_datetime_iso_millis(created_at),
        updated_at: format_naive_datetime_iso_millis(updated_at),
    })
}

pub async fn word_exists(
    db: &Database,
    user_id: &Uuid,
    kanji_character: &str,
    word: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM user_kanji_words
            WHERE user_id = $1 AND kanji_character = $2 AND word = $3
        ) AS found
        "#,
    )
    .bind(user_id)
    .bind(kanji_character)
    .bind(word)
    .fetch_one(db.pool())
    .await?;
    row.try_get("found")
}

/// Inserts the word and, in the same transaction, records the completion mark
/// once the per-kanji word count reaches the threshold. The conditional insert
/// and the count run under the transaction so rapid consecutive logs cannot
/// lose the mark.
pub async fn log_word(
    db: &Database,
    user_id: &Uuid,
    kanji_character: &str,
    word: &str,
    reading: Option<&str>,
    meanings: Option<&[String]>,
) -> Result<WordEntry, sqlx::Error> {
    let mut tx = db.pool().begin().await?;

    let id = Uuid::new_v4();
    let now = Utc::now().naive_utc();

    let row = sqlx::query(
        r#"
        INSERT INTO user_kanji_words (
            id, user_id, kanji_character, word, reading, meanings, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        RETURNING id, user_id, kanji_character, word, reading, meanings, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(kanji_character)
    .bind(word)
    .bind(reading)
    .bind(meanings)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO completed_kanji (user_id, kanji_character, completed_at)
        SELECT $1, $2, NOW()
        WHERE (
            SELECT COUNT(*) FROM user_kanji_words
            WHERE user_id = $1 AND kanji_character = $2
        ) >= $3
        ON CONFLICT (user_id, kanji_character) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(kanji_character)
    .bind(COMPLETION_THRESHOLD)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    map_word_row(&row)
}

pub async fn list_words(
    db: &Database,
    user_id: &Uuid,
    page: i64,
    limit: i64,
) -> Result<PaginatedWords, sqlx::Error> {
    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let rows = sqlx::query(
        r#"
        SELECT w.id, w.user_id, w.kanji_character, w.word, w.reading, w.meanings,
               w.created_at, w.updated_at, k.jlpt_level, k.grade,
               COUNT(*) OVER() AS total_count
        FROM user_kanji_words w
        JOIN kanji k ON w.kanji_character = k.character
        WHERE w.user_id = $1
        ORDER BY w.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db.pool())
    .await?;

    let total_count: i64 = rows
        .first()
        .map(|row| row.try_get("total_count"))
        .transpose()?
        .unwrap_or(0);

    let words = rows
        .iter()
        .map(|row| {
            Ok(WordWithKanji {
                entry: map_word_row(row)?,
                jlpt_level: row.try_get("jlpt_level")?,
                grade: row.try_get("grade")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(PaginatedWords {
        words,
        pagination: Pagination {
            page,
            limit,
            total_count,
            total_pages: (total_count + limit - 1) / limit,
        },
    })
}

pub async fn words_for_kanji(
    db: &Database,
    user_id: &Uuid,
    kanji_character: &str,
) -> Result<Vec<WordEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, kanji_character, word, reading, meanings, created_at, updated_at
        FROM user_kanji_words
        WHERE user_id = $1 AND kanji_character = $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(kanji_character)
    .fetch_all(db.pool())
    .await?;

    rows.iter().map(map_word_row).collect()
}

pub async fn recent_words(
    db: &Database,
    user_id: &Uuid,
    limit: i64,
) -> Result<Vec<WordEntry>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, kanji_character, word, reading, meanings, created_at, updated_at
        FROM user_kanji_words
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit.clamp(1, 100))
    .fetch_all(db.pool())
    .await?;

    rows.iter().map(map_word_row).collect()
}

/// Owner-scoped update. Returns `None` when the row does not exist or belongs
/// to another user, which callers surface as not-found.
pub async fn update_word(
    db: &Database,
    user_id: &Uuid,
    word_id: &Uuid,
    word: Option<&str>,
    reading: Option<&str>,
    meanings: Option<&[String]>,
) -> Result<Option<WordEntry>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE user_kanji_words
        SET word = COALESCE($1, word),
            reading = COALESCE($2, reading),
            meanings = COALESCE($3, meanings),
            updated_at = NOW()
        WHERE id = $4 AND user_id = $5
        RETURNING id, user_id, kanji_character, word, reading, meanings, created_at, updated_at
        "#,
    )
    .bind(word)
    .bind(reading)
    .bind(meanings)
    .bind(word_id)
    .bind(user_id)
    .fetch_optional(db.pool())
    .await?;

    row.as_ref().map(map_word_row).transpose()
}

pub async fn delete_word(
    db: &Database,
    user_id: &Uuid,
    word_id: &Uuid,
) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        DELETE FROM user_kanji_words
        WHERE id = $1 AND user_id = $2
        RETURNING kanji_character
        "#,
    )
    .bind(word_id)
    .bind(user_id)
    .fetch_optional(db.pool())
    .await?;

    row.map(|r| r.try_get("kanji_character")).transpose()
}
