use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::auth::format_naive_datetime_iso_millis;
use crate::db::Database;
use crate::db::operations::words::Pagination;
use crate::services::jisho::KanjiData;

/// Persisted kanji rows older than this are refetched from the dictionary.
pub const STALENESS_WINDOW_DAYS: i32 = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanjiRecord {
    pub character: String,
    pub onyomi: Vec<String>,
    pub kunyomi: Vec<String>,
    pub meanings: Vec<String>,
    pub stroke_count: i32,
    pub jlpt_level: String,
    pub grade: String,
    pub last_updated: String,
}

impl KanjiRecord {
    pub fn as_kanji_data(&self) -> KanjiData {
        KanjiData {
            character: self.character.clone(),
            onyomi: self.onyomi.clone(),
            kunyomi: self.kunyomi.clone(),
            meanings: self.meanings.clone(),
            stroke_count: self.stroke_count,
            jlpt_level: self.jlpt_level.clone(),
            grade: self.grade.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedKanji {
    pub kanji: Vec<KanjiRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JlptLevelCount {
    pub jlpt_level: String,
    pub count: i64,
}

fn map_kanji_row(row: &PgRow) -> Result<KanjiRecord, sqlx::Error> {
    let last_updated: NaiveDateTime = row.try_get("last_updated")?;
    Ok(KanjiRecord {
        character: row.try_get("character")?,
        onyomi: row.try_get("onyomi")?,
        kunyomi: row.try_get("kunyomi")?,
        meanings: row.try_get("meanings")?,
        stroke_count: row.try_get("stroke_count")?,
        jlpt_level: row.try_get("jlpt_level")?,
        grade: row.try_get("grade")?,
        last_updated: format_naive_datetime_iso_millis(last_updated),
    })
}

pub async fn upsert_kanji(db: &Database, data: &KanjiData) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO kanji (
            character, onyomi, kunyomi, meanings, stroke_count, jlpt_level, grade, last_updated
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        ON CONFLICT (character) DO UPDATE SET
            onyomi = EXCLUDED.onyomi,
            kunyomi = EXCLUDED.kunyomi,
            meanings = EXCLUDED.meanings,
            stroke_count = EXCLUDED.stroke_count,
            jlpt_level = EXCLUDED.jlpt_level,
            grade = EXCLUDED.grade,
            last_updated = NOW()
        "#,
    )
    .bind(&data.character)
    .bind(&data.onyomi)
    .bind(&data.kunyomi)
    .bind(&data.meanings)
    .bind(data.stroke_count)
    .bind(&data.jlpt_level)
    .bind(&data.grade)
    .execute(db.pool())
    .await?;
    Ok(())
}

pub async fn get_kanji(
    db: &Database,
    character: &str,
) -> Result<Option<KanjiRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT character, onyomi, kunyomi, meanings, stroke_count, jlpt_level, grade, last_updated
        FROM kanji
        WHERE character = $1
        "#,
    )
    .bind(character)
    .fetch_optional(db.pool())
    .await?;

    row.as_ref().map(map_kanji_row).transpose()
}

/// Read-through lookup: only returns rows newer than the staleness window so
/// callers fall back to the dictionary gateway for stale data.
pub async fn get_fresh_kanji(
    db: &Database,
    character: &str,
) -> Result<Option<KanjiRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT character, onyomi, kunyomi, meanings, stroke_count, jlpt_level, grade, last_updated
        FROM kanji
        WHERE character = $1
          AND last_updated > NOW() - make_interval(days => $2)
        "#,
    )
    .bind(character)
    .bind(STALENESS_WINDOW_DAYS)
    .fetch_optional(db.pool())
    .await?;

    row.as_ref().map(map_kanji_row).transpose()
}

pub async fn list_kanji(
    db: &Database,
    page: i64,
    limit: i64,
    jlpt_level: Option<&str>,
) -> Result<PaginatedKanji, sqlx::Error> {
    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let rows = sqlx::query(
        r#"
        SELECT character, onyomi, kunyomi, meanings, stroke_count, jlpt_level, grade, last_updated,
               COUNT(*) OVER() AS total_count
        FROM kanji
        WHERE $1::text IS NULL OR jlpt_level = $1
        ORDER BY character
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(jlpt_level)
    .bind(limit)
    .bind(offset)
    .fetch_all(db.pool())
    .await?;

    let total_count: i64 = rows
        .first()
        .map(|row| row.try_get("total_count"))
        .transpose()?
        .unwrap_or(0);

    let kanji = rows
        .iter()
        .map(map_kanji_row)
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

    Ok(PaginatedKanji {
        kanji,
        pagination: Pagination {
            page,
            limit,
            total_count,
            total_pages: (total_count + limit - 1) / limit,
        },
    })
}

pub async fn jlpt_levels(db: &Database) -> Result<Vec<JlptLevelCount>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT jlpt_level, COUNT(*) AS count
        FROM kanji
        WHERE jlpt_level <> 'Unknown'
        GROUP BY jlpt_level
        ORDER BY jlpt_level
        "#,
    )
    .fetch_all(db.pool())
    .await?;

    rows.iter()
        .map(|row| {
            Ok(JlptLevelCount {
                jlpt_level: row.try_get("jlpt_level")?,
                count: row.try_get("count")?,
            })
        })
        .collect()
}
