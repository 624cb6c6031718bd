use chrono::NaiveDate;
use serde::Serialize;
use sqlx::Row;
use uuid::Uuid;

use crate::db::Database;

/// A kanji counts as completed once the user has logged this many words for it.
pub const COMPLETION_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KanjiProgress {
    pub total: i64,
    pub completed: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
    pub total_words: i64,
    pub kanji_with_words: i64,
    pub avg_words_per_kanji: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JlptLevelProgress {
    pub level: String,
    pub total: i64,
    pub completed: i64,
    pub percentage: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningStreak {
    pub current_streak: i64,
    pub longest_streak: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub words_logged: i64,
}

fn percentage(completed: i64, total: i64) -> i64 {
    if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as i64
    }
}

pub async fn kanji_progress(db: &Database, user_id: &Uuid) -> Result<KanjiProgress, sqlx::Error> {
    let row = sqlx::query(
        r#"
        WITH completed AS (
            SELECT kanji_character
            FROM user_kanji_words
            WHERE user_id = $1
            GROUP BY kanji_character
            HAVING COUNT(*) >= $2
        )
        SELECT COUNT(DISTINCT k.character) AS total,
               COUNT(DISTINCT c.kanji_character) AS completed
        FROM kanji k
        LEFT JOIN completed c ON k.character = c.kanji_character
        "#,
    )
    .bind(user_id)
    .bind(COMPLETION_THRESHOLD)
    .fetch_one(db.pool())
    .await?;

    let total: i64 = row.try_get("total")?;
    let completed: i64 = row.try_get("completed")?;

    Ok(KanjiProgress {
        total,
        completed,
        percentage: percentage(completed, total),
    })
}

pub async fn word_progress(db: &Database, user_id: &Uuid) -> Result<WordProgress, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total_words,
               COUNT(DISTINCT kanji_character) AS kanji_with_words
        FROM user_kanji_words
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(db.pool())
    .await?;

    let total_words: i64 = row.try_get("total_words")?;
    let kanji_with_words: i64 = row.try_get("kanji_with_words")?;

    // Division by zero resolves to 0.0, never NaN.
    let avg_words_per_kanji = if kanji_with_words == 0 {
        0.0
    } else {
        total_words as f64 / kanji_with_words as f64
    };

    Ok(WordProgress {
        total_words,
        kanji_with_words,
        avg_words_per_kanji,
    })
}

/// Per-level completion breakdown. Kanji whose JLPT level is unknown are
/// excluded entirely.
pub async fn progress_by_jlpt_level(
    db: &Database,
    user_id: &Uuid,
) -> Result<Vec<JlptLevelProgress>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        WITH completed AS (
            SELECT kanji_character
            FROM user_kanji_words
            WHERE user_id = $1
            GROUP BY kanji_character
            HAVING COUNT(*) >= $2
        )
        SELECT k.jlpt_level,
               COUNT(DISTINCT k.character) AS total,
               COUNT(DISTINCT c.kanji_character) AS completed
        FROM kanji k
        LEFT JOIN completed c ON k.character = c.kanji_character
        WHERE k.jlpt_level <> 'Unknown'
        GROUP BY k.jlpt_level
        ORDER BY k.jlpt_level
        "#,
    )
    .bind(user_id)
    .bind(COMPLETION_THRESHOLD)
    .fetch_all(db.pool())
    .await?;

    rows.iter()
        .map(|row| {
            let total: i64 = row.try_get("total")?;
            let completed: i64 = row.try_get("completed")?;
            Ok(JlptLevelProgress {
                level: row.try_get("jlpt_level")?,
                total,
                completed,
                percentage: percentage(completed, total),
            })
        })
        .collect()
}

/// Streaks over calendar days with at least one logged word. The current
/// streak is the run whose most recent day is today; if today has no activity
/// it is 0.
pub async fn learning_streak(
    db: &Database,
    user_id: &Uuid,
) -> Result<LearningStreak, sqlx::Error> {
    let row = sqlx::query(
        r#"
        WITH daily AS (
            SELECT DISTINCT created_at::date AS activity_date
            FROM user_kanji_words
            WHERE user_id = $1
        ),
        grouped AS (
            SELECT activity_date,
                   activity_date - (ROW_NUMBER() OVER (ORDER BY activity_date))::int AS grp
            FROM daily
        ),
        runs AS (
            SELECT COUNT(*) AS len, MAX(activity_date) AS last_day
            FROM grouped
            GROUP BY grp
        )
        SELECT COALESCE(MAX(len) FILTER (WHERE last_day = CURRENT_DATE), 0) AS current_streak,
               COALESCE(MAX(len), 0) AS longest_streak
        FROM runs
        "#,
    )
    .bind(user_id)
    .fetch_one(db.pool())
    .await?;

    Ok(LearningStreak {
        current_streak: row.try_get("current_streak")?,
        longest_streak: row.try_get("longest_streak")?,
    })
}

/// Zero-filled daily series covering [today - days, today], ascending. Always
/// returns exactly days + 1 entries.
pub async fn daily_activity(
    db: &Database,
    user_id: &Uuid,
    days: i32,
) -> Result<Vec<DailyActivity>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        WITH date_series AS (
            SELECT generate_series(
                CURRENT_DATE - $2::int,
                CURRENT_DATE,
                interval '1 day'
            )::date AS date
        ),
        daily_counts AS (
            SELECT created_at::date AS date, COUNT(*) AS words_logged
            FROM user_kanji_words
            WHERE user_id = $1
              AND created_at >= CURRENT_DATE - $2::int
            GROUP BY created_at::date
        )
        SELECT ds.date, COALESCE(dc.words_logged, 0) AS words_logged
        FROM date_series ds
        LEFT JOIN daily_counts dc ON ds.date = dc.date
        ORDER BY ds.date
        "#,
    )
    .bind(user_id)
    .bind(days)
    .fetch_all(db.pool())
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DailyActivity {
                date: row.try_get("date")?,
                words_logged: row.try_get("words_logged")?,
            })
        })
        .collect()
}

/// Idempotent completion mark. The guarding count makes redundant calls safe
/// and a call before the threshold a no-op.
pub async fn mark_completion(
    db: &Database,
    user_id: &Uuid,
    kanji_character: &str,
) -> Result<(), sqlx::Error> {
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
    .execute(db.pool())
    .await?;
    Ok(())
}

/// Drops the completion mark when the word count falls back under the
/// threshold, typically after a delete.
pub async fn unmark_completion_if_below_threshold(
    db: &Database,
    user_id: &Uuid,
    kanji_character: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        DELETE FROM completed_kanji
        WHERE user_id = $1 AND kanji_character = $2
          AND (
              SELECT COUNT(*) FROM user_kanji_words
              WHERE user_id = $1 AND kanji_character = $2
          ) < $3
        "#,
    )
    .bind(user_id)
    .bind(kanji_character)
    .bind(COMPLETION_THRESHOLD)
    .execute(db.pool())
    .await?;
    Ok(())
}

/// Clears derived completion marks only; logged words are untouched, so the
/// marks can always be recomputed.
pub async fn reset_progress(db: &Database, user_id: &Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM completed_kanji WHERE user_id = $1")
        .bind(user_id)
        .execute(db.pool())
        .await?;
    Ok(())
}
