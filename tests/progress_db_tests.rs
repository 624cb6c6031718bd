//! Aggregation and word-logging tests against a live Postgres. Each test
//! connects via DATABASE_URL and becomes a no-op when it is not set, so the
//! rest of the suite stays runnable without a database.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

use kanji_tracker::db::operations::{
    kanji as kanji_ops, progress as progress_ops, users as user_ops, words as word_ops,
};
use kanji_tracker::db::Database;
use kanji_tracker::response::AppError;
use kanji_tracker::services::jisho::KanjiData;

async fn test_db() -> Option<Arc<Database>> {
    let configured = std::env::var("DATABASE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .is_some();
    if !configured {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    }
    Database::from_env().await.ok()
}

fn sample_kanji(character: &str) -> KanjiData {
    KanjiData {
        character: character.to_string(),
        onyomi: vec!["ニチ".to_string()],
        kunyomi: vec!["ひ".to_string()],
        meanings: vec!["day".to_string()],
        stroke_count: 4,
        jlpt_level: "N5".to_string(),
        grade: "1".to_string(),
    }
}

async fn fresh_user(db: &Database) -> Uuid {
    let username = format!("test-{}", Uuid::new_v4());
    user_ops::create_user(db, &username, "not-a-real-hash", "Test User")
        .await
        .unwrap()
        .id
}

async fn seed_kanji(db: &Database, character: &str) {
    kanji_ops::upsert_kanji(db, &sample_kanji(character))
        .await
        .unwrap();
}

async fn completion_marks(db: &Database, user_id: &Uuid, character: &str) -> i64 {
    let row = sqlx::query(
        "SELECT COUNT(*) AS marks FROM completed_kanji WHERE user_id = $1 AND kanji_character = $2",
    )
    .bind(user_id)
    .bind(character)
    .fetch_one(db.pool())
    .await
    .unwrap();
    row.try_get("marks").unwrap()
}

async fn backdated_word(db: &Database, user_id: &Uuid, character: &str, word: &str, days_ago: i64) {
    let then = Utc::now().naive_utc() - Duration::days(days_ago);
    sqlx::query(
        r#"
        INSERT INTO user_kanji_words (
            id, user_id, kanji_character, word, reading, meanings, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, NULL, NULL, $5, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(character)
    .bind(word)
    .bind(then)
    .execute(db.pool())
    .await
    .unwrap();
}

#[tokio::test]
async fn third_logged_word_completes_the_kanji() {
    let Some(db) = test_db().await else { return };
    let user = fresh_user(&db).await;
    seed_kanji(&db, "日").await;

    word_ops::log_word(&db, &user, "日", "日本", Some("にほん"), None)
        .await
        .unwrap();
    word_ops::log_word(&db, &user, "日", "日光", None, None)
        .await
        .unwrap();

    // Two words are not enough for a completion mark.
    assert_eq!(completion_marks(&db, &user, "日").await, 0);

    word_ops::log_word(&db, &user, "日", "日課", None, None)
        .await
        .unwrap();

    assert_eq!(completion_marks(&db, &user, "日").await, 1);

    let kanji = progress_ops::kanji_progress(&db, &user).await.unwrap();
    assert_eq!(kanji.completed, 1);

    let words = progress_ops::word_progress(&db, &user).await.unwrap();
    assert_eq!(words.total_words, 3);
    assert_eq!(words.kanji_with_words, 1);
    assert_eq!(words.avg_words_per_kanji, 3.0);
}

#[tokio::test]
async fn duplicate_word_maps_to_conflict_and_leaves_count_alone() {
    let Some(db) = test_db().await else { return };
    let user = fresh_user(&db).await;
    seed_kanji(&db, "日").await;

    word_ops::log_word(&db, &user, "日", "日本", None, None)
        .await
        .unwrap();

    let err = word_ops::log_word(&db, &user, "日", "日本", None, None)
        .await
        .unwrap_err();
    let app_err = AppError::from(err);
    assert_eq!(app_err.status(), StatusCode::CONFLICT);

    let words = progress_ops::word_progress(&db, &user).await.unwrap();
    assert_eq!(words.total_words, 1);
}

#[tokio::test]
async fn daily_activity_is_a_zero_filled_series() {
    let Some(db) = test_db().await else { return };
    let user = fresh_user(&db).await;
    seed_kanji(&db, "日").await;

    backdated_word(&db, &user, "日", "日帰り", 3).await;

    let series = progress_ops::daily_activity(&db, &user, 7).await.unwrap();
    assert_eq!(series.len(), 8);

    // Ascending, one entry per day, only day-3 has activity.
    let target = Utc::now().date_naive() - Duration::days(3);
    for window in series.windows(2) {
        assert!(window[0].date < window[1].date);
    }
    for entry in &series {
        let expected = if entry.date == target { 1 } else { 0 };
        assert_eq!(entry.words_logged, expected, "on {}", entry.date);
    }
}

#[tokio::test]
async fn completion_mark_is_idempotent_and_threshold_gated() {
    let Some(db) = test_db().await else { return };
    let user = fresh_user(&db).await;
    seed_kanji(&db, "月").await;

    word_ops::log_word(&db, &user, "月", "月曜", None, None)
        .await
        .unwrap();

    // Below the threshold the call is a no-op.
    progress_ops::mark_completion(&db, &user, "月").await.unwrap();
    assert_eq!(completion_marks(&db, &user, "月").await, 0);

    word_ops::log_word(&db, &user, "月", "満月", None, None)
        .await
        .unwrap();
    word_ops::log_word(&db, &user, "月", "月見", None, None)
        .await
        .unwrap();

    progress_ops::mark_completion(&db, &user, "月").await.unwrap();
    progress_ops::mark_completion(&db, &user, "月").await.unwrap();
    assert_eq!(completion_marks(&db, &user, "月").await, 1);

    // Reset clears the derived marks but never the words.
    progress_ops::reset_progress(&db, &user).await.unwrap();
    assert_eq!(completion_marks(&db, &user, "月").await, 0);
    let words = progress_ops::word_progress(&db, &user).await.unwrap();
    assert_eq!(words.total_words, 3);
}

#[tokio::test]
async fn current_streak_requires_activity_today() {
    let Some(db) = test_db().await else { return };
    seed_kanji(&db, "火").await;

    let active_today = fresh_user(&db).await;
    word_ops::log_word(&db, &active_today, "火", "火曜", None, None)
        .await
        .unwrap();

    let streak = progress_ops::learning_streak(&db, &active_today)
        .await
        .unwrap();
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.longest_streak, 1);

    // Activity three days ago counts toward the longest run only.
    let lapsed = fresh_user(&db).await;
    backdated_word(&db, &lapsed, "火", "花火", 3).await;

    let streak = progress_ops::learning_streak(&db, &lapsed).await.unwrap();
    assert_eq!(streak.current_streak, 0);
    assert_eq!(streak.longest_streak, 1);
}
