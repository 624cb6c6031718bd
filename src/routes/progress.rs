use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::operations::progress as progress_ops;
use crate::db::operations::progress::{
    DailyActivity, JlptLevelProgress, KanjiProgress, LearningStreak, WordProgress,
};
use crate::response::AppError;
use crate::routes::authenticate;
use crate::services::progress as progress_service;
use crate::services::progress::{Achievement, ProgressOverview};
use crate::state::AppState;

const DEFAULT_ACTIVITY_DAYS: i32 = 30;
const MAX_ACTIVITY_DAYS: i32 = 365;

#[derive(Debug, Deserialize)]
pub(crate) struct DailyQuery {
    days: Option<i32>,
}

#[derive(Serialize)]
pub(crate) struct ProgressResponse<T: Serialize> {
    success: bool,
    data: T,
}

pub async fn overview(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProgressResponse<ProgressOverview>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let overview = progress_service::user_progress_overview(db.as_ref(), &user.id).await?;

    Ok(Json(ProgressResponse {
        success: true,
        data: overview,
    }))
}

pub async fn kanji_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProgressResponse<KanjiProgress>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;
    let data = progress_ops::kanji_progress(db.as_ref(), &user.id).await?;
    Ok(Json(ProgressResponse {
        success: true,
        data,
    }))
}

pub async fn word_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProgressResponse<WordProgress>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;
    let data = progress_ops::word_progress(db.as_ref(), &user.id).await?;
    Ok(Json(ProgressResponse {
        success: true,
        data,
    }))
}

pub async fn jlpt_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProgressResponse<Vec<JlptLevelProgress>>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;
    let data = progress_ops::progress_by_jlpt_level(db.as_ref(), &user.id).await?;
    Ok(Json(ProgressResponse {
        success: true,
        data,
    }))
}

pub async fn streak(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProgressResponse<LearningStreak>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;
    let data = progress_ops::learning_streak(db.as_ref(), &user.id).await?;
    Ok(Json(ProgressResponse {
        success: true,
        data,
    }))
}

pub async fn daily(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DailyQuery>,
) -> Result<Json<ProgressResponse<Vec<DailyActivity>>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let days = query
        .days
        .unwrap_or(DEFAULT_ACTIVITY_DAYS)
        .clamp(1, MAX_ACTIVITY_DAYS);

    let data = progress_ops::daily_activity(db.as_ref(), &user.id, days).await?;

    Ok(Json(ProgressResponse {
        success: true,
        data,
    }))
}

pub async fn achievements(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProgressResponse<Vec<Achievement>>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;
    let data = progress_service::user_achievements(db.as_ref(), &user.id).await?;
    Ok(Json(ProgressResponse {
        success: true,
        data,
    }))
}

/// Re-checks the threshold and records the completion mark. Safe to call
/// repeatedly; a call before the threshold is a no-op.
pub async fn mark_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(character): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let character = character.trim();
    if character.chars().count() != 1 {
        return Err(AppError::validation("character must be a single kanji"));
    }

    progress_ops::mark_completion(db.as_ref(), &user.id, character).await?;

    Ok(Json(json!({
        "success": true,
        "message": "completion recorded if threshold reached",
    })))
}

/// Clears completion marks only. Words stay, so progress rebuilds as the user
/// keeps logging.
pub async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    progress_ops::reset_progress(db.as_ref(), &user.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "progress reset",
    })))
}
