use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::operations::kanji as kanji_ops;
use crate::db::operations::kanji::{JlptLevelCount, PaginatedKanji};
use crate::response::AppError;
use crate::routes::require_db;
use crate::services::jisho::{KanjiData, PhraseResult};
use crate::state::AppState;

const DEFAULT_JLPT_LIMIT: usize = 20;
const MAX_JLPT_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    jlpt_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JlptQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
pub(crate) struct KanjiResponse<T: Serialize> {
    success: bool,
    data: T,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<KanjiResponse<PaginatedKanji>>, AppError> {
    let db = require_db(&state)?;

    let kanji = kanji_ops::list_kanji(
        db.as_ref(),
        query.page.unwrap_or(1),
        query.limit.unwrap_or(20),
        query.jlpt_level.as_deref(),
    )
    .await?;

    Ok(Json(KanjiResponse {
        success: true,
        data: kanji,
    }))
}

pub async fn levels(
    State(state): State<AppState>,
) -> Result<Json<KanjiResponse<Vec<JlptLevelCount>>>, AppError> {
    let db = require_db(&state)?;

    let levels = kanji_ops::jlpt_levels(db.as_ref()).await?;

    Ok(Json(KanjiResponse {
        success: true,
        data: levels,
    }))
}

/// Read-through lookup. A fresh stored row answers directly; otherwise the
/// dictionary is queried and the row upserted. When the dictionary is down a
/// stale row is still served rather than failing the request.
pub async fn get_one(
    State(state): State<AppState>,
    Path(character): Path<String>,
) -> Result<Json<KanjiResponse<KanjiData>>, AppError> {
    let db = require_db(&state)?;

    let character = character.trim();
    if character.chars().count() != 1 {
        return Err(AppError::validation("character must be a single kanji"));
    }

    if let Some(record) = kanji_ops::get_fresh_kanji(db.as_ref(), character).await? {
        return Ok(Json(KanjiResponse {
            success: true,
            data: record.as_kanji_data(),
        }));
    }

    match state.jisho().lookup_kanji(character).await {
        Ok(data) => {
            kanji_ops::upsert_kanji(db.as_ref(), &data).await?;
            Ok(Json(KanjiResponse {
                success: true,
                data,
            }))
        }
        Err(err) => {
            if let Some(stale) = kanji_ops::get_kanji(db.as_ref(), character).await? {
                return Ok(Json(KanjiResponse {
                    success: true,
                    data: stale.as_kanji_data(),
                }));
            }
            Err(err.into())
        }
    }
}

pub async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
) -> Result<Json<KanjiResponse<Vec<PhraseResult>>>, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::validation("search query is required"));
    }

    let results = state.jisho().search_phrase(query).await?;

    Ok(Json(KanjiResponse {
        success: true,
        data: results,
    }))
}

pub async fn by_jlpt_level(
    State(state): State<AppState>,
    Path(level): Path<String>,
    Query(query): Query<JlptQuery>,
) -> Result<Json<KanjiResponse<Vec<KanjiData>>>, AppError> {
    let level = level.trim().to_uppercase();
    if !matches!(level.as_str(), "N1" | "N2" | "N3" | "N4" | "N5") {
        return Err(AppError::validation("level must be one of N1-N5"));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_JLPT_LIMIT)
        .clamp(1, MAX_JLPT_LIMIT);

    let kanji = state.jisho().kanji_by_jlpt_level(&level, limit).await?;

    Ok(Json(KanjiResponse {
        success: true,
        data: kanji,
    }))
}
