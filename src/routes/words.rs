use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::db::operations::kanji as kanji_ops;
use crate::db::operations::progress as progress_ops;
use crate::db::operations::words as word_ops;
use crate::db::operations::words::{PaginatedWords, WordEntry};
use crate::response::AppError;
use crate::routes::authenticate;
use crate::services::jisho::JishoError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LogWordRequest {
    kanji_character: String,
    word: String,
    reading: Option<String>,
    meanings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateWordRequest {
    word: Option<String>,
    reading: Option<String>,
    meanings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LimitQuery {
    limit: Option<i64>,
}

#[derive(Serialize)]
pub(crate) struct WordResponse {
    success: bool,
    data: WordEntry,
}

#[derive(Serialize)]
pub(crate) struct WordsResponse<T: Serialize> {
    success: bool,
    data: T,
}

/// Logs a new word. The kanji is resolved through the dictionary before
/// anything is written, the word itself is validated against the dictionary
/// (rejections carry suggestions), and the insert plus completion mark run in
/// one transaction.
pub async fn log_word(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LogWordRequest>,
) -> Result<Response, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let kanji_character = req.kanji_character.trim();
    let word = req.word.trim();

    if kanji_character.chars().count() != 1 {
        return Err(AppError::validation(
            "kanjiCharacter must be a single character",
        ));
    }
    if word.is_empty() {
        return Err(AppError::validation("word is required"));
    }
    if !word.contains(kanji_character) {
        return Err(AppError::validation("word must contain the kanji"));
    }

    ensure_kanji_known(&state, db.as_ref(), kanji_character).await?;

    if word_ops::word_exists(db.as_ref(), &user.id, kanji_character, word).await? {
        return Err(AppError::conflict("word already logged for this kanji"));
    }

    let validation = state
        .jisho()
        .lookup_word(word, req.reading.as_deref())
        .await;
    if !validation.is_valid {
        let body = json!({
            "success": false,
            "error": "word not found in dictionary",
            "code": "VALIDATION_ERROR",
            "suggestions": validation.suggestions,
        });
        return Ok((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }

    let entry = word_ops::log_word(
        db.as_ref(),
        &user.id,
        kanji_character,
        word,
        req.reading.as_deref(),
        req.meanings.as_deref(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(WordResponse {
            success: true,
            data: entry,
        }),
    )
        .into_response())
}

/// Makes sure the kanji row exists and is fresh before a word references it.
async fn ensure_kanji_known(
    state: &AppState,
    db: &crate::db::Database,
    character: &str,
) -> Result<(), AppError> {
    if kanji_ops::get_fresh_kanji(db, character).await?.is_some() {
        return Ok(());
    }

    match state.jisho().lookup_kanji(character).await {
        Ok(data) => {
            kanji_ops::upsert_kanji(db, &data).await?;
            Ok(())
        }
        // A stale row is still good enough when the dictionary is down.
        Err(JishoError::Upstream(message)) => {
            if kanji_ops::get_kanji(db, character).await?.is_some() {
                Ok(())
            } else {
                Err(JishoError::Upstream(message).into())
            }
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<WordsResponse<PaginatedWords>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let words = word_ops::list_words(
        db.as_ref(),
        &user.id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(20),
    )
    .await?;

    Ok(Json(WordsResponse {
        success: true,
        data: words,
    }))
}

pub async fn recent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<WordsResponse<Vec<WordEntry>>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let words = word_ops::recent_words(db.as_ref(), &user.id, query.limit.unwrap_or(10)).await?;

    Ok(Json(WordsResponse {
        success: true,
        data: words,
    }))
}

pub async fn for_kanji(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(character): Path<String>,
) -> Result<Json<WordsResponse<Vec<WordEntry>>>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let words = word_ops::words_for_kanji(db.as_ref(), &user.id, &character).await?;

    Ok(Json(WordsResponse {
        success: true,
        data: words,
    }))
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<Uuid>,
    Json(req): Json<UpdateWordRequest>,
) -> Result<Json<WordResponse>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    if req.word.is_none() && req.reading.is_none() && req.meanings.is_none() {
        return Err(AppError::validation("nothing to update"));
    }
    if let Some(word) = req.word.as_deref() {
        if word.trim().is_empty() {
            return Err(AppError::validation("word must not be blank"));
        }
    }

    let entry = word_ops::update_word(
        db.as_ref(),
        &user.id,
        &word_id,
        req.word.as_deref(),
        req.reading.as_deref(),
        req.meanings.as_deref(),
    )
    .await?
    .ok_or_else(|| AppError::not_found("word not found"))?;

    Ok(Json(WordResponse {
        success: true,
        data: entry,
    }))
}

/// Removing a word can drop the kanji back under the completion threshold, so
/// the derived mark is cleared when that happens.
pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(word_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let kanji_character = word_ops::delete_word(db.as_ref(), &user.id, &word_id)
        .await?
        .ok_or_else(|| AppError::not_found("word not found"))?;

    progress_ops::unmark_completion_if_below_threshold(db.as_ref(), &user.id, &kanji_character)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "word deleted",
    })))
}
