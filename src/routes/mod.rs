mod auth;
mod health;
mod kanji;
mod profile;
mod progress;
mod words;

use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::auth::AuthUser;
use crate::db::Database;
use crate::response::{json_error, AppError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/profile", get(profile::get_profile))
        .route("/api/profile", put(profile::update_profile))
        .route("/api/words", get(words::list).post(words::log_word))
        .route("/api/words/recent", get(words::recent))
        .route("/api/words/kanji/:character", get(words::for_kanji))
        .route("/api/words/:id", put(words::update).delete(words::remove))
        .route("/api/kanji", get(kanji::list))
        .route("/api/kanji/levels", get(kanji::levels))
        .route("/api/kanji/search/:query", get(kanji::search))
        .route("/api/kanji/jlpt/:level", get(kanji::by_jlpt_level))
        .route("/api/kanji/:character", get(kanji::get_one))
        .route("/api/progress", get(progress::overview))
        .route("/api/progress", delete(progress::reset))
        .route("/api/progress/kanji", get(progress::kanji_progress))
        .route("/api/progress/words", get(progress::word_progress))
        .route("/api/progress/jlpt", get(progress::jlpt_progress))
        .route("/api/progress/streak", get(progress::streak))
        .route("/api/progress/daily", get(progress::daily))
        .route("/api/progress/achievements", get(progress::achievements))
        .route(
            "/api/progress/complete/:character",
            post(progress::mark_complete),
        )
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "route not found")
}

/// Database handle or 503 when the pool never came up.
pub(crate) fn require_db(state: &AppState) -> Result<Arc<Database>, AppError> {
    state
        .db()
        .ok_or_else(|| AppError::service_unavailable("database unavailable"))
}

/// Bearer-token authentication for protected handlers. Resolves the database
/// and the token's user in one step.
pub(crate) async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Arc<Database>, AuthUser), AppError> {
    let token = crate::auth::extract_token(headers)
        .ok_or_else(|| AppError::unauthorized("authentication token required"))?;

    let db = require_db(state)?;

    let user = crate::auth::verify_request_token(db.as_ref(), &token)
        .await
        .map_err(|_| AppError::unauthorized("invalid or expired token"))?;

    Ok((db, user))
}
