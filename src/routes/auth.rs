use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::operations::users;
use crate::db::operations::users::UserRecord;
use crate::response::AppError;
use crate::routes::require_db;
use crate::state::AppState;

const BCRYPT_COST: u32 = 10;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_USERNAME_LENGTH: usize = 50;

#[derive(Debug, Deserialize)]
pub(crate) struct SignupRequest {
    username: String,
    password: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub(crate) struct AuthResponse {
    success: bool,
    data: AuthData,
}

#[derive(Serialize)]
pub(crate) struct AuthData {
    user: UserRecord,
    token: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let db = require_db(&state)?;

    let username = req.username.trim();
    if username.is_empty() || username.len() > MAX_USERNAME_LENGTH {
        return Err(AppError::validation("username must be 1-50 characters"));
    }
    if req.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(
            "password must be at least 8 characters",
        ));
    }

    if users::username_taken(db.as_ref(), username).await? {
        return Err(AppError::conflict("username already taken"));
    }

    let password_hash = bcrypt::hash(&req.password, BCRYPT_COST)
        .map_err(|err| AppError::internal(err.to_string()))?;

    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let user = users::create_user(
        db.as_ref(),
        username,
        &password_hash,
        name.unwrap_or(username),
    )
    .await?;

    let token = crate::auth::sign_jwt_for_user(&user.id)
        .map_err(|err| AppError::internal(err.to_string()))?;

    Ok(Json(AuthResponse {
        success: true,
        data: AuthData { user, token },
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let db = require_db(&state)?;

    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("username and password are required"));
    }

    let Some(credentials) = users::find_credentials_by_username(db.as_ref(), username).await?
    else {
        // Same message as a wrong password so usernames cannot be probed.
        return Err(AppError::unauthorized("invalid username or password"));
    };

    let verified = bcrypt::verify(&req.password, &credentials.password_hash)
        .map_err(|err| AppError::internal(err.to_string()))?;
    if !verified {
        return Err(AppError::unauthorized("invalid username or password"));
    }

    let token = crate::auth::sign_jwt_for_user(&credentials.id)
        .map_err(|err| AppError::internal(err.to_string()))?;

    Ok(Json(AuthResponse {
        success: true,
        data: AuthData {
            user: UserRecord {
                id: credentials.id,
                username: credentials.username,
                name: credentials.name,
                profile_picture: credentials.profile_picture,
                created_at: credentials.created_at,
            },
            token,
        },
    }))
}
