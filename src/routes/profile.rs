use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::db::operations::users;
use crate::db::operations::users::ProfileStats;
use crate::response::AppError;
use crate::routes::authenticate;
use crate::state::AppState;

#[derive(Serialize)]
pub(crate) struct ProfileResponse {
    success: bool,
    data: ProfileData,
}

#[derive(Serialize)]
pub(crate) struct ProfileData {
    user: AuthUser,
    stats: ProfileStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateProfileRequest {
    name: Option<String>,
    profile_picture: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let stats = users::profile_stats(db.as_ref(), &user.id).await?;

    Ok(Json(ProfileResponse {
        success: true,
        data: ProfileData { user, stats },
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let (db, user) = authenticate(&state, &headers).await?;

    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if req.name.is_some() && name.is_none() {
        return Err(AppError::validation("name must not be blank"));
    }

    users::update_profile(db.as_ref(), &user.id, name, req.profile_picture.as_deref()).await?;

    let user = AuthUser {
        name: name.map(str::to_string).unwrap_or(user.name),
        profile_picture: req.profile_picture.or(user.profile_picture),
        ..user
    };
    let stats = users::profile_stats(db.as_ref(), &user.id).await?;

    Ok(Json(ProfileResponse {
        success: true,
        data: ProfileData { user, stats },
    }))
}
