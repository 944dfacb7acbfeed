use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use duet_shared::errors::{AppError, AppResult, ErrorCode};
use duet_shared::store::StoreError;
use duet_shared::types::api::ApiResponse;
use duet_shared::types::auth::AuthUser;

use crate::matching::matches;
use crate::models::Match;
use crate::AppState;

// GET /matches
pub async fn list(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Match>>>> {
    let list = matches::list_matches(state.store.as_ref(), &auth_user.profile_id).await?;
    Ok(Json(ApiResponse::ok(list)))
}

// GET /matches/with/:profile_id
pub async fn with_profile(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> AppResult<Json<ApiResponse<Match>>> {
    let found = matches::find_match(state.store.as_ref(), &auth_user.profile_id, &profile_id)
        .await?
        .ok_or_else(match_not_found)?;
    Ok(Json(ApiResponse::ok(found)))
}

// POST /matches/:match_id/activity
pub async fn touch_activity(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<String>,
) -> AppResult<Json<ApiResponse<Match>>> {
    let store = state.store.as_ref();

    let existing = matches::get_match(store, &match_id)
        .await?
        .ok_or_else(match_not_found)?;
    if !existing.involves(&auth_user.profile_id) {
        return Err(AppError::forbidden("not a participant of this match"));
    }

    matches::record_activity(store, &match_id)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { .. } => match_not_found(),
            other => AppError::from(other),
        })?;

    let updated = matches::get_match(store, &match_id)
        .await?
        .ok_or_else(match_not_found)?;
    Ok(Json(ApiResponse::ok(updated)))
}

fn match_not_found() -> AppError {
    AppError::new(ErrorCode::MatchNotFound, "match not found")
}
