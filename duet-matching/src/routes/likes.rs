use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use duet_shared::errors::AppResult;
use duet_shared::types::api::ApiResponse;
use duet_shared::types::auth::AuthUser;

use crate::matching::matches;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStatus {
    pub already_liked: bool,
    pub liked_you: bool,
}

// GET /likes/check/:target_id
pub async fn check_like(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<String>,
) -> AppResult<Json<ApiResponse<LikeStatus>>> {
    let store = state.store.as_ref();
    let (already_liked, liked_you) = tokio::try_join!(
        matches::has_liked(store, &auth_user.profile_id, &target_id),
        matches::has_liked(store, &target_id, &auth_user.profile_id),
    )?;

    Ok(Json(ApiResponse::ok(LikeStatus {
        already_liked,
        liked_you,
    })))
}
