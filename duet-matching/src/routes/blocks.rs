use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use duet_shared::errors::AppResult;
use duet_shared::types::api::ApiResponse;
use duet_shared::types::auth::AuthUser;

use crate::services::profile_service;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedList {
    pub blocked_user_ids: Vec<String>,
}

// POST /blocks/:profile_id
pub async fn block(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> AppResult<Json<ApiResponse<BlockedList>>> {
    let blocked_user_ids =
        profile_service::block_profile(state.store.as_ref(), &auth_user.profile_id, &profile_id)
            .await?;
    Ok(Json(ApiResponse::ok(BlockedList { blocked_user_ids })))
}

// DELETE /blocks/:profile_id
pub async fn unblock(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<String>,
) -> AppResult<Json<ApiResponse<BlockedList>>> {
    let blocked_user_ids =
        profile_service::unblock_profile(state.store.as_ref(), &auth_user.profile_id, &profile_id)
            .await?;
    Ok(Json(ApiResponse::ok(BlockedList { blocked_user_ids })))
}
