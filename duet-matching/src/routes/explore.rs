use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use validator::Validate;

use duet_shared::errors::{AppError, AppResult};
use duet_shared::types::api::ApiResponse;
use duet_shared::types::auth::AuthUser;

use crate::matching::{load_singles, SinglesFilters};
use crate::models::Profile;
use crate::services::profile_service;
use crate::AppState;

/// POST /explore
///
/// Lists singles through the given filters. Without a body the caller's
/// saved preferences are used.
pub async fn explore_singles(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    filters: Option<Json<SinglesFilters>>,
) -> AppResult<Json<ApiResponse<Vec<Profile>>>> {
    let viewer =
        profile_service::require_profile(state.store.as_ref(), &auth_user.profile_id).await?;

    let filters = match filters {
        Some(Json(filters)) => filters,
        None => SinglesFilters::from_preferences(&viewer),
    };
    filters
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let singles = load_singles(state.store.as_ref()).await?;
    let results = filters.apply(&viewer, singles);

    tracing::debug!(viewer_id = %viewer.id, results = results.len(), "singles explored");
    Ok(Json(ApiResponse::ok(results)))
}
