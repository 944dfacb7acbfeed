use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use duet_shared::errors::{AppError, AppResult};
use duet_shared::types::api::ApiResponse;
use duet_shared::types::auth::AuthUser;

use crate::models::{AgeRange, Gender, SearchPreferences};
use crate::services::profile_service;
use crate::AppState;

/// Body of `PUT /preferences`. Decoded strictly: an unknown enum value or a
/// wrongly typed field rejects the request instead of being dropped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    #[serde(default)]
    pub auto_apply_on_explore: bool,
    #[serde(default)]
    pub auto_apply_on_singles_explore: bool,
    #[serde(default)]
    pub auto_apply_on_singles_swipe: bool,
    #[serde(default)]
    pub looking_for_couples: bool,
    #[serde(default)]
    pub looking_for_single_women: bool,
    #[serde(default)]
    pub looking_for_single_men: bool,
    #[serde(default)]
    pub looking_for_groups: bool,
    #[serde(default)]
    pub preferred_age_ranges: Vec<AgeRange>,
    #[serde(default)]
    pub preferred_orientation_tags: Vec<String>,
    #[serde(default)]
    pub preferred_genders: Vec<Gender>,
    #[serde(default)]
    pub preferred_regions: Vec<String>,
    #[serde(default)]
    pub prefer_same_region: bool,
    #[serde(default)]
    pub preferred_interests: Vec<String>,
    #[serde(default)]
    pub only_verified: bool,
    #[serde(default)]
    pub only_with_photo: bool,
}

impl From<UpdatePreferencesRequest> for SearchPreferences {
    fn from(req: UpdatePreferencesRequest) -> Self {
        Self {
            auto_apply_on_explore: req.auto_apply_on_explore,
            auto_apply_on_singles_explore: req.auto_apply_on_singles_explore,
            auto_apply_on_singles_swipe: req.auto_apply_on_singles_swipe,
            looking_for_couples: req.looking_for_couples,
            looking_for_single_women: req.looking_for_single_women,
            looking_for_single_men: req.looking_for_single_men,
            looking_for_groups: req.looking_for_groups,
            preferred_age_ranges: req.preferred_age_ranges,
            preferred_orientation_tags: req.preferred_orientation_tags,
            preferred_genders: req.preferred_genders,
            preferred_regions: req.preferred_regions,
            prefer_same_region: req.prefer_same_region,
            preferred_interests: req.preferred_interests,
            only_verified: req.only_verified,
            only_with_photo: req.only_with_photo,
        }
    }
}

// PUT /preferences
pub async fn update_preferences(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdatePreferencesRequest>, JsonRejection>,
) -> AppResult<Json<ApiResponse<SearchPreferences>>> {
    let Json(request) = payload.map_err(|e| AppError::validation(e.body_text()))?;

    let saved = profile_service::update_search_preferences(
        state.store.as_ref(),
        &auth_user.profile_id,
        request.into(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(saved)))
}
