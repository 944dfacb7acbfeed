use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use duet_shared::errors::{AppError, AppResult, ErrorCode};
use duet_shared::types::api::ApiResponse;
use duet_shared::types::auth::AuthUser;

use super::deck_error;
use crate::events::publisher;
use crate::matching::{load_candidate_pool, swipe_top, DeckError, DeckSwipe, SwipeDeck};
use crate::models::{Match, Profile, SwipeDirection};
use crate::services::profile_service;
use crate::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckView {
    pub top: Option<Profile>,
    pub remaining: usize,
    pub exhausted: bool,
    pub built_at: DateTime<Utc>,
}

impl From<&SwipeDeck> for DeckView {
    fn from(deck: &SwipeDeck) -> Self {
        Self {
            top: deck.top().cloned(),
            remaining: deck.remaining(),
            exhausted: deck.is_exhausted(),
            built_at: deck.built_at(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SwipePayload {
    pub direction: SwipeDirection,
}

// ---------------------------------------------------------------------------
// POST /deck
// ---------------------------------------------------------------------------

/// Builds a fresh deck for the caller, replacing any previous one.
pub async fn rebuild_deck(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<DeckView>>> {
    let viewer =
        profile_service::require_profile(state.store.as_ref(), &auth_user.profile_id).await?;

    let mut rng = StdRng::from_entropy();
    let pool = load_candidate_pool(state.store.as_ref(), Some(&viewer), &mut rng).await?;

    tracing::info!(viewer_id = %viewer.id, candidates = pool.len(), "deck built");

    let deck = state.install_deck(SwipeDeck::new(viewer.id, pool)).await;
    let view = DeckView::from(&*deck.lock().await);
    Ok(Json(ApiResponse::ok(view)))
}

// ---------------------------------------------------------------------------
// GET /deck
// ---------------------------------------------------------------------------

pub async fn get_deck(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<DeckView>>> {
    let deck = state
        .deck(&auth_user.profile_id)
        .await
        .ok_or_else(not_built)?;

    let view = DeckView::from(&*deck.lock().await);
    Ok(Json(ApiResponse::ok(view)))
}

// ---------------------------------------------------------------------------
// POST /deck/swipe
// ---------------------------------------------------------------------------

/// Swipes the top card of the caller's deck.
///
/// The swipe runs on its own task so that a dropped connection cannot
/// abandon it between the like write and the match transaction.
pub async fn swipe(
    auth_user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SwipePayload>,
) -> AppResult<Json<ApiResponse<DeckSwipe>>> {
    let deck = state
        .deck(&auth_user.profile_id)
        .await
        .ok_or_else(not_built)?;
    let viewer =
        profile_service::require_profile(state.store.as_ref(), &auth_user.profile_id).await?;
    let direction = payload.direction;

    let task_state = state.clone();
    let result = tokio::spawn(async move {
        let result = swipe_top(task_state.store.as_ref(), &deck, &viewer, direction).await;
        publish_swipe_events(&task_state, &viewer, direction, &result).await;
        result
    })
    .await
    .map_err(|e| AppError::internal(format!("swipe task failed: {e}")))?;

    let swipe = result.map_err(deck_error)?;
    Ok(Json(ApiResponse::ok(swipe)))
}

/// The candidate whose like document was written by this swipe, whether or
/// not the rest of the swipe went through.
fn liked_candidate(
    direction: SwipeDirection,
    result: &Result<DeckSwipe, DeckError>,
) -> Option<&str> {
    match result {
        Ok(swipe) if direction == SwipeDirection::Like => Some(&swipe.candidate_id),
        Err(DeckError::Swipe {
            candidate_id,
            source,
        }) if source.like_persisted() => Some(candidate_id),
        _ => None,
    }
}

async fn publish_swipe_events(
    state: &AppState,
    viewer: &Profile,
    direction: SwipeDirection,
    result: &Result<DeckSwipe, DeckError>,
) {
    let Some(rabbitmq) = state.rabbitmq.as_ref() else {
        return;
    };
    let context = viewer.like_context();

    if let Some(candidate_id) = liked_candidate(direction, result) {
        publisher::publish_like_sent(rabbitmq, &viewer.id, candidate_id, context).await;
    }

    let Ok(swipe) = result else {
        return;
    };
    if let (true, Some(match_id)) = (swipe.outcome.match_created, &swipe.outcome.match_id) {
        publisher::publish_match_created(
            rabbitmq,
            match_id,
            Match::sorted_pair(&viewer.id, &swipe.candidate_id),
            context,
            &viewer.id,
        )
        .await;
    }
}

fn not_built() -> AppError {
    AppError::new(ErrorCode::DeckNotBuilt, "no deck has been built for this profile")
}
