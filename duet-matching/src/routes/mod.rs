pub mod blocks;
pub mod deck;
pub mod explore;
pub mod health;
pub mod likes;
pub mod matches;
pub mod preferences;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use serde_json::json;

use duet_shared::errors::{AppError, ErrorCode};
use duet_shared::store::StoreError;

use crate::matching::{DeckError, SwipeError};
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/deck", get(deck::get_deck).post(deck::rebuild_deck))
        .route("/deck/swipe", post(deck::swipe))
        .route("/explore", post(explore::explore_singles))
        .route("/matches", get(matches::list))
        .route("/matches/with/:profile_id", get(matches::with_profile))
        .route("/matches/:match_id/activity", post(matches::touch_activity))
        .route("/likes/check/:target_id", get(likes::check_like))
        .route(
            "/blocks/:profile_id",
            post(blocks::block).delete(blocks::unblock),
        )
        .route("/preferences", put(preferences::update_preferences))
        .with_state(state)
}

/// Swipe failures as API errors. Details always carry `isMatch: false`,
/// whether the like was kept and whether the swipe may be repeated.
pub(crate) fn swipe_error(err: SwipeError) -> AppError {
    let details = json!({
        "isMatch": false,
        "likePersisted": err.like_persisted(),
        "retryable": err.is_retryable(),
    });

    match &err {
        SwipeError::SelfSwipe => AppError::new(ErrorCode::CannotSwipeSelf, err.to_string()),
        SwipeError::Like(source) => AppError::with_details(
            store_code(source),
            "like was not recorded, please retry",
            details,
        ),
        SwipeError::ReverseCheck(_) | SwipeError::MatchPending { .. } => AppError::with_details(
            ErrorCode::MatchPending,
            "like recorded, match check did not complete",
            details,
        ),
    }
}

pub(crate) fn deck_error(err: DeckError) -> AppError {
    match err {
        DeckError::Exhausted => AppError::new(ErrorCode::DeckExhausted, "no more candidates"),
        DeckError::InFlight => {
            AppError::new(ErrorCode::SwipeInFlight, "a swipe is already in progress")
        }
        DeckError::Swipe { source, .. } => swipe_error(source),
    }
}

fn store_code(err: &StoreError) -> ErrorCode {
    match err {
        StoreError::Unavailable(_) => ErrorCode::ServiceUnavailable,
        StoreError::Conflict { .. } => ErrorCode::StoreConflict,
        _ => ErrorCode::InternalError,
    }
}
