use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use duet_shared::store::DocumentStore;

use super::engine::{record_swipe, SwipeError, SwipeOutcome};
use crate::models::{Profile, SwipeDirection};

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("no more candidates")]
    Exhausted,

    #[error("a swipe is already in flight")]
    InFlight,

    #[error("swipe on {candidate_id} failed: {source}")]
    Swipe {
        candidate_id: String,
        #[source]
        source: SwipeError,
    },
}

/// The ordered, per-session sequence of not-yet-swiped candidates.
///
/// At most one swipe is in flight at a time. The top card is only popped
/// when the swipe that took it is finished with `advance = true`.
#[derive(Debug)]
pub struct SwipeDeck {
    viewer_id: String,
    cards: VecDeque<Profile>,
    in_flight: bool,
    built_at: DateTime<Utc>,
}

impl SwipeDeck {
    pub fn new(viewer_id: impl Into<String>, cards: Vec<Profile>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            cards: cards.into(),
            in_flight: false,
            built_at: Utc::now(),
        }
    }

    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn top(&self) -> Option<&Profile> {
        self.cards.front()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Takes the top candidate for swiping and raises the in-flight guard.
    pub fn begin_swipe(&mut self) -> Result<Profile, DeckError> {
        if self.in_flight {
            return Err(DeckError::InFlight);
        }
        let top = self.cards.front().cloned().ok_or(DeckError::Exhausted)?;
        self.in_flight = true;
        Ok(top)
    }

    /// Releases the guard; pops the top candidate when `advance` is set.
    pub fn finish_swipe(&mut self, advance: bool) -> Option<Profile> {
        self.in_flight = false;
        if advance {
            self.cards.pop_front()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckSwipe {
    pub candidate_id: String,
    #[serde(flatten)]
    pub outcome: SwipeOutcome,
    pub remaining: usize,
}

/// Swipes the top card of `deck` on behalf of `viewer`.
///
/// The deck lock is not held while the store is being written. A PASS
/// always advances the deck; a LIKE advances only once its like document is
/// known to be written, so a failed like leaves the candidate on top.
pub async fn swipe_top(
    store: &dyn DocumentStore,
    deck: &Mutex<SwipeDeck>,
    viewer: &Profile,
    direction: SwipeDirection,
) -> Result<DeckSwipe, DeckError> {
    let candidate = deck.lock().await.begin_swipe()?;

    let result = record_swipe(store, viewer, &candidate, direction).await;

    let advance = match &result {
        Ok(_) => true,
        Err(e) => direction == SwipeDirection::Pass || e.like_persisted(),
    };
    let remaining = {
        let mut deck = deck.lock().await;
        deck.finish_swipe(advance);
        deck.remaining()
    };

    if let Err(e) = &result {
        tracing::warn!(
            viewer_id = %viewer.id,
            candidate_id = %candidate.id,
            advanced = advance,
            error = %e,
            "swipe failed"
        );
    }

    match result {
        Ok(outcome) => Ok(DeckSwipe {
            candidate_id: candidate.id,
            outcome,
            remaining,
        }),
        Err(source) => Err(DeckError::Swipe {
            candidate_id: candidate.id,
            source,
        }),
    }
}
