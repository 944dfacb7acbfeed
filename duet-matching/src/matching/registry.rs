use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use super::deck::SwipeDeck;

struct DeckEntry {
    built_at: DateTime<Utc>,
    deck: Arc<Mutex<SwipeDeck>>,
}

/// Live swipe decks, one per viewer profile id.
///
/// A deck lives for `ttl` after it was built. Expired decks are dropped on
/// lookup and swept whenever another deck is installed, so viewers who never
/// come back do not keep their cards in memory.
pub struct DeckRegistry {
    ttl: Duration,
    decks: RwLock<HashMap<String, DeckEntry>>,
}

impl DeckRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            decks: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, viewer_id: &str) -> Option<Arc<Mutex<SwipeDeck>>> {
        self.get_at(viewer_id, Utc::now()).await
    }

    /// Replaces the viewer's deck and sweeps expired ones.
    pub async fn install(&self, deck: SwipeDeck) -> Arc<Mutex<SwipeDeck>> {
        self.install_at(deck, Utc::now()).await
    }

    fn is_live(&self, entry: &DeckEntry, now: DateTime<Utc>) -> bool {
        now - entry.built_at < self.ttl
    }

    async fn get_at(&self, viewer_id: &str, now: DateTime<Utc>) -> Option<Arc<Mutex<SwipeDeck>>> {
        {
            let decks = self.decks.read().await;
            match decks.get(viewer_id) {
                None => return None,
                Some(entry) if self.is_live(entry, now) => return Some(entry.deck.clone()),
                Some(_) => {}
            }
        }

        let mut decks = self.decks.write().await;
        // Rebuilt between the two locks.
        if let Some(entry) = decks.get(viewer_id) {
            if self.is_live(entry, now) {
                return Some(entry.deck.clone());
            }
        }
        decks.remove(viewer_id);
        tracing::debug!(viewer_id, "expired deck dropped");
        None
    }

    async fn install_at(&self, deck: SwipeDeck, now: DateTime<Utc>) -> Arc<Mutex<SwipeDeck>> {
        let viewer_id = deck.viewer_id().to_string();
        let deck = Arc::new(Mutex::new(deck));

        let mut decks = self.decks.write().await;
        let before = decks.len();
        decks.retain(|_, entry| self.is_live(entry, now));
        let swept = before - decks.len();
        if swept > 0 {
            tracing::debug!(swept, "expired decks swept");
        }

        decks.insert(
            viewer_id,
            DeckEntry {
                built_at: now,
                deck: deck.clone(),
            },
        );
        deck
    }
}
