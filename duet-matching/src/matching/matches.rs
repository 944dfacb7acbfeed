use chrono::Utc;
use serde_json::json;

use duet_shared::store::{to_fields, DocKey, DocumentStore, StoreResult, Transaction};

use crate::models::{collections, Like, Match};

/// Matches `profile_id` takes part in, most recently active first.
pub async fn list_matches(store: &dyn DocumentStore, profile_id: &str) -> StoreResult<Vec<Match>> {
    let docs = store
        .query_array_contains(collections::MATCHES, "profileIds", &json!(profile_id))
        .await?;

    let mut matches: Vec<Match> = docs
        .iter()
        .filter_map(|doc| match doc.decode::<Match>() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(match_id = %doc.id, error = %e, "skipping undecodable match");
                None
            }
        })
        .collect();
    matches.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
    Ok(matches)
}

pub async fn get_match(store: &dyn DocumentStore, match_id: &str) -> StoreResult<Option<Match>> {
    store
        .get(collections::MATCHES, match_id)
        .await?
        .map(|doc| doc.decode())
        .transpose()
}

/// The match between `a` and `b`, if both have liked each other.
pub async fn find_match(store: &dyn DocumentStore, a: &str, b: &str) -> StoreResult<Option<Match>> {
    get_match(store, &Match::canonical_id(a, b)).await
}

pub async fn has_liked(store: &dyn DocumentStore, from: &str, to: &str) -> StoreResult<bool> {
    Ok(store
        .get(collections::LIKES, &Like::key(from, to))
        .await?
        .is_some())
}

/// Bumps `lastActivityAt` on an existing match. Fails with `NotFound` when
/// there is no such match.
pub async fn record_activity(store: &dyn DocumentStore, match_id: &str) -> StoreResult<()> {
    let read_set = [DocKey::new(collections::MATCHES, match_id)];
    let now = Utc::now();

    store
        .transact(&read_set, &mut |txn: &mut Transaction| {
            let refresh = to_fields(&json!({ "lastActivityAt": now }))?;
            txn.update(collections::MATCHES, match_id, refresh)
        })
        .await?;

    tracing::debug!(match_id = %match_id, "match activity recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use duet_shared::store::{MemoryStore, StoreError};

    use crate::matching::engine::record_swipe;
    use crate::models::{LikeContext, SwipeDirection};
    use crate::testing::single;

    async fn put_match(store: &MemoryStore, a: &str, b: &str, minutes_ago: i64) {
        let at = Utc::now() - Duration::minutes(minutes_ago);
        let record = Match {
            id: Match::canonical_id(a, b),
            profile_ids: Match::sorted_pair(a, b),
            context: LikeContext::Singles,
            created_at: at,
            last_activity_at: at,
        };
        store
            .put(collections::MATCHES, &record.id, to_fields(&record).unwrap(), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn lists_only_own_matches_by_recent_activity() {
        let store = MemoryStore::new();
        put_match(&store, "a", "b", 30).await;
        put_match(&store, "c", "a", 5).await;
        put_match(&store, "b", "c", 1).await;

        let ids: Vec<String> = list_matches(&store, "a")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["a_c", "a_b"]);
    }

    #[tokio::test]
    async fn activity_moves_match_to_front() {
        let store = MemoryStore::new();
        put_match(&store, "a", "b", 30).await;
        put_match(&store, "a", "c", 5).await;

        record_activity(&store, "a_b").await.unwrap();

        let first = list_matches(&store, "a").await.unwrap().remove(0);
        assert_eq!(first.id, "a_b");
        assert!(first.last_activity_at > first.created_at);
    }

    #[tokio::test]
    async fn activity_on_unknown_match_is_not_found() {
        let store = MemoryStore::new();
        let err = record_activity(&store, "x_y").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(store.count(collections::MATCHES), 0);
    }

    #[tokio::test]
    async fn find_and_has_liked_follow_the_engine() {
        let store = MemoryStore::new();
        let (a, b) = (single("a"), single("b"));

        record_swipe(&store, &b, &a, SwipeDirection::Like).await.unwrap();
        assert!(has_liked(&store, "b", "a").await.unwrap());
        assert!(!has_liked(&store, "a", "b").await.unwrap());
        assert!(find_match(&store, "a", "b").await.unwrap().is_none());

        record_swipe(&store, &a, &b, SwipeDirection::Like).await.unwrap();
        let found = find_match(&store, "b", "a").await.unwrap().unwrap();
        assert_eq!(found.id, "a_b");
        assert_eq!(found.other_profile("b"), Some("a"));
    }
}
