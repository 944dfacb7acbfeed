//! Mutual-like detection and match creation.
//!
//! A LIKE is written as `likes/{from}_{to}` first, then the reverse like is
//! read, and only when it exists is the match document created or refreshed
//! inside a transaction. Those three steps run strictly in that order.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::json;

use duet_shared::store::{to_fields, DocKey, DocumentStore, StoreError, StoreResult, Transaction};

use crate::models::{collections, Like, LikeContext, Match, Profile, SwipeDirection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeOutcome {
    pub is_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_id: Option<String>,
    /// True only for the swipe that created the match document.
    #[serde(skip)]
    pub match_created: bool,
}

impl SwipeOutcome {
    pub fn no_match() -> Self {
        Self {
            is_match: false,
            match_id: None,
            match_created: false,
        }
    }

    fn matched(match_id: String, match_created: bool) -> Self {
        Self {
            is_match: true,
            match_id: Some(match_id),
            match_created,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SwipeError {
    #[error("a profile cannot swipe on itself")]
    SelfSwipe,

    #[error("like was not recorded: {0}")]
    Like(#[source] StoreError),

    #[error("like recorded, reverse like lookup failed: {0}")]
    ReverseCheck(#[source] StoreError),

    #[error("like recorded, match {match_id} not written: {source}")]
    MatchPending {
        match_id: String,
        #[source]
        source: StoreError,
    },
}

impl SwipeError {
    /// Whether the directed like was durably written before the failure.
    /// Likes are never rolled back, so the swipe itself is not lost.
    pub fn like_persisted(&self) -> bool {
        matches!(self, Self::ReverseCheck(_) | Self::MatchPending { .. })
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SelfSwipe => false,
            Self::Like(e) | Self::ReverseCheck(e) => e.is_retryable(),
            Self::MatchPending { source, .. } => source.is_retryable(),
        }
    }

    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::SelfSwipe => None,
            Self::Like(e) | Self::ReverseCheck(e) => Some(e),
            Self::MatchPending { source, .. } => Some(source),
        }
    }
}

/// Records one swipe from `from` on `to`.
///
/// PASS writes nothing. LIKE upserts the directed like (replays overwrite
/// it), then creates the match for the pair if the reverse like exists, or
/// refreshes its `lastActivityAt` if the match is already there.
pub async fn record_swipe(
    store: &dyn DocumentStore,
    from: &Profile,
    to: &Profile,
    direction: SwipeDirection,
) -> Result<SwipeOutcome, SwipeError> {
    if from.id == to.id {
        return Err(SwipeError::SelfSwipe);
    }

    counter!("duet_swipes_total", "direction" => direction.as_str()).increment(1);

    if direction == SwipeDirection::Pass {
        tracing::debug!(from_id = %from.id, to_id = %to.id, "pass");
        return Ok(SwipeOutcome::no_match());
    }

    let context = from.like_context();
    let now = Utc::now();
    let like = Like {
        from_profile_id: from.id.clone(),
        to_profile_id: to.id.clone(),
        context,
        created_at: now,
    };

    let like_fields = to_fields(&like).map_err(SwipeError::Like)?;
    store
        .put(collections::LIKES, &like.id(), like_fields, true)
        .await
        .map_err(|e| {
            tracing::warn!(from_id = %from.id, to_id = %to.id, error = %e, "like write failed");
            SwipeError::Like(e)
        })?;

    tracing::info!(
        from_id = %from.id,
        to_id = %to.id,
        context = context.as_str(),
        "like recorded"
    );

    let reverse = store
        .get(collections::LIKES, &Like::key(&to.id, &from.id))
        .await
        .map_err(SwipeError::ReverseCheck)?;
    if reverse.is_none() {
        return Ok(SwipeOutcome::no_match());
    }

    let match_id = Match::canonical_id(&from.id, &to.id);
    tracing::debug!(from_id = %from.id, to_id = %to.id, match_id = %match_id, "reverse like found");

    match upsert_match(store, &match_id, &from.id, &to.id, context, now).await {
        Ok(created) => {
            let outcome = if created { "created" } else { "refreshed" };
            counter!("duet_matches_total", "outcome" => outcome).increment(1);
            tracing::info!(match_id = %match_id, outcome, "match written");
            Ok(SwipeOutcome::matched(match_id, created))
        }
        Err(source) => {
            if matches!(source, StoreError::Conflict { .. }) {
                counter!("duet_store_conflicts_total").increment(1);
            }
            counter!("duet_matches_total", "outcome" => "failed").increment(1);
            tracing::error!(
                match_id = %match_id,
                error = %source,
                "match transaction failed, like kept"
            );
            Err(SwipeError::MatchPending { match_id, source })
        }
    }
}

/// Creates the match document, or only bumps `lastActivityAt` when it
/// already exists. Returns whether this call created it.
async fn upsert_match(
    store: &dyn DocumentStore,
    match_id: &str,
    a: &str,
    b: &str,
    context: LikeContext,
    now: DateTime<Utc>,
) -> StoreResult<bool> {
    let read_set = [DocKey::new(collections::MATCHES, match_id)];
    let mut created = false;

    store
        .transact(&read_set, &mut |txn: &mut Transaction| {
            if txn.get(collections::MATCHES, match_id)?.is_some() {
                created = false;
                let refresh = to_fields(&json!({ "lastActivityAt": now }))?;
                return txn.update(collections::MATCHES, match_id, refresh);
            }

            created = true;
            let record = Match {
                id: match_id.to_string(),
                profile_ids: Match::sorted_pair(a, b),
                context,
                created_at: now,
                last_activity_at: now,
            };
            txn.set(collections::MATCHES, match_id, to_fields(&record)?)
        })
        .await?;

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use duet_shared::store::MemoryStore;

    use crate::models::AccountType;
    use crate::testing::{single, FlakyStore};

    async fn like(store: &dyn DocumentStore, from: &Profile, to: &Profile) -> SwipeOutcome {
        record_swipe(store, from, to, SwipeDirection::Like).await.unwrap()
    }

    #[tokio::test]
    async fn repeated_like_keeps_one_document() {
        let store = MemoryStore::new();
        let (a, b) = (single("a"), single("b"));

        assert_eq!(like(&store, &a, &b).await, SwipeOutcome::no_match());
        assert_eq!(like(&store, &a, &b).await, SwipeOutcome::no_match());

        assert_eq!(store.count(collections::LIKES), 1);
        let stored: Like = store
            .get(collections::LIKES, "a_b")
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(stored.from_profile_id, "a");
        assert_eq!(stored.to_profile_id, "b");
        assert_eq!(stored.context, LikeContext::Singles);
    }

    #[tokio::test]
    async fn mutual_likes_create_one_match_in_either_order() {
        for (first, second) in [("a", "b"), ("b", "a")] {
            let store = MemoryStore::new();
            let (x, y) = (single(first), single(second));

            assert!(!like(&store, &x, &y).await.is_match);
            let outcome = like(&store, &y, &x).await;
            assert!(outcome.is_match);
            assert!(outcome.match_created);
            assert_eq!(outcome.match_id.as_deref(), Some("a_b"));

            let again = like(&store, &x, &y).await;
            assert!(again.is_match);
            assert!(!again.match_created);
            assert_eq!(again.match_id.as_deref(), Some("a_b"));

            assert_eq!(store.count(collections::MATCHES), 1);
            let stored: Match = store
                .get(collections::MATCHES, "a_b")
                .await
                .unwrap()
                .unwrap()
                .decode()
                .unwrap();
            assert_eq!(stored.profile_ids, ["a".to_string(), "b".to_string()]);
            assert!(stored.last_activity_at >= stored.created_at);
        }
    }

    #[tokio::test]
    async fn pass_writes_nothing_and_does_not_block_a_later_like() {
        let store = MemoryStore::new();
        let (a, b) = (single("a"), single("b"));

        let outcome = record_swipe(&store, &a, &b, SwipeDirection::Pass).await.unwrap();
        assert_eq!(outcome, SwipeOutcome::no_match());
        assert_eq!(store.count(collections::LIKES), 0);
        assert_eq!(store.count(collections::MATCHES), 0);

        assert!(!like(&store, &a, &b).await.is_match);
        assert_eq!(store.count(collections::LIKES), 1);
        assert!(like(&store, &b, &a).await.is_match);
    }

    #[tokio::test]
    async fn pass_after_one_sided_like_keeps_state() {
        let store = MemoryStore::new();
        let (a, b) = (single("a"), single("b"));

        like(&store, &a, &b).await;
        record_swipe(&store, &b, &a, SwipeDirection::Pass).await.unwrap();

        assert_eq!(store.count(collections::LIKES), 1);
        assert_eq!(store.count(collections::MATCHES), 0);
    }

    #[tokio::test]
    async fn concurrent_reverse_likes_create_a_single_match() {
        let store = MemoryStore::new();
        let (a, b) = (single("a"), single("b"));

        let (ab, ba) = tokio::join!(
            record_swipe(&store, &a, &b, SwipeDirection::Like),
            record_swipe(&store, &b, &a, SwipeDirection::Like),
        );
        let (ab, ba) = (ab.unwrap(), ba.unwrap());

        assert!(ab.is_match && ba.is_match);
        assert_eq!(ab.match_id, ba.match_id);
        assert_eq!(ab.match_id.as_deref(), Some("a_b"));
        assert_eq!(
            [ab.match_created, ba.match_created].iter().filter(|c| **c).count(),
            1
        );
        assert_eq!(store.count(collections::MATCHES), 1);
    }

    #[tokio::test]
    async fn couples_like_in_couples_context() {
        let store = MemoryStore::new();
        let couple = Profile {
            account_type: Some(AccountType::Couple),
            ..single("c")
        };
        like(&store, &couple, &single("s")).await;

        let doc = store.get(collections::LIKES, "c_s").await.unwrap().unwrap();
        assert_eq!(doc.get("context"), Some(&json!("COUPLES")));
    }

    #[tokio::test]
    async fn self_swipe_rejected() {
        let store = MemoryStore::new();
        let a = single("a");
        let err = record_swipe(&store, &a, &a, SwipeDirection::Like).await.unwrap_err();
        assert!(matches!(err, SwipeError::SelfSwipe));
        assert!(!err.is_retryable());
        assert_eq!(store.count(collections::LIKES), 0);
    }

    #[tokio::test]
    async fn failed_like_write_is_retryable_and_not_persisted() {
        let store = FlakyStore::default();
        store.fail_puts.store(true, Ordering::SeqCst);

        let err = record_swipe(&store, &single("a"), &single("b"), SwipeDirection::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, SwipeError::Like(_)));
        assert!(err.is_retryable());
        assert!(!err.like_persisted());
        assert_eq!(store.inner.count(collections::LIKES), 0);
    }

    #[tokio::test]
    async fn failed_match_transaction_keeps_the_like() {
        let store = FlakyStore::default();
        let (a, b) = (single("a"), single("b"));
        like(&store, &b, &a).await;

        store.fail_transactions.store(true, Ordering::SeqCst);
        let err = record_swipe(&store, &a, &b, SwipeDirection::Like).await.unwrap_err();

        assert!(matches!(err, SwipeError::MatchPending { ref match_id, .. } if match_id == "a_b"));
        assert!(err.is_retryable());
        assert!(err.like_persisted());
        assert_eq!(store.inner.count(collections::LIKES), 2);
        assert_eq!(store.inner.count(collections::MATCHES), 0);

        // The match is detected again on the next like.
        store.fail_transactions.store(false, Ordering::SeqCst);
        let outcome = like(&store, &a, &b).await;
        assert!(outcome.match_created);
        assert_eq!(store.inner.count(collections::MATCHES), 1);
    }

    #[tokio::test]
    async fn failed_reverse_lookup_keeps_the_like() {
        let store = FlakyStore::default();
        store.fail_gets.store(true, Ordering::SeqCst);

        let err = record_swipe(&store, &single("a"), &single("b"), SwipeDirection::Like)
            .await
            .unwrap_err();
        assert!(matches!(err, SwipeError::ReverseCheck(_)));
        assert!(err.like_persisted());
        assert_eq!(store.inner.count(collections::LIKES), 1);
    }

    #[tokio::test]
    async fn exhausted_conflicts_surface_as_retryable() {
        let store = MemoryStore::with_max_attempts(1);
        let (a, b) = (single("a"), single("b"));
        like(&store, &a, &b).await;
        like(&store, &b, &a).await;

        // Two refreshes racing on one attempt each: one of them loses.
        let (first, second) = tokio::join!(
            record_swipe(&store, &a, &b, SwipeDirection::Like),
            record_swipe(&store, &b, &a, SwipeDirection::Like),
        );
        let failures: Vec<SwipeError> =
            [first, second].into_iter().filter_map(Result::err).collect();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].is_retryable());
        assert!(failures[0].like_persisted());
        assert!(matches!(
            failures[0].store_error(),
            Some(StoreError::Conflict { attempts: 1 })
        ));
        assert_eq!(store.count(collections::MATCHES), 1);
    }

    /// Needs a live Redis: `REDIS_URL=redis://localhost:6379 cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn concurrent_reverse_likes_on_redis_create_a_single_match() {
        use duet_shared::clients::redis::RedisClient;
        use duet_shared::store::RedisDocumentStore;

        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let client = RedisClient::connect(&url).await.unwrap();
        let prefix = format!("duet-test-{}", Utc::now().timestamp_micros());
        let store = RedisDocumentStore::new(client, prefix, 5);
        let (a, b) = (single("a"), single("b"));

        let (ab, ba) = tokio::join!(
            record_swipe(&store, &a, &b, SwipeDirection::Like),
            record_swipe(&store, &b, &a, SwipeDirection::Like),
        );
        let (ab, ba) = (ab.unwrap(), ba.unwrap());

        assert!(ab.is_match || ba.is_match);
        assert_eq!(
            [ab.match_created, ba.match_created].iter().filter(|c| **c).count(),
            1
        );
        let matches = store
            .query_array_contains(collections::MATCHES, "profileIds", &json!("a"))
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a_b");
    }
}
