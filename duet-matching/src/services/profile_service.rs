use serde_json::{json, Value};
use validator::Validate;

use duet_shared::errors::{AppError, AppResult, ErrorCode};
use duet_shared::store::{to_fields, DocKey, DocumentStore, StoreError, Transaction};

use crate::models::{collections, Profile, SearchPreferences};

/// Loads a profile; `None` before onboarding has created it.
pub async fn load_profile(
    store: &dyn DocumentStore,
    profile_id: &str,
) -> AppResult<Option<Profile>> {
    let Some(doc) = store.get(collections::PROFILES, profile_id).await? else {
        return Ok(None);
    };
    Ok(Some(doc.decode()?))
}

/// Loads the caller's own profile, which every matching action needs.
pub async fn require_profile(store: &dyn DocumentStore, profile_id: &str) -> AppResult<Profile> {
    load_profile(store, profile_id).await?.ok_or_else(|| {
        AppError::new(
            ErrorCode::OnboardingIncomplete,
            "profile has not been created yet",
        )
    })
}

/// Adds `target_id` to the viewer's blocked set. Returns the new set.
pub async fn block_profile(
    store: &dyn DocumentStore,
    viewer_id: &str,
    target_id: &str,
) -> AppResult<Vec<String>> {
    if viewer_id == target_id {
        return Err(AppError::new(ErrorCode::CannotBlockSelf, "cannot block yourself"));
    }
    let blocked = edit_blocked(store, viewer_id, |ids| {
        if !ids.iter().any(|id| id == target_id) {
            ids.push(target_id.to_string());
        }
    })
    .await?;

    tracing::info!(viewer_id = %viewer_id, target_id = %target_id, "profile blocked");
    Ok(blocked)
}

/// Removes `target_id` from the viewer's blocked set. Returns the new set.
pub async fn unblock_profile(
    store: &dyn DocumentStore,
    viewer_id: &str,
    target_id: &str,
) -> AppResult<Vec<String>> {
    let blocked = edit_blocked(store, viewer_id, |ids| ids.retain(|id| id != target_id)).await?;

    tracing::info!(viewer_id = %viewer_id, target_id = %target_id, "profile unblocked");
    Ok(blocked)
}

async fn edit_blocked(
    store: &dyn DocumentStore,
    viewer_id: &str,
    edit: impl Fn(&mut Vec<String>) + Send + Sync,
) -> AppResult<Vec<String>> {
    let read_set = [DocKey::new(collections::PROFILES, viewer_id)];
    let mut result = Vec::new();

    store
        .transact(&read_set, &mut |txn: &mut Transaction| {
            let doc = txn
                .get(collections::PROFILES, viewer_id)?
                .ok_or_else(|| StoreError::NotFound {
                    collection: collections::PROFILES.to_string(),
                    id: viewer_id.to_string(),
                })?;

            let mut ids: Vec<String> = match doc.get("blockedUserIds") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            edit(&mut ids);

            txn.update(
                collections::PROFILES,
                viewer_id,
                to_fields(&json!({ "blockedUserIds": ids }))?,
            )?;
            result = ids;
            Ok(())
        })
        .await
        .map_err(profile_store_error)?;

    Ok(result)
}

/// Validates and stores new search preferences for the viewer.
pub async fn update_search_preferences(
    store: &dyn DocumentStore,
    viewer_id: &str,
    preferences: SearchPreferences,
) -> AppResult<SearchPreferences> {
    preferences
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let fields = to_fields(&json!({ "searchPreferences": preferences }))?;
    let read_set = [DocKey::new(collections::PROFILES, viewer_id)];

    store
        .transact(&read_set, &mut |txn: &mut Transaction| {
            txn.update(collections::PROFILES, viewer_id, fields.clone())
        })
        .await
        .map_err(profile_store_error)?;

    tracing::info!(viewer_id = %viewer_id, "search preferences updated");
    Ok(preferences)
}

fn profile_store_error(err: StoreError) -> AppError {
    match err {
        StoreError::NotFound { .. } => {
            AppError::new(ErrorCode::OnboardingIncomplete, "profile has not been created yet")
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_shared::store::MemoryStore;

    use crate::models::{AgeRange, Gender};
    use crate::testing::{seed, single};

    #[tokio::test]
    async fn block_is_a_set_and_unblock_removes() {
        let store = MemoryStore::new();
        seed(&store, &[single("v")]).await;

        assert_eq!(block_profile(&store, "v", "x").await.unwrap(), vec!["x"]);
        assert_eq!(block_profile(&store, "v", "x").await.unwrap(), vec!["x"]);
        assert_eq!(block_profile(&store, "v", "y").await.unwrap(), vec!["x", "y"]);

        let viewer = require_profile(&store, "v").await.unwrap();
        assert!(viewer.has_blocked("x"));

        assert_eq!(unblock_profile(&store, "v", "x").await.unwrap(), vec!["y"]);
        assert_eq!(unblock_profile(&store, "v", "x").await.unwrap(), vec!["y"]);
    }

    #[tokio::test]
    async fn blocking_self_is_rejected() {
        let store = MemoryStore::new();
        seed(&store, &[single("v")]).await;
        let err = block_profile(&store, "v", "v").await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::CannotBlockSelf);
    }

    #[tokio::test]
    async fn missing_profile_means_onboarding_incomplete() {
        let store = MemoryStore::new();
        assert!(load_profile(&store, "ghost").await.unwrap().is_none());

        let err = require_profile(&store, "ghost").await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::OnboardingIncomplete);

        let err = block_profile(&store, "ghost", "x").await.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::OnboardingIncomplete);
        assert_eq!(store.count(collections::PROFILES), 0);
    }

    #[tokio::test]
    async fn preferences_are_validated_and_merged() {
        let store = MemoryStore::new();
        let mut viewer = single("v");
        viewer.region = Some("Lisboa".into());
        seed(&store, &[viewer]).await;

        let prefs = SearchPreferences {
            auto_apply_on_singles_swipe: true,
            preferred_genders: vec![Gender::Female, Gender::NonBinary],
            preferred_age_ranges: vec![AgeRange::Age30To39],
            preferred_interests: vec!["Surf".into(), "she_bi".into()],
            preferred_regions: vec!["Algarve".into()],
            ..Default::default()
        };
        update_search_preferences(&store, "v", prefs.clone()).await.unwrap();

        let stored = require_profile(&store, "v").await.unwrap();
        assert_eq!(stored.search_preferences, prefs);
        assert_eq!(stored.region.as_deref(), Some("Lisboa"));
    }

    #[tokio::test]
    async fn invalid_preferences_are_rejected() {
        let store = MemoryStore::new();
        seed(&store, &[single("v")]).await;

        let too_many_regions = SearchPreferences {
            preferred_regions: (0..21).map(|i| format!("region-{i}")).collect(),
            ..Default::default()
        };
        let unknown_interest = SearchPreferences {
            preferred_interests: vec!["stamp collecting".into()],
            ..Default::default()
        };
        let long_region = SearchPreferences {
            preferred_regions: vec!["x".repeat(81)],
            ..Default::default()
        };
        let bad_orientation = SearchPreferences {
            preferred_orientation_tags: vec!["Surf".into()],
            ..Default::default()
        };

        for prefs in [too_many_regions, unknown_interest, long_region, bad_orientation] {
            let err = update_search_preferences(&store, "v", prefs).await.unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::ValidationError);
        }
        let stored = require_profile(&store, "v").await.unwrap();
        assert_eq!(stored.search_preferences, SearchPreferences::default());
    }
}
