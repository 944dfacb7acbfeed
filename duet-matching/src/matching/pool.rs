use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

use duet_shared::store::{DocumentStore, StoreResult};

use crate::models::{collections, Profile};

/// Builds the swipe deck for `viewer` from a snapshot of single profiles.
///
/// Excluded: the viewer, anyone the viewer already liked, anyone blocked in
/// either direction and anyone hidden from singles discovery. When the
/// viewer auto-applies preferences on swipe, those narrow the pool further.
/// Survivors from the viewer's country come first; each bucket is shuffled
/// with `rng`.
///
/// A viewer that is not loaded yet gets an empty pool.
pub fn build_candidate_pool<R>(
    viewer: Option<&Profile>,
    candidates: Vec<Profile>,
    liked_ids: &HashSet<String>,
    rng: &mut R,
) -> Vec<Profile>
where
    R: Rng + ?Sized,
{
    let Some(viewer) = viewer else {
        return Vec::new();
    };

    let apply_prefs = viewer.search_preferences.auto_apply_on_singles_swipe;
    let home = viewer.effective_country();

    let mut same_country = Vec::new();
    let mut other = Vec::new();

    for candidate in candidates {
        if is_excluded(viewer, &candidate, liked_ids) {
            continue;
        }
        if apply_prefs && !passes_preferences(viewer, &candidate) {
            continue;
        }
        match (home, candidate.effective_country()) {
            (Some(home), Some(theirs)) if home == theirs => same_country.push(candidate),
            _ => other.push(candidate),
        }
    }

    same_country.shuffle(rng);
    other.shuffle(rng);

    tracing::debug!(
        viewer_id = %viewer.id,
        same_country = same_country.len(),
        other = other.len(),
        "candidate pool built"
    );

    same_country.extend(other);
    same_country
}

/// Hard exclusions; these apply regardless of preferences.
pub fn is_excluded(viewer: &Profile, candidate: &Profile, liked_ids: &HashSet<String>) -> bool {
    candidate.id == viewer.id
        || liked_ids.contains(&candidate.id)
        || viewer.has_blocked(&candidate.id)
        || candidate.has_blocked(&viewer.id)
        || !candidate.visible_in_singles()
}

/// Saved preferences as swipe filters. Dimensions the viewer left empty, and
/// candidate fields that are missing, do not filter.
pub fn passes_preferences(viewer: &Profile, candidate: &Profile) -> bool {
    let prefs = &viewer.search_preferences;

    if let Some(gender) = candidate.gender {
        if !prefs.preferred_genders.is_empty() && !prefs.preferred_genders.contains(&gender) {
            return false;
        }
    }
    if let Some(age_range) = candidate.age_range {
        let ranges = &prefs.preferred_age_ranges;
        if !ranges.is_empty() && !ranges.contains(&age_range) {
            return false;
        }
    }
    if prefs.only_verified && !candidate.is_verified() {
        return false;
    }
    if prefs.only_with_photo && !candidate.has_photo() {
        return false;
    }

    if prefs.prefer_same_region {
        if let (Some(mine), Some(theirs)) = (viewer.region(), candidate.region()) {
            if mine != theirs {
                return false;
            }
        }
    }

    let regions: Vec<&str> = prefs
        .preferred_regions
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();
    if !regions.is_empty() && !prefs.prefer_same_region {
        let matches_region = regions.iter().any(|&r| {
            candidate.region().is_some_and(|region| region.contains(r))
                || candidate.city().is_some_and(|city| city.contains(r))
        });
        if !matches_region {
            return false;
        }
    }

    true
}

/// Fetches the single profiles and the viewer's likes, then builds the pool.
pub async fn load_candidate_pool<R>(
    store: &dyn DocumentStore,
    viewer: Option<&Profile>,
    rng: &mut R,
) -> StoreResult<Vec<Profile>>
where
    R: Rng + Send + ?Sized,
{
    let Some(viewer) = viewer else {
        return Ok(Vec::new());
    };

    let likes = store
        .query_equals(collections::LIKES, "fromProfileId", &json!(viewer.id))
        .await?;
    let liked_ids: HashSet<String> = likes
        .iter()
        .filter_map(|doc| doc.get("toProfileId").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect();

    let candidates = load_singles(store).await?;
    Ok(build_candidate_pool(Some(viewer), candidates, &liked_ids, rng))
}

/// All single-person profiles. Documents that cannot be decoded are skipped.
pub async fn load_singles(store: &dyn DocumentStore) -> StoreResult<Vec<Profile>> {
    let docs = store
        .query_equals(collections::PROFILES, "accountType", &json!("USER"))
        .await?;

    let mut singles = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.decode::<Profile>() {
            Ok(profile) => singles.push(profile),
            Err(e) => {
                tracing::warn!(profile_id = %doc.id, error = %e, "skipping undecodable profile")
            }
        }
    }
    Ok(singles)
}
