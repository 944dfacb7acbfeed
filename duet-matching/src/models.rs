use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::catalog;

/// Document store collection names.
pub mod collections {
    pub const PROFILES: &str = "profiles";
    pub const LIKES: &str = "likes";
    pub const MATCHES: &str = "matches";
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    User,
    Couple,
    Club,
    Organizer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "NB")]
    NonBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeRange {
    #[serde(rename = "UNDER_30")]
    Under30,
    #[serde(rename = "AGE_30_39")]
    Age30To39,
    #[serde(rename = "AGE_40_49")]
    Age40To49,
    #[serde(rename = "AGE_50_59")]
    Age50To59,
    #[serde(rename = "AGE_60_PLUS")]
    Age60Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerificationStatus {
    #[default]
    None,
    Official,
    Business,
}

/// Discovery surface a like or match originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LikeContext {
    Singles,
    Couples,
}

impl LikeContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeContext::Singles => "SINGLES",
            LikeContext::Couples => "COUPLES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwipeDirection {
    Like,
    Pass,
}

impl SwipeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwipeDirection::Like => "like",
            SwipeDirection::Pass => "pass",
        }
    }
}

// --- Profile ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub visible_in_explore: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub visible_in_singles: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub show_country: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub show_region: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub show_city: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub hide_exact_location: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub allow_messages_from_matches_only: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub allow_messages_from_singles: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub allow_messages_from_couples: Option<bool>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub blur_photos_for_strangers: Option<bool>,
}

/// Saved search preferences. An empty set on any dimension means that
/// dimension is not filtered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchPreferences {
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub auto_apply_on_explore: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub auto_apply_on_singles_explore: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub auto_apply_on_singles_swipe: bool,

    #[serde(default, deserialize_with = "lenient::or_default")]
    pub looking_for_couples: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub looking_for_single_women: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub looking_for_single_men: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub looking_for_groups: bool,

    #[serde(default, deserialize_with = "lenient::vec")]
    #[validate(length(max = 5, message = "at most 5 age ranges"))]
    pub preferred_age_ranges: Vec<AgeRange>,
    #[serde(default, deserialize_with = "lenient::vec")]
    #[validate(custom = "orientation_tags")]
    pub preferred_orientation_tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient::vec")]
    #[validate(length(max = 3, message = "at most 3 genders"))]
    pub preferred_genders: Vec<Gender>,
    #[serde(default, deserialize_with = "lenient::vec")]
    #[validate(length(max = 20, message = "at most 20 regions"), custom = "region_names")]
    pub preferred_regions: Vec<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub prefer_same_region: bool,
    #[serde(default, deserialize_with = "lenient::vec")]
    #[validate(custom = "catalog_interests")]
    pub preferred_interests: Vec<String>,

    #[serde(default, deserialize_with = "lenient::or_default")]
    pub only_verified: bool,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub only_with_photo: bool,
}

const MAX_REGION_LEN: usize = 80;

fn region_names(regions: &[String]) -> Result<(), ValidationError> {
    if regions.iter().any(|r| r.trim().is_empty() || r.chars().count() > MAX_REGION_LEN) {
        return Err(ValidationError::new("region_name"));
    }
    Ok(())
}

fn catalog_interests(interests: &[String]) -> Result<(), ValidationError> {
    if interests.iter().all(|i| catalog::is_known_interest(i)) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_interest"))
    }
}

fn orientation_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().all(|t| catalog::is_orientation_tag(t)) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_orientation_tag"))
    }
}

/// A person or entity record as stored in the `profiles` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub age_range: Option<AgeRange>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// Legacy free-form country, used when `home_country_code` is unset.
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub home_country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient::vec", skip_serializing_if = "Vec::is_empty")]
    pub preferred_countries: Vec<String>,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::vec", skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub verification_status: VerificationStatus,
    #[serde(default, deserialize_with = "lenient::option", skip_serializing_if = "Option::is_none")]
    pub main_photo_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::vec")]
    pub blocked_user_ids: Vec<String>,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub privacy_settings: PrivacySettings,
    #[serde(default, deserialize_with = "lenient::or_default")]
    pub search_preferences: SearchPreferences,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Profile {
    pub fn is_single(&self) -> bool {
        self.account_type == Some(AccountType::User)
    }

    /// Context a like from this profile is recorded under.
    pub fn like_context(&self) -> LikeContext {
        if self.is_single() {
            LikeContext::Singles
        } else {
            LikeContext::Couples
        }
    }

    /// Home country code, falling back to the legacy `country` field.
    pub fn effective_country(&self) -> Option<&str> {
        non_empty(&self.home_country_code).or_else(|| non_empty(&self.country))
    }

    /// Countries this profile prefers; defaults to its own country.
    pub fn preferred_country_codes(&self) -> Vec<&str> {
        if self.preferred_countries.is_empty() {
            self.effective_country().into_iter().collect()
        } else {
            self.preferred_countries.iter().map(String::as_str).collect()
        }
    }

    pub fn region(&self) -> Option<&str> {
        non_empty(&self.region)
    }

    pub fn city(&self) -> Option<&str> {
        non_empty(&self.city)
    }

    pub fn is_verified(&self) -> bool {
        matches!(
            self.verification_status,
            VerificationStatus::Official | VerificationStatus::Business
        )
    }

    pub fn has_photo(&self) -> bool {
        non_empty(&self.main_photo_url).is_some()
    }

    pub fn has_blocked(&self, profile_id: &str) -> bool {
        self.blocked_user_ids.iter().any(|id| id == profile_id)
    }

    /// Only an explicit `false` hides a profile from singles discovery.
    pub fn visible_in_singles(&self) -> bool {
        self.privacy_settings.visible_in_singles != Some(false)
    }
}

// --- Like ---

/// Directed expression of interest, keyed `{from}_{to}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub from_profile_id: String,
    pub to_profile_id: String,
    pub context: LikeContext,
    pub created_at: DateTime<Utc>,
}

impl Like {
    pub fn key(from_id: &str, to_id: &str) -> String {
        format!("{from_id}_{to_id}")
    }

    pub fn id(&self) -> String {
        Self::key(&self.from_profile_id, &self.to_profile_id)
    }
}

// --- Match ---

/// Mutual interest between exactly two profiles, keyed by the sorted pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub profile_ids: [String; 2],
    pub context: LikeContext,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Match {
    pub fn sorted_pair(a: &str, b: &str) -> [String; 2] {
        if a <= b {
            [a.to_string(), b.to_string()]
        } else {
            [b.to_string(), a.to_string()]
        }
    }

    /// `min(a, b)_max(a, b)`, identical for both like orders.
    pub fn canonical_id(a: &str, b: &str) -> String {
        let [lo, hi] = Self::sorted_pair(a, b);
        format!("{lo}_{hi}")
    }

    pub fn involves(&self, profile_id: &str) -> bool {
        self.profile_ids.iter().any(|id| id == profile_id)
    }

    /// The other participant, if `profile_id` is one of the two.
    pub fn other_profile(&self, profile_id: &str) -> Option<&str> {
        match &self.profile_ids {
            [a, b] if a == profile_id => Some(b),
            [a, b] if b == profile_id => Some(a),
            _ => None,
        }
    }
}

/// Tolerant decoders: malformed values decode as absent instead of failing
/// the whole document.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| serde_json::from_value(v).ok()))
    }

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        Ok(option(deserializer)?.unwrap_or_default())
    }

    /// Keeps the well-formed entries of an array and drops the rest.
    pub fn vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}
