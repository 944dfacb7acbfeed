use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{AgeRange, Gender, Profile};

/// Filter bar state for the singles explore list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct SinglesFilters {
    #[validate(length(max = 3))]
    pub genders: Vec<Gender>,
    #[validate(length(max = 5))]
    pub age_ranges: Vec<AgeRange>,
    #[validate(length(max = 80))]
    pub region: String,
    pub only_verified: bool,
    pub only_with_photo: bool,
    pub only_my_country: bool,
}

impl SinglesFilters {
    /// Initial filters for `viewer`: seeded from saved preferences when the
    /// viewer auto-applies them on explore, cleared otherwise.
    pub fn from_preferences(viewer: &Profile) -> Self {
        let prefs = &viewer.search_preferences;
        if !prefs.auto_apply_on_singles_explore {
            return Self::default();
        }

        let region = if prefs.prefer_same_region {
            viewer.region().map(str::to_string)
        } else {
            prefs.preferred_regions.first().cloned()
        };

        Self {
            genders: prefs.preferred_genders.clone(),
            age_ranges: prefs.preferred_age_ranges.clone(),
            region: region.unwrap_or_default(),
            only_verified: prefs.only_verified,
            only_with_photo: prefs.only_with_photo,
            only_my_country: false,
        }
    }

    pub fn toggle_gender(&mut self, gender: Gender) {
        toggle(&mut self.genders, gender);
    }

    pub fn toggle_age_range(&mut self, age_range: AgeRange) {
        toggle(&mut self.age_ranges, age_range);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        !self.genders.is_empty()
            || !self.age_ranges.is_empty()
            || !self.region.trim().is_empty()
            || self.only_verified
            || self.only_with_photo
            || self.only_my_country
    }

    /// Filters and orders `candidates` for `viewer`.
    ///
    /// Unlike the swipe deck, profiles the viewer already liked stay listed.
    /// Without `only_my_country`, profiles from the viewer's preferred
    /// countries are moved to the front, keeping their relative order.
    pub fn apply(&self, viewer: &Profile, candidates: Vec<Profile>) -> Vec<Profile> {
        let preferred = viewer.preferred_country_codes();
        let in_preferred = |p: &Profile| {
            p.effective_country()
                .is_some_and(|country| preferred.contains(&country))
        };

        let mut result: Vec<Profile> = candidates
            .into_iter()
            .filter(|p| {
                p.id != viewer.id
                    && !viewer.has_blocked(&p.id)
                    && !p.has_blocked(&viewer.id)
                    && p.visible_in_singles()
            })
            .collect();

        if self.only_my_country {
            result.retain(|p| in_preferred(p));
        } else {
            result.sort_by_key(|p| !in_preferred(p));
        }

        let term = self.region.trim().to_lowercase();
        result.retain(|p| {
            if !self.genders.is_empty() && !p.gender.is_some_and(|g| self.genders.contains(&g)) {
                return false;
            }
            if !self.age_ranges.is_empty()
                && !p.age_range.is_some_and(|a| self.age_ranges.contains(&a))
            {
                return false;
            }
            if !term.is_empty() {
                let hit = |field: Option<&str>| {
                    field.is_some_and(|value| value.to_lowercase().contains(&term))
                };
                if !hit(p.region()) && !hit(p.city()) {
                    return false;
                }
            }
            if self.only_verified && !p.is_verified() {
                return false;
            }
            !(self.only_with_photo && !p.has_photo())
        });

        result
    }
}

fn toggle<T: PartialEq>(values: &mut Vec<T>, value: T) {
    match values.iter().position(|v| *v == value) {
        Some(pos) => {
            values.remove(pos);
        }
        None => values.push(value),
    }
}
