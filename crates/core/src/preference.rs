//! User preference profile: the eight dimensions that parameterize planning.
//!
//! Every field has a documented default, so a profile read from an older or
//! partial record is always complete. Updates are applied field by field via
//! [`PreferenceUpdate`]; a profile is never replaced wholesale.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Points-of-interest categories a traveller can care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interest {
    History,
    Nature,
    Food,
    Shopping,
    Family,
    Art,
}

impl Interest {
    pub const ALL: [Interest; 6] = [
        Interest::History,
        Interest::Nature,
        Interest::Food,
        Interest::Shopping,
        Interest::Family,
        Interest::Art,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interest::History => "history",
            Interest::Nature => "nature",
            Interest::Food => "food",
            Interest::Shopping => "shopping",
            Interest::Family => "family",
            Interest::Art => "art",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Walk,
    Transit,
    Drive,
    #[default]
    Mixed,
}

impl TravelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelMode::Walk => "walk",
            TravelMode::Transit => "transit",
            TravelMode::Drive => "drive",
            TravelMode::Mixed => "mixed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    Relaxed,
    #[default]
    Moderate,
    Packed,
}

impl Pace {
    /// Number of stops per itinerary day.
    pub fn stops_per_day(&self) -> usize {
        match self {
            Pace::Relaxed => 3,
            Pace::Moderate => 4,
            Pace::Packed => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Relaxed => "relaxed",
            Pace::Moderate => "moderate",
            Pace::Packed => "packed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    Economy,
    #[default]
    Comfort,
    Luxury,
}

/// Inclusive hotel star range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarBand {
    pub min: f64,
    pub max: f64,
}

impl StarBand {
    pub fn contains(&self, stars: f64) -> bool {
        stars >= self.min && stars <= self.max
    }
}

/// Nightly price range in CNY. `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl PriceBand {
    pub fn contains(&self, price: f64) -> bool {
        self.min.is_none_or(|min| price >= min) && self.max.is_none_or(|max| price <= max)
    }
}

impl Budget {
    pub fn star_band(&self) -> StarBand {
        match self {
            Budget::Economy => StarBand { min: 0.0, max: 3.0 },
            Budget::Comfort => StarBand { min: 3.0, max: 4.5 },
            Budget::Luxury => StarBand { min: 4.5, max: 5.0 },
        }
    }

    pub fn price_band(&self) -> PriceBand {
        match self {
            Budget::Economy => PriceBand { min: None, max: Some(400.0) },
            Budget::Comfort => PriceBand { min: Some(200.0), max: Some(1200.0) },
            Budget::Luxury => PriceBand { min: Some(800.0), max: None },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Budget::Economy => "economy",
            Budget::Comfort => "comfort",
            Budget::Luxury => "luxury",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeatherSensitivity {
    Low,
    #[default]
    Medium,
    High,
}

/// Names of the eight profile dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceField {
    Interests,
    TravelMode,
    Pace,
    Budget,
    LodgingPref,
    DiningPref,
    SpecialNeeds,
    WeatherSensitivity,
}

/// Number of profile dimensions.
pub const PREFERENCE_FIELD_COUNT: usize = 8;

/// A traveller's preference profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceProfile {
    pub interests: BTreeSet<Interest>,
    pub travel_mode: TravelMode,
    pub pace: Pace,
    pub budget: Budget,
    /// Lodging tags, e.g. `quiet`, `near_attractions`, `transit_access`, `value`.
    pub lodging_pref: Vec<String>,
    pub dining_pref: Vec<String>,
    pub special_needs: Vec<String>,
    pub weather_sensitivity: WeatherSensitivity,

    /// Fields the user has explicitly set.
    pub collected: BTreeSet<PreferenceField>,
    /// Number of turns this profile has seen.
    pub interaction_count: u64,
}

/// A partial profile. Only `Some` fields are applied by [`PreferenceProfile::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceUpdate {
    pub interests: Option<BTreeSet<Interest>>,
    pub travel_mode: Option<TravelMode>,
    pub pace: Option<Pace>,
    pub budget: Option<Budget>,
    pub lodging_pref: Option<Vec<String>>,
    pub dining_pref: Option<Vec<String>>,
    pub special_needs: Option<Vec<String>>,
    pub weather_sensitivity: Option<WeatherSensitivity>,
}

impl PreferenceUpdate {
    pub fn is_empty(&self) -> bool {
        *self == PreferenceUpdate::default()
    }
}

impl PreferenceProfile {
    /// Apply a partial update field by field. Returns the fields that changed.
    pub fn merge(&mut self, update: PreferenceUpdate) -> Vec<PreferenceField> {
        let mut touched = Vec::new();

        macro_rules! apply {
            ($field:ident, $tag:expr) => {
                if let Some(value) = update.$field {
                    if self.$field != value {
                        touched.push($tag);
                    }
                    self.$field = value;
                    self.collected.insert($tag);
                }
            };
        }

        apply!(interests, PreferenceField::Interests);
        apply!(travel_mode, PreferenceField::TravelMode);
        apply!(pace, PreferenceField::Pace);
        apply!(budget, PreferenceField::Budget);
        apply!(lodging_pref, PreferenceField::LodgingPref);
        apply!(dining_pref, PreferenceField::DiningPref);
        apply!(special_needs, PreferenceField::SpecialNeeds);
        apply!(weather_sensitivity, PreferenceField::WeatherSensitivity);

        touched
    }

    /// Share of dimensions the user has explicitly set, in `[0, 1]`.
    pub fn completeness(&self) -> f32 {
        self.collected.len() as f32 / PREFERENCE_FIELD_COUNT as f32
    }

    pub fn has_collected_any(&self) -> bool {
        !self.collected.is_empty()
    }

    /// Human-readable summary of explicitly set preferences.
    pub fn summary(&self) -> String {
        let mut lines = vec!["Your travel preferences:".to_string()];
        if !self.interests.is_empty() {
            let names: Vec<&str> = self.interests.iter().map(|i| i.as_str()).collect();
            lines.push(format!("- interests: {}", names.join(", ")));
        }
        if self.collected.contains(&PreferenceField::TravelMode) {
            lines.push(format!("- getting around: {}", self.travel_mode.as_str()));
        }
        if self.collected.contains(&PreferenceField::Pace) {
            lines.push(format!("- pace: {}", self.pace.as_str()));
        }
        if self.collected.contains(&PreferenceField::Budget) {
            lines.push(format!("- budget: {}", self.budget.as_str()));
        }
        for (label, values) in [
            ("lodging", &self.lodging_pref),
            ("dining", &self.dining_pref),
            ("special needs", &self.special_needs),
        ] {
            if !values.is_empty() {
                lines.push(format!("- {label}: {}", values.join(", ")));
            }
        }
        if lines.len() == 1 {
            lines.push("- nothing set yet".into());
        }
        lines.join("\n")
    }
}
