//! Free-text preference extraction.
//!
//! Keyword matching over English and Chinese. A turn only updates the
//! profile when it is recognisably talking about preferences; everything
//! else returns `None` and leaves the profile alone.

use std::collections::BTreeSet;

use tripclaw_core::preference::{
    Budget, Interest, Pace, PreferenceProfile, PreferenceUpdate, TravelMode, WeatherSensitivity,
};

/// Words that mark a turn as describing preferences.
const TRIGGERS: &[&str] = &[
    "prefer",
    "preference",
    "preferences",
    "i like",
    "i love",
    "i enjoy",
    "i'm into",
    "not a fan",
    "don't like",
    "budget",
    "pace",
    "偏好",
    "喜好",
    "喜欢",
    "不喜欢",
    "节奏",
    "预算",
    "消费水平",
];

/// Option words that count as preference talk on their own.
const OPTION_WORDS: &[&str] = &[
    "walking",
    "on foot",
    "public transport",
    "self-drive",
    "relaxed",
    "leisurely",
    "packed schedule",
    "economy",
    "comfort",
    "luxury",
    "历史文化",
    "自然风光",
    "美食体验",
    "购物娱乐",
    "亲子游玩",
    "艺术文艺",
    "步行",
    "公交",
    "地铁",
    "自驾",
    "混合",
    "悠闲",
    "适中",
    "紧凑",
    "经济",
    "舒适",
    "豪华",
];

const REPLACE_MARKERS: &[&str] = &["change to", "changed to", "instead", "switch to", "改成", "改为"];

const INTEREST_WORDS: &[(Interest, &[&str])] = &[
    (Interest::History, &["history", "historic", "historical", "museum", "museums", "历史文化", "历史"]),
    (Interest::Nature, &["nature", "scenery", "hiking", "park", "parks", "自然风光", "自然"]),
    (Interest::Food, &["food", "cuisine", "foodie", "美食体验", "美食"]),
    (Interest::Shopping, &["shopping", "购物娱乐", "购物"]),
    (Interest::Family, &["family", "kids", "children", "亲子游玩", "亲子"]),
    (Interest::Art, &["art", "arts", "gallery", "galleries", "艺术文艺", "文艺", "艺术"]),
];

/// Mutually exclusive picks; the first matching entry wins.
const TRAVEL_MODE_WORDS: &[(TravelMode, &[&str])] = &[
    (TravelMode::Walk, &["walking", "walk", "on foot", "步行"]),
    (TravelMode::Transit, &["public transport", "transit", "subway", "metro", "bus", "公交", "地铁"]),
    (TravelMode::Drive, &["self-drive", "drive", "driving", "car", "自驾", "开车", "驾车"]),
    (TravelMode::Mixed, &["mixed", "混合"]),
];

const PACE_WORDS: &[(Pace, &[&str])] = &[
    (Pace::Relaxed, &["relaxed", "leisurely", "slow", "悠闲"]),
    (Pace::Moderate, &["moderate", "balanced", "适中"]),
    (Pace::Packed, &["packed", "tight", "intense", "紧凑"]),
];

const BUDGET_WORDS: &[(Budget, &[&str])] = &[
    (Budget::Economy, &["economy", "budget-friendly", "cheap", "经济"]),
    (Budget::Comfort, &["comfort", "comfortable", "mid-range", "舒适"]),
    (Budget::Luxury, &["luxury", "high-end", "豪华"]),
];

const LODGING_TAGS: &[(&str, &[&str])] = &[
    ("quiet", &["quiet", "安静"]),
    ("near_attractions", &["near attractions", "close to the sights", "靠近景区"]),
    ("transit_access", &["near the metro", "transit access", "交通便利"]),
    ("value", &["good value", "value for money", "性价比"]),
];

const DINING_TAGS: &[(&str, &[&str])] = &[
    ("local_specialties", &["local specialties", "local dishes", "本地特色"]),
    ("street_food", &["street food", "snacks", "小吃"]),
    ("fine_dining", &["fine dining", "高档餐厅"]),
    ("vegetarian", &["vegetarian", "素食"]),
];

const SPECIAL_NEEDS: &[(&str, &[&str])] = &[
    ("with children", &["with kids", "with children", "带小孩", "带孩子"]),
    ("with elderly", &["elderly", "带老人"]),
    ("wheelchair access", &["wheelchair", "accessible", "无障碍"]),
    ("pet friendly", &["my dog", "pet", "宠物"]),
];

const WEATHER_WORDS: &[(WeatherSensitivity, &[&str])] = &[
    (WeatherSensitivity::High, &["hate rain", "weather sensitive", "对天气敏感", "怕下雨"]),
    (WeatherSensitivity::Low, &["don't mind the weather", "any weather", "不在乎天气"]),
];

/// Whether `keyword` occurs in `lower` (already lowercased).
///
/// Single ASCII words match whole words only, so "art" does not fire on
/// "start". Phrases and CJK keywords match as substrings.
pub(crate) fn mentions(lower: &str, keyword: &str) -> bool {
    if keyword.chars().all(|c| c.is_ascii_alphanumeric()) {
        lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|word| word == keyword)
    } else {
        lower.contains(keyword)
    }
}

pub(crate) fn mentions_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| mentions(lower, k))
}

fn first_match<T: Copy>(lower: &str, table: &[(T, &[&str])]) -> Option<T> {
    table
        .iter()
        .find(|(_, words)| mentions_any(lower, words))
        .map(|(value, _)| *value)
}

fn tags(lower: &str, table: &[(&str, &[&str])]) -> Vec<String> {
    table
        .iter()
        .filter(|(_, words)| mentions_any(lower, words))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Append new tags to existing ones, keeping order and dropping repeats.
fn additive(current: &[String], found: Vec<String>) -> Option<Vec<String>> {
    if found.is_empty() {
        return None;
    }
    let mut merged = current.to_vec();
    for tag in found {
        if !merged.contains(&tag) {
            merged.push(tag);
        }
    }
    Some(merged)
}

/// Whether the turn is describing or changing travel preferences.
pub fn talks_about_preferences(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    !lower.is_empty() && (mentions_any(&lower, TRIGGERS) || mentions_any(&lower, OPTION_WORDS))
}

/// Extract a partial profile update from one user turn.
///
/// Interests are added to the current set unless the text asks to change
/// them, in which case the mentioned interests replace it. Travel mode,
/// pace, budget and weather sensitivity are single picks. Returns `None`
/// when the turn is not about preferences or nothing concrete was found.
pub fn extract_preferences(text: &str, current: &PreferenceProfile) -> Option<PreferenceUpdate> {
    if !talks_about_preferences(text) {
        return None;
    }
    let lower = text.to_lowercase();

    let mentioned: BTreeSet<Interest> = INTEREST_WORDS
        .iter()
        .filter(|(_, words)| mentions_any(&lower, words))
        .map(|(interest, _)| *interest)
        .collect();
    let interests = if mentioned.is_empty() {
        None
    } else if mentions_any(&lower, REPLACE_MARKERS) {
        Some(mentioned)
    } else {
        Some(current.interests.union(&mentioned).copied().collect())
    };

    let update = PreferenceUpdate {
        interests,
        travel_mode: first_match(&lower, TRAVEL_MODE_WORDS),
        pace: first_match(&lower, PACE_WORDS),
        budget: first_match(&lower, BUDGET_WORDS),
        lodging_pref: additive(&current.lodging_pref, tags(&lower, LODGING_TAGS)),
        dining_pref: additive(&current.dining_pref, tags(&lower, DINING_TAGS)),
        special_needs: additive(&current.special_needs, tags(&lower, SPECIAL_NEEDS)),
        weather_sensitivity: first_match(&lower, WEATHER_WORDS),
    };

    (!update.is_empty()).then_some(update)
}
