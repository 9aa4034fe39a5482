use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// ISO 3166-1 alpha-2 code (uppercase) or the `unknown` sentinel.
///
/// Deserialization goes through [`CountryCode::parse`], so a decoded value
/// always holds one of those two shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(Self::UNKNOWN) {
            return Some(Self::unknown());
        }
        if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
            return Some(Self(raw.to_ascii_uppercase()));
        }
        None
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Regional-indicator flag, or a globe for the sentinel.
    pub fn flag(&self) -> String {
        if self.is_unknown() {
            return "🌍".to_string();
        }
        let flag: Option<String> = self
            .0
            .chars()
            .map(|c| {
                let offset = (c as u32).checked_sub('A' as u32).filter(|offset| *offset < 26)?;
                char::from_u32(0x1F1E6 + offset)
            })
            .collect();
        flag.filter(|flag| !flag.is_empty())
            .unwrap_or_else(|| "🌍".to_string())
    }
}

impl TryFrom<String> for CountryCode {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid country code {raw:?}"))
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl Default for CountryCode {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted backend aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TapData {
    pub total_taps: u64,
    pub countries: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementRequest {
    pub country_code: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TotalResponse {
    pub total_taps: u64,
}

/// One row of the backend's per-country table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountryTaps {
    pub country_code: CountryCode,
    pub taps: u64,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

/// Row-level change notification pushed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum ChangeEvent {
    GlobalState { total_taps: Option<u64> },
    CountryTaps { country_code: CountryCode },
    Resync,
}

/// A leaderboard row as presented to the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub country_code: CountryCode,
    pub display_name: String,
    pub taps: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub total: u64,
    pub leaderboard: Vec<LeaderboardEntry>,
}
