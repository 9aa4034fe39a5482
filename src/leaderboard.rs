use crate::models::{CountryCode, CountryTaps, LeaderboardEntry, TapData};

/// Upper bound accepted by the leaderboard endpoint.
pub const MAX_LIMIT: usize = 100;

/// Server-side ordering: count descending, ties by country code.
pub fn top_countries(data: &TapData, limit: usize) -> Vec<CountryTaps> {
    let mut rows: Vec<CountryTaps> = data
        .countries
        .iter()
        .filter_map(|(code, taps)| {
            CountryCode::parse(code).map(|country_code| CountryTaps {
                country_code,
                taps: *taps,
            })
        })
        .collect();

    rows.sort_by(|a, b| b.taps.cmp(&a.taps).then_with(|| a.country_code.cmp(&b.country_code)));
    rows.truncate(limit.min(MAX_LIMIT));
    rows
}

/// Client-side presentation. The sort is stable so equal counts keep the
/// order the backend sent them in.
pub fn rank_entries(rows: Vec<CountryTaps>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .map(|row| LeaderboardEntry {
            display_name: display_name(&row.country_code),
            country_code: row.country_code,
            taps: row.taps,
        })
        .collect();

    entries.sort_by(|a, b| b.taps.cmp(&a.taps));
    entries.truncate(limit);
    entries
}

pub fn rank_label(index: usize) -> String {
    match index {
        0 => "🥇".to_string(),
        1 => "🥈".to_string(),
        2 => "🥉".to_string(),
        n => format!("#{}", n + 1),
    }
}

pub fn display_name(code: &CountryCode) -> String {
    if code.is_unknown() {
        return "Unknown Region".to_string();
    }
    COUNTRY_NAMES
        .iter()
        .find(|(cc, _)| *cc == code.as_str())
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| code.as_str().to_string())
}

const COUNTRY_NAMES: &[(&str, &str)] = &[
    ("AR", "Argentina"),
    ("AT", "Austria"),
    ("AU", "Australia"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("CA", "Canada"),
    ("CH", "Switzerland"),
    ("CL", "Chile"),
    ("CN", "China"),
    ("CO", "Colombia"),
    ("CZ", "Czechia"),
    ("DE", "Germany"),
    ("DK", "Denmark"),
    ("EG", "Egypt"),
    ("ES", "Spain"),
    ("FI", "Finland"),
    ("FR", "France"),
    ("GB", "United Kingdom"),
    ("GR", "Greece"),
    ("HU", "Hungary"),
    ("ID", "Indonesia"),
    ("IE", "Ireland"),
    ("IL", "Israel"),
    ("IN", "India"),
    ("IT", "Italy"),
    ("JP", "Japan"),
    ("KR", "South Korea"),
    ("MX", "Mexico"),
    ("MY", "Malaysia"),
    ("NG", "Nigeria"),
    ("NL", "Netherlands"),
    ("NO", "Norway"),
    ("NZ", "New Zealand"),
    ("PH", "Philippines"),
    ("PK", "Pakistan"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("RO", "Romania"),
    ("RU", "Russia"),
    ("SA", "Saudi Arabia"),
    ("SE", "Sweden"),
    ("SG", "Singapore"),
    ("TH", "Thailand"),
    ("TR", "Türkiye"),
    ("TW", "Taiwan"),
    ("UA", "Ukraine"),
    ("US", "United States"),
    ("VN", "Vietnam"),
    ("ZA", "South Africa"),
];
