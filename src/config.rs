use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_GEO_URL: &str = "https://ipapi.co/json/";
pub const LEADERBOARD_SIZE: usize = 20;

/// Timing and sizing knobs of one playing session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub flush_delay: Duration,
    pub grace_period: Duration,
    pub poll_interval: Duration,
    pub leaderboard_limit: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_millis(300),
            grace_period: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            leaderboard_limit: LEADERBOARD_SIZE,
        }
    }
}

/// Process configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub server_url: String,
    pub consent_path: PathBuf,
    pub geo_url: String,
    pub session: SessionSettings,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = SessionSettings::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let session = SessionSettings {
            flush_delay: millis("TAP_FLUSH_DELAY_MS").unwrap_or(defaults.flush_delay),
            grace_period: millis("TAP_GRACE_PERIOD_MS").unwrap_or(defaults.grace_period),
            // Interval timers reject a zero period.
            poll_interval: millis("TAP_POLL_INTERVAL_MS")
                .filter(|period| !period.is_zero())
                .unwrap_or(defaults.poll_interval),
            leaderboard_limit: lookup("TAP_LEADERBOARD_LIMIT")
                .and_then(|value| value.trim().parse::<usize>().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.leaderboard_limit),
        };

        Self {
            port: lookup("PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(8080),
            data_path: lookup("APP_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/taps.json")),
            server_url: lookup("TAP_SERVER_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://127.0.0.1:8080".to_string()),
            consent_path: lookup("TAP_CONSENT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/tap-counter-consent.json")),
            geo_url: lookup("TAP_GEO_URL").unwrap_or_else(|| DEFAULT_GEO_URL.to_string()),
            session,
        }
    }
}
