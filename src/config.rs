use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Application-level constants
pub const APP_NAME: &str = "casewatch";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Visit polling cadence observed on the operations dashboard.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// America/Guatemala, no DST.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -360;

const ENV_API_URL: &str = "CASEWATCH_API_URL";
const ENV_POLL_INTERVAL_MS: &str = "CASEWATCH_POLL_INTERVAL_MS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "CASEWATCH_CONNECT_TIMEOUT_SECS";
const ENV_UTC_OFFSET_MINUTES: &str = "CASEWATCH_UTC_OFFSET_MINUTES";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "casewatch=info,warn"
}

/// Get the application data directory (`<platform data dir>/casewatch`).
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or(ConfigError::NoDataDir)
}

/// Where the persisted login session lives.
pub fn session_file() -> Result<PathBuf, ConfigError> {
    Ok(app_data_dir()?.join("session.json"))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("Cannot determine the platform data directory")]
    NoDataDir,
}

/// Backend connection and display settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL without trailing slash.
    pub base_url: String,
    pub poll_interval: Duration,
    /// Only the connect phase is bounded; requests themselves have no timeout.
    pub connect_timeout: Duration,
    /// Offset used when rendering timestamps for people.
    pub display_offset: FixedOffset,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            display_offset: offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES)
                .unwrap_or_else(|| Utc.fix()),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_API_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(ENV_API_URL))?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: ENV_API_URL,
                value: base_url,
            });
        }

        let mut config = Self::new(&base_url);

        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let ms = parse_positive(ENV_POLL_INTERVAL_MS, &raw)?;
            config.poll_interval = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT_SECS) {
            let secs = parse_positive(ENV_CONNECT_TIMEOUT_SECS, &raw)?;
            config.connect_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_UTC_OFFSET_MINUTES) {
            let invalid = || ConfigError::Invalid {
                key: ENV_UTC_OFFSET_MINUTES,
                value: raw.clone(),
            };
            let minutes: i32 = raw.trim().parse().map_err(|_| invalid())?;
            config.display_offset = offset_from_minutes(minutes).ok_or_else(invalid)?;
        }

        Ok(config)
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_name_is_casewatch() {
        assert_eq!(APP_NAME, "casewatch");
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        if let Ok(dir) = app_data_dir() {
            assert!(dir.ends_with("casewatch"));
            assert!(session_file().unwrap().ends_with("session.json"));
        }
    }

    #[test]
    fn defaults_match_dashboard_behavior() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "CASEWATCH_API_URL",
            "https://ops.example.com/api/",
        )]))
        .unwrap();
        assert_eq!(config.base_url, "https://ops.example.com/api");
        assert_eq!(config.poll_interval, Duration::from_millis(5_000));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.display_offset.local_minus_utc(), -6 * 3600);
    }

    #[test]
    fn missing_url_is_an_error() {
        let result = ClientConfig::from_lookup(lookup_from(&[]));
        assert_eq!(result.unwrap_err(), ConfigError::Missing("CASEWATCH_API_URL"));
    }

    #[test]
    fn url_without_scheme_is_rejected() {
        let result = ClientConfig::from_lookup(lookup_from(&[("CASEWATCH_API_URL", "ops.example.com")]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CASEWATCH_API_URL", "http://localhost:3000"),
            ("CASEWATCH_POLL_INTERVAL_MS", "1500"),
            ("CASEWATCH_CONNECT_TIMEOUT_SECS", "3"),
            ("CASEWATCH_UTC_OFFSET_MINUTES", "60"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(1500));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.display_offset.local_minus_utc(), 3600);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let result = ClientConfig::from_lookup(lookup_from(&[
            ("CASEWATCH_API_URL", "http://localhost:3000"),
            ("CASEWATCH_POLL_INTERVAL_MS", "0"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "CASEWATCH_POLL_INTERVAL_MS", .. })
        ));
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let result = ClientConfig::from_lookup(lookup_from(&[
            ("CASEWATCH_API_URL", "http://localhost:3000"),
            ("CASEWATCH_UTC_OFFSET_MINUTES", "100000"),
        ]));
        assert!(result.is_err());
    }
}
