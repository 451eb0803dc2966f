//! services/portal/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use pcas_core::sections::LabelScheme;
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_CACHE_PATH: &str = "./.pcas/cache.json";
const DEFAULT_CACHE_MAX_AGE_DAYS: i64 = 30;
const DEFAULT_CONFIRMATION_MS: u64 = 2200;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: Url,
    pub log_level: Level,
    pub cache_path: PathBuf,
    /// Cache envelopes older than this are discarded at load. `None` keeps them forever.
    pub cache_max_age: Option<chrono::Duration>,
    pub confirmation_delay: Duration,
    pub label_scheme: LabelScheme,
    pub save_incomplete: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Remote API ---
        let api_base_url_str =
            lookup("PCAS_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = Url::parse(&api_base_url_str).map_err(|e| {
            ConfigError::InvalidValue("PCAS_API_BASE_URL".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Local cache ---
        let cache_path = lookup("PCAS_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH));

        let cache_max_age = match lookup("PCAS_CACHE_MAX_AGE_DAYS") {
            Some(raw) => parse_max_age(&raw)?,
            None => Some(chrono::Duration::days(DEFAULT_CACHE_MAX_AGE_DAYS)),
        };

        // --- Form behaviour ---
        let confirmation_delay = match lookup("PCAS_CONFIRMATION_MS") {
            Some(raw) => Duration::from_millis(parse_number("PCAS_CONFIRMATION_MS", &raw)?),
            None => Duration::from_millis(DEFAULT_CONFIRMATION_MS),
        };

        let label_scheme = match lookup("PCAS_STATUS_LABELS") {
            Some(raw) => raw
                .parse::<LabelScheme>()
                .map_err(|e| ConfigError::InvalidValue("PCAS_STATUS_LABELS".to_string(), e))?,
            None => LabelScheme::default(),
        };

        let save_incomplete = match lookup("PCAS_SAVE_INCOMPLETE") {
            Some(raw) => raw.trim().parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(
                    "PCAS_SAVE_INCOMPLETE".to_string(),
                    format!("'{}' is not true or false", raw),
                )
            })?,
            None => false,
        };

        Ok(Self {
            api_base_url,
            log_level,
            cache_path,
            cache_max_age,
            confirmation_delay,
            label_scheme,
            save_incomplete,
        })
    }
}

/// Days to a staleness limit; `0` turns the check off.
fn parse_max_age(raw: &str) -> Result<Option<chrono::Duration>, ConfigError> {
    let invalid = |reason: String| {
        ConfigError::InvalidValue("PCAS_CACHE_MAX_AGE_DAYS".to_string(), reason)
    };
    let days = raw
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|days| *days >= 0)
        .ok_or_else(|| invalid(format!("'{}' is not a whole number of days", raw)))?;
    if days == 0 {
        return Ok(None);
    }
    chrono::Duration::try_days(days)
        .map(Some)
        .ok_or_else(|| invalid(format!("{} days is out of range", days)))
}

fn parse_number(var: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| {
        ConfigError::InvalidValue(var.to_string(), format!("'{}' is not a whole number", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).expect("defaults should load");
        assert_eq!(config.api_base_url.as_str(), "http://localhost:5000/");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.cache_max_age, Some(chrono::Duration::days(30)));
        assert_eq!(config.confirmation_delay, Duration::from_millis(2200));
        assert_eq!(config.label_scheme, LabelScheme::Uniform);
        assert!(!config.save_incomplete);
    }

    #[test]
    fn zero_max_age_disables_staleness() {
        let config = load(&[("PCAS_CACHE_MAX_AGE_DAYS", "0")]).expect("should load");
        assert_eq!(config.cache_max_age, None);
    }

    #[rstest]
    #[case::overflows_chrono("1000000000000")]
    #[case::overflows_i64("18446744073709551615")]
    #[case::negative("-3")]
    fn out_of_range_max_age_is_rejected(#[case] raw: &str) {
        let err = load(&[("PCAS_CACHE_MAX_AGE_DAYS", raw)]).expect_err("must not load");
        assert!(
            matches!(&err, ConfigError::InvalidValue(name, _) if name == "PCAS_CACHE_MAX_AGE_DAYS"),
            "unexpected error: {:?}",
            err
        );
    }

    #[test]
    fn large_but_valid_max_age_is_kept() {
        let config = load(&[("PCAS_CACHE_MAX_AGE_DAYS", "3650")]).expect("should load");
        assert_eq!(config.cache_max_age, Some(chrono::Duration::days(3650)));
    }

    #[test]
    fn legacy_labels_and_incomplete_saves_are_configurable() {
        let config = load(&[
            ("PCAS_STATUS_LABELS", "legacy"),
            ("PCAS_SAVE_INCOMPLETE", "true"),
        ])
        .expect("should load");
        assert_eq!(config.label_scheme, LabelScheme::Legacy);
        assert!(config.save_incomplete);
    }

    #[test]
    fn rejects_bad_values() {
        for (var, value) in [
            ("PCAS_API_BASE_URL", "not a url"),
            ("RUST_LOG", "chatty"),
            ("PCAS_CONFIRMATION_MS", "-1"),
            ("PCAS_STATUS_LABELS", "fancy"),
        ] {
            let err = load(&[(var, value)]).expect_err("bad value must be rejected");
            assert!(
                matches!(&err, ConfigError::InvalidValue(name, _) if name == var),
                "{} should be reported, got {:?}",
                var,
                err
            );
        }
    }
}
