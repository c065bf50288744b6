use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BountyError, Result};

/// Request budget for one remote endpoint: at most `max_requests` per
/// rolling `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSettings {
    pub max_requests: usize,
    pub window: Duration,
}

/// Application configuration loaded from environment variables.
/// Every value has a default; only malformed values are errors.
#[derive(Debug, Clone)]
pub struct Config {
    // GitHub
    pub github_token: Option<String>,

    // HTTP
    pub user_agent: String,
    pub http_timeout: Duration,

    // Rate limits
    pub page_rate: RateSettings,
    pub api_rate: RateSettings,

    // Retries
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub request_deadline: Duration,

    // Walking
    pub max_files: usize,

    // Curated data
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            user_agent: "Mozilla/5.0 (compatible; bountyscope/0.1; +research-bot)".to_string(),
            http_timeout: Duration::from_secs(10),
            page_rate: RateSettings {
                max_requests: 5,
                window: Duration::from_millis(1_000),
            },
            api_rate: RateSettings {
                max_requests: 30,
                window: Duration::from_millis(60_000),
            },
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1_000),
            request_deadline: Duration::from_secs(60),
            max_files: 20,
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let config = Self {
            github_token: env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            user_agent: env::var("BOUNTYSCOPE_USER_AGENT").unwrap_or(defaults.user_agent),
            http_timeout: Duration::from_secs(parse_env(
                "BOUNTYSCOPE_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            page_rate: RateSettings {
                max_requests: parse_env("BOUNTYSCOPE_PAGE_RATE", defaults.page_rate.max_requests)?,
                window: Duration::from_millis(parse_env(
                    "BOUNTYSCOPE_PAGE_WINDOW_MS",
                    defaults.page_rate.window.as_millis() as u64,
                )?),
            },
            api_rate: RateSettings {
                max_requests: parse_env("BOUNTYSCOPE_API_RATE", defaults.api_rate.max_requests)?,
                window: Duration::from_millis(parse_env(
                    "BOUNTYSCOPE_API_WINDOW_MS",
                    defaults.api_rate.window.as_millis() as u64,
                )?),
            },
            max_attempts: parse_env("BOUNTYSCOPE_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_base_delay: Duration::from_millis(parse_env(
                "BOUNTYSCOPE_RETRY_BASE_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )?),
            request_deadline: Duration::from_secs(parse_env(
                "BOUNTYSCOPE_DEADLINE_SECS",
                defaults.request_deadline.as_secs(),
            )?),
            max_files: parse_env("BOUNTYSCOPE_MAX_FILES", defaults.max_files)?,
            catalog_path: env::var("BOUNTYSCOPE_CATALOG").ok().map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_rate.max_requests == 0 || self.api_rate.max_requests == 0 {
            return Err(BountyError::Config("rate limits must allow at least one request".into()));
        }
        if self.max_attempts == 0 {
            return Err(BountyError::Config("BOUNTYSCOPE_MAX_ATTEMPTS must be at least 1".into()));
        }
        Ok(())
    }

    /// Log the effective configuration with the token reduced to a preview.
    pub fn log_redacted(&self) {
        tracing::info!(
            github_token = %self.github_token.as_deref().map(token_preview).unwrap_or_else(|| "(unset)".into()),
            page_rate = self.page_rate.max_requests,
            page_window_ms = self.page_rate.window.as_millis() as u64,
            api_rate = self.api_rate.max_requests,
            api_window_ms = self.api_rate.window.as_millis() as u64,
            max_attempts = self.max_attempts,
            retry_base_ms = self.retry_base_delay.as_millis() as u64,
            deadline_secs = self.request_deadline.as_secs(),
            max_files = self.max_files,
            catalog = ?self.catalog_path,
            "Configuration loaded"
        );
    }
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| BountyError::Config(format!("{key}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}

/// First four characters and the length. Counts chars, not bytes.
fn token_preview(val: &str) -> String {
    let head: String = val.chars().take(4).collect();
    format!("{}...({} chars)", head, val.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let config = Config::default();
        assert_eq!(config.api_rate.max_requests, 30);
        assert_eq!(config.api_rate.window, Duration::from_secs(60));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.max_files, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_env_reports_malformed_values() {
        env::set_var("BOUNTYSCOPE_TEST_BAD_NUMBER", "ten");
        let err = parse_env::<u32>("BOUNTYSCOPE_TEST_BAD_NUMBER", 3).unwrap_err();
        assert!(matches!(err, BountyError::Config(_)));
        env::remove_var("BOUNTYSCOPE_TEST_BAD_NUMBER");
    }

    #[test]
    fn token_preview_shows_only_the_head() {
        assert_eq!(token_preview("ghp_abcdef123"), "ghp_...(13 chars)");
        assert_eq!(token_preview("ab"), "ab...(2 chars)");
    }

    #[test]
    fn token_preview_handles_multibyte_characters() {
        assert_eq!(token_preview("ééééé"), "éééé...(5 chars)");
    }

    #[test]
    fn parse_env_falls_back_to_default() {
        assert_eq!(parse_env::<u64>("BOUNTYSCOPE_TEST_UNSET_KEY", 42).unwrap(), 42);
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
