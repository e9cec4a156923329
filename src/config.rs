use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Upstream HN API
    pub hn_api_base_url: String,
    pub fetch_timeout: Duration,
    pub max_search_pages: u32,
    pub scan_window: Duration,

    // Alert cycle
    pub poll_interval: Duration,
    pub worker_concurrency: usize,
    pub advance_on_empty: bool,

    // Database
    pub database_path: PathBuf,

    // Outbound mail
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_starttls: bool,
    pub mail_from: String,

    // Unsubscribe links
    pub public_base_url: String,
    pub unsubscribe_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Upstream HN API
            hn_api_base_url: env_or_default("HN_API_BASE_URL", "https://hn.algolia.com/api/v1"),
            fetch_timeout: Duration::from_secs(parse_env_u64("FETCH_TIMEOUT_SECS", 10)?),
            max_search_pages: parse_env_u32("MAX_SEARCH_PAGES", 3)?,
            scan_window: Duration::from_secs(parse_env_u64("SCAN_WINDOW_DAYS", 14)? * 86_400),

            // Alert cycle
            poll_interval: Duration::from_secs(parse_env_u64("POLL_INTERVAL_SECS", 600)?),
            worker_concurrency: parse_env_usize("WORKER_CONCURRENCY", 4)?,
            advance_on_empty: parse_env_bool("ADVANCE_WATERMARK_ON_EMPTY", true)?,

            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/alerts.sqlite")),

            // Outbound mail
            smtp_host: required_env("SMTP_HOST")?,
            smtp_port: parse_env_u16("SMTP_PORT", 587)?,
            smtp_username: optional_env("SMTP_USERNAME"),
            smtp_password: optional_env("SMTP_PASSWORD"),
            smtp_starttls: parse_env_bool("SMTP_STARTTLS", true)?,
            mail_from: required_env("MAIL_FROM")?,

            // Unsubscribe links
            public_base_url: required_env("PUBLIC_BASE_URL")?,
            unsubscribe_secret: required_env("UNSUBSCRIBE_SECRET")?,
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                name: "WORKER_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_search_pages == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_SEARCH_PAGES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.smtp_host.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "SMTP_HOST".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if self.mail_from.parse::<lettre::message::Mailbox>().is_err() {
            return Err(ConfigError::InvalidValue {
                name: "MAIL_FROM".to_string(),
                message: format!("not a valid mailbox: '{}'", self.mail_from),
            });
        }
        if self.unsubscribe_secret.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "UNSUBSCRIBE_SECRET".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration with deterministic defaults for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            hn_api_base_url: "http://127.0.0.1:0/api/v1".to_string(),
            fetch_timeout: Duration::from_secs(5),
            max_search_pages: 3,
            scan_window: Duration::from_secs(14 * 86_400),
            poll_interval: Duration::from_secs(600),
            worker_concurrency: 4,
            advance_on_empty: true,
            database_path: PathBuf::from(":memory:"),
            smtp_host: "localhost".to_string(),
            smtp_port: 2525,
            smtp_username: None,
            smtp_password: None,
            smtp_starttls: false,
            mail_from: "alerts@hnalerts.test".to_string(),
            public_base_url: "https://hnalerts.test".to_string(),
            unsubscribe_secret: "test-secret".to_string(),
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
