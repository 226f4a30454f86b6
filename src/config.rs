//! Runtime configuration for the agent.
//!
//! Everything the worker and sessions need is assembled into one
//! [`Config`] at startup and carried inside the application context; no
//! module reads the environment on its own. Credentials come from the
//! environment so they never appear in shell history.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable holding the marketplace account name.
pub const USERNAME_VAR: &str = "AUTOBID_USERNAME";
/// Environment variable holding the account password.
pub const PASSWORD_VAR: &str = "AUTOBID_PASSWORD";
/// Environment variable holding the optional security-question answer.
pub const SECURITY_ANSWER_VAR: &str = "AUTOBID_SECURITY_ANSWER";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    /// A search target argument was not in `name=url` form.
    #[error("invalid search target '{0}': expected name=url")]
    InvalidTarget(String),
}

/// Marketplace account credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Account name for the login form.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Security-question answer, when the account has one.
    pub security_answer: Option<String>,
}

impl Credentials {
    /// Reads credentials from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if username or password is
    /// unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            username: env::var(USERNAME_VAR).map_err(|_| ConfigError::MissingVar(USERNAME_VAR))?,
            password: env::var(PASSWORD_VAR).map_err(|_| ConfigError::MissingVar(PASSWORD_VAR))?,
            security_answer: env::var(SECURITY_ANSWER_VAR).ok(),
        })
    }
}

/// Site entry points used by every session.
#[derive(Debug, Clone)]
pub struct SiteUrls {
    /// The login form.
    pub login_url: String,
    /// Neutral page where pooled tabs are parked.
    pub home_url: String,
}

/// One configured search page for discovery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchTarget {
    /// Short name; also the key in the last-seen marker map.
    pub name: String,
    /// Search URL to crawl.
    pub url: String,
}

impl SearchTarget {
    /// Parses a `name=url` argument.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTarget`] if there is no `=` or
    /// either side is empty.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.split_once('=') {
            Some((name, url)) if !name.is_empty() && !url.is_empty() => Ok(Self {
                name: name.to_string(),
                url: url.to_string(),
            }),
            _ => Err(ConfigError::InvalidTarget(raw.to_string())),
        }
    }
}

/// Assembled runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the `SQLite` database file.
    pub database_path: PathBuf,
    /// Path of the last-seen marker file.
    pub marker_path: PathBuf,
    /// Number of browser pages in the pool.
    pub pool_size: usize,
    /// Worker idle sleep between empty claims.
    pub poll_interval: Duration,
    /// Account credentials.
    pub credentials: Credentials,
    /// Site entry points.
    pub site: SiteUrls,
    /// Search targets for discovery runs.
    pub targets: Vec<SearchTarget>,
    /// Extra avoid-list words merged into the policy filter.
    pub avoid_words: Vec<String>,
    /// Endpoint receiving session terminal statuses.
    pub status_endpoint: Option<String>,
    /// Endpoint receiving accepted-job payloads.
    pub payload_endpoint: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_search_target_parse() {
        let target = SearchTarget::parse("react=https://example.com/search?q=react").unwrap();
        assert_eq!(target.name, "react");
        assert_eq!(target.url, "https://example.com/search?q=react");
    }

    #[test]
    fn test_search_target_parse_invalid() {
        assert!(SearchTarget::parse("no-equals").is_err());
        assert!(SearchTarget::parse("=https://example.com").is_err());
        assert!(SearchTarget::parse("react=").is_err());
    }
}
