//! Client configuration.
//!
//! Loaded from the environment with documented defaults. The token is
//! required; everything else is optional.
//!
//! | Variable                    | Field                | Default                  |
//! |-----------------------------|----------------------|--------------------------|
//! | `GITHUB_TOKEN`              | `token`              | (required)               |
//! | `GITHUB_USER_AGENT`         | `user_agent`         | `TPMAgent/1.0.0`         |
//! | `GITHUB_API_URL`            | `api_url`            | `https://api.github.com` |
//! | `GITHUB_MAX_RETRIES`        | `max_retries`        | `3`                      |
//! | `GITHUB_RETRY_DELAY_MS`     | `retry_delay`        | `1000`                   |
//! | `GITHUB_RATE_LIMIT_RETRIES` | `rate_limit_retries` | `3`                      |

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::github::RetryOptions;

pub const DEFAULT_USER_AGENT: &str = "TPMAgent/1.0.0";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const TOKEN_VAR: &str = "GITHUB_TOKEN";
const USER_AGENT_VAR: &str = "GITHUB_USER_AGENT";
const API_URL_VAR: &str = "GITHUB_API_URL";
const MAX_RETRIES_VAR: &str = "GITHUB_MAX_RETRIES";
const RETRY_DELAY_VAR: &str = "GITHUB_RETRY_DELAY_MS";
const RATE_LIMIT_RETRIES_VAR: &str = "GITHUB_RATE_LIMIT_RETRIES";

/// Errors from loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("GITHUB_TOKEN is not set; create a token with repo scope and export it")]
    MissingToken,

    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// GitHub client configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub token: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    #[serde(default = "default_retries")]
    pub rate_limit_retries: u32,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

impl ClientConfig {
    /// A configuration with the given token and every other field defaulted.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_agent: default_user_agent(),
            api_url: default_api_url(),
            max_retries: default_retries(),
            retry_delay: default_retry_delay(),
            rate_limit_retries: default_retries(),
        }
    }

    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = get(TOKEN_VAR).ok_or(ConfigError::MissingToken)?;
        let mut config = Self::with_token(token.trim());

        if let Some(user_agent) = get(USER_AGENT_VAR) {
            config.user_agent = user_agent;
        }
        if let Some(api_url) = get(API_URL_VAR) {
            config.api_url = api_url.trim_end_matches('/').to_string();
        }
        if let Some(value) = get(MAX_RETRIES_VAR) {
            config.max_retries = parse_number(MAX_RETRIES_VAR, &value)?;
        }
        if let Some(value) = get(RETRY_DELAY_VAR) {
            config.retry_delay = parse_number(RETRY_DELAY_VAR, &value)?;
        }
        if let Some(value) = get(RATE_LIMIT_RETRIES_VAR) {
            config.rate_limit_retries = parse_number(RATE_LIMIT_RETRIES_VAR, &value)?;
        }

        Ok(config)
    }

    /// Client-wide retry defaults derived from this configuration.
    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay),
            rate_limit_retries: self.rate_limit_retries,
            ..RetryOptions::DEFAULT
        }
    }
}

fn parse_number<N: std::str::FromStr>(var: &'static str, value: &str) -> Result<N, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        })
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("api_url", &self.api_url)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("rate_limit_retries", &self.rate_limit_retries)
            .finish()
    }
}
