//! GitHub API error taxonomy and the translator that produces it.
//!
//! Every way a GitHub request can fail is one variant of [`GitHubError`]. The
//! variants carry enough context to render a user-facing message without
//! re-inspecting the original transport error.
//!
//! [`GitHubError::from_transport`] is the translator: it is total (every raw
//! error maps to exactly one variant) and side-effect free.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rate_limit::{RATE_LIMIT_REMAINING, RATE_LIMIT_RESET, header_str, parse_reset};
use super::transport::TransportError;

/// Fallback detail for a 422 without a server-provided message.
const DEFAULT_VALIDATION_DETAIL: &str = "Invalid request parameters";

/// Which kind of network failure occurred before a response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkFailure {
    /// DNS resolution or TCP connect failed.
    Connection,
    /// The request timed out.
    Timeout,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkFailure::Connection => f.write_str("connection"),
            NetworkFailure::Timeout => f.write_str("timeout"),
        }
    }
}

/// A classified GitHub API failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitHubError {
    /// HTTP 401: the token is missing, invalid, or expired.
    #[error("GitHub authentication failed: the token is invalid, expired, or missing")]
    Authentication,

    /// HTTP 403 with an exhausted rate-limit window.
    #[error("{}", rate_limit_message(.reset_time))]
    RateLimit {
        /// When the window resets, from `x-ratelimit-reset` (Unix seconds).
        reset_time: Option<DateTime<Utc>>,
    },

    /// HTTP 404. `resource` is the request path with the API host stripped.
    #[error("GitHub resource not found: {resource}")]
    NotFound { resource: String },

    /// HTTP 403 that is not a rate limit. `action` is `METHOD /path`.
    #[error("Insufficient permissions for {action}")]
    Permission { action: String },

    /// HTTP 422 with GitHub's explanation.
    #[error("GitHub rejected the request: {detail}")]
    Validation { detail: String },

    /// No response was received.
    #[error("Network error while contacting GitHub ({detail})")]
    Network { detail: NetworkFailure },

    /// HTTP 5xx or any status not otherwise classified.
    #[error("GitHub server error (HTTP {status})")]
    ServerError { status: u16 },

    /// Anything that could not be classified.
    #[error("Unexpected GitHub error: {detail}")]
    Unknown { detail: String },
}

fn rate_limit_message(reset_time: &Option<DateTime<Utc>>) -> String {
    match reset_time {
        Some(t) => format!("GitHub API rate limit exceeded; the limit resets at {}", t.to_rfc3339()),
        None => "GitHub API rate limit exceeded".to_string(),
    }
}

/// Fieldless tag for a [`GitHubError`], used in logs and serialized results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitHubErrorKind {
    Authentication,
    RateLimit,
    NotFound,
    Permission,
    Validation,
    Network,
    ServerError,
    Unknown,
}

impl GitHubErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitHubErrorKind::Authentication => "authentication",
            GitHubErrorKind::RateLimit => "rate_limit",
            GitHubErrorKind::NotFound => "not_found",
            GitHubErrorKind::Permission => "permission",
            GitHubErrorKind::Validation => "validation",
            GitHubErrorKind::Network => "network",
            GitHubErrorKind::ServerError => "server_error",
            GitHubErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GitHubErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GitHubError {
    pub fn kind(&self) -> GitHubErrorKind {
        match self {
            GitHubError::Authentication => GitHubErrorKind::Authentication,
            GitHubError::RateLimit { .. } => GitHubErrorKind::RateLimit,
            GitHubError::NotFound { .. } => GitHubErrorKind::NotFound,
            GitHubError::Permission { .. } => GitHubErrorKind::Permission,
            GitHubError::Validation { .. } => GitHubErrorKind::Validation,
            GitHubError::Network { .. } => GitHubErrorKind::Network,
            GitHubError::ServerError { .. } => GitHubErrorKind::ServerError,
            GitHubError::Unknown { .. } => GitHubErrorKind::Unknown,
        }
    }

    /// Wraps a response body that could not be decoded into the expected model.
    pub fn unexpected_payload(what: &str, err: &serde_json::Error) -> Self {
        GitHubError::Unknown {
            detail: format!("unexpected {} payload: {}", what, err),
        }
    }

    /// Classifies a raw transport error.
    ///
    /// Responses are classified by status code. Failures without a response
    /// are classified by their message: connection and DNS failures become
    /// [`NetworkFailure::Connection`], timeouts [`NetworkFailure::Timeout`],
    /// anything else [`GitHubError::Unknown`].
    pub fn from_transport(err: &TransportError) -> Self {
        let Some(status) = err.status else {
            return classify_without_status(&err.message);
        };

        match status {
            401 => GitHubError::Authentication,
            403 if header_str(&err.headers, RATE_LIMIT_REMAINING) == Some("0") => {
                GitHubError::RateLimit {
                    reset_time: header_str(&err.headers, RATE_LIMIT_RESET).and_then(parse_reset),
                }
            }
            403 => GitHubError::Permission {
                action: match &err.request {
                    Some(req) => format!("{} {}", req.method, resource_path(&req.url)),
                    None => "the requested operation".to_string(),
                },
            },
            404 => GitHubError::NotFound {
                resource: err
                    .request
                    .as_ref()
                    .map(|req| resource_path(&req.url))
                    .unwrap_or_else(|| "unknown resource".to_string()),
            },
            422 => GitHubError::Validation {
                detail: err
                    .server_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_VALIDATION_DETAIL.to_string()),
            },
            other => GitHubError::ServerError { status: other },
        }
    }
}

impl From<&TransportError> for GitHubError {
    fn from(err: &TransportError) -> Self {
        GitHubError::from_transport(err)
    }
}

fn classify_without_status(message: &str) -> GitHubError {
    if is_connection_error(message) {
        GitHubError::Network {
            detail: NetworkFailure::Connection,
        }
    } else if is_timeout_error(message) {
        GitHubError::Network {
            detail: NetworkFailure::Timeout,
        }
    } else {
        GitHubError::Unknown {
            detail: message.to_string(),
        }
    }
}

/// Checks if an error message indicates a DNS or connect failure.
///
/// Matches both the errno-style names (`ENOTFOUND`, `ECONNREFUSED`) and the
/// wording used by hyper and the standard library.
fn is_connection_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("enotfound")
        || message_lower.contains("econnrefused")
        || message_lower.contains("connection refused")
        || message_lower.contains("connection reset")
        || message_lower.contains("dns error")
        || message_lower.contains("failed to lookup address")
        || message_lower.contains("error trying to connect")
}

fn is_timeout_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout") || message_lower.contains("timed out")
}

/// Strips scheme, host and query from a request URL, leaving the API path.
///
/// `https://api.github.com/repos/octo/widgets?per_page=100` becomes
/// `/repos/octo/widgets`. Relative paths pass through without their query.
fn resource_path(url: &str) -> String {
    let without_host = match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/")
        }
        None => url,
    };
    let path = without_host
        .split(['?', '#'])
        .next()
        .unwrap_or(without_host);
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
