//! The transport seam: one HTTP request per call.
//!
//! The resilient executor never talks HTTP itself. It drives a
//! [`GitHubTransport`], which performs exactly one request and hands back
//! either the response envelope (body + headers) or a raw [`TransportError`].
//! The production implementation is [`OctocrabTransport`](super::OctocrabTransport);
//! tests use a scripted in-memory transport.

use std::fmt;
use std::future::Future;

use http::{HeaderMap, Method};
use serde_json::Value;
use thiserror::Error;

/// A single GitHub API request.
///
/// `path` is relative to the configured API URL (e.g. `/repos/octo/widgets`)
/// and may carry a query string.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Describes this request for error reporting, resolved against `base_url`.
    pub fn descriptor(&self, base_url: &str) -> RequestDescriptor {
        RequestDescriptor {
            method: self.method.clone(),
            url: format!("{}{}", base_url.trim_end_matches('/'), self.path),
        }
    }
}

/// A successful response: decoded body plus the response headers.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub body: T,
    pub headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    pub fn new(body: T, headers: HeaderMap) -> Self {
        Self { body, headers }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            body: f(self.body),
            headers: self.headers,
        }
    }
}

/// Method and absolute URL of a request, carried by transport errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: String,
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A raw, unclassified transport failure.
///
/// Either an HTTP response with a non-success status (`status` is set) or a
/// failure before any response arrived (`status` is `None`, `message` holds the
/// underlying error chain). Classification happens in
/// [`GitHubError::from_transport`](super::GitHubError::from_transport).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    /// HTTP status, if a response was received.
    pub status: Option<u16>,
    /// Response headers; empty when no response was received.
    pub headers: HeaderMap,
    /// The request that failed, if known.
    pub request: Option<RequestDescriptor>,
    /// Human-readable description of the failure.
    pub message: String,
    /// The `message` field of GitHub's JSON error body, if any.
    pub server_message: Option<String>,
}

impl TransportError {
    /// An HTTP error response.
    pub fn http(
        status: u16,
        headers: HeaderMap,
        request: Option<RequestDescriptor>,
        server_message: Option<String>,
    ) -> Self {
        let message = match &server_message {
            Some(m) => format!("HTTP {}: {}", status, m),
            None => format!("HTTP {}", status),
        };
        Self {
            status: Some(status),
            headers,
            request,
            message,
            server_message,
        }
    }

    /// A failure with no HTTP response (DNS, connect, timeout, ...).
    pub fn without_response(message: impl Into<String>, request: Option<RequestDescriptor>) -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            request,
            message: message.into(),
            server_message: None,
        }
    }
}

/// Performs GitHub API requests.
///
/// Implementations must issue exactly one HTTP request per call and must not
/// retry; retry and rate-limit policy belong to the executor.
pub trait GitHubTransport {
    /// The API base URL requests are resolved against.
    fn base_url(&self) -> &str;

    /// Send one request and return its JSON body and headers.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse<Value>, TransportError>> + Send;
}
