//! Octocrab-backed transport.
//!
//! `OctocrabTransport` uses octocrab's raw request methods so that status
//! codes and response headers (including the `x-ratelimit-*` family) reach the
//! executor untouched. Error mapping and retry live in the executor, not here;
//! octocrab's own retry layer is switched off so one `send` is one request.

use std::future::Future;

use http::Method;
use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig;
use serde::Deserialize;
use serde_json::Value;

use super::executor::GitHubClient;
use super::transport::{ApiRequest, ApiResponse, GitHubTransport, TransportError};
use crate::config::ClientConfig;

/// GitHub's JSON error body.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// A GitHub transport over an `Octocrab` instance.
#[derive(Clone)]
pub struct OctocrabTransport {
    /// The underlying octocrab client.
    client: Octocrab,

    /// API base URL, used for error descriptors.
    base_url: String,
}

impl OctocrabTransport {
    /// Wraps a pre-configured Octocrab instance.
    ///
    /// Use this when you need custom authentication (e.g., GitHub App
    /// installation tokens).
    pub fn new(client: Octocrab, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Builds a token-authenticated transport from configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder()
            .personal_token(config.token.clone())
            .base_uri(config.api_url.as_str())?
            .add_header(http::header::USER_AGENT, config.user_agent.clone())
            .add_retry_config(RetryConfig::None)
            .build()?;
        Ok(Self::new(client, config.api_url.clone()))
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse<Value>, TransportError> {
        let descriptor = request.descriptor(&self.base_url);
        let path = request.path.as_str();

        let result = if request.method == Method::GET {
            self.client._get(path).await
        } else if request.method == Method::POST {
            self.client._post(path, request.body.as_ref()).await
        } else {
            return Err(TransportError::without_response(
                format!("unsupported method {}", request.method),
                Some(descriptor),
            ));
        };

        let response = result.map_err(|e| {
            TransportError::without_response(error_chain(&e), Some(descriptor.clone()))
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = self.client.body_to_string(response).await.map_err(|e| {
            TransportError::without_response(error_chain(&e), Some(descriptor.clone()))
        })?;

        if !status.is_success() {
            let server_message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .map(|b| b.message);
            return Err(TransportError::http(
                status.as_u16(),
                headers,
                Some(descriptor),
                server_message,
            ));
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                TransportError::without_response(
                    format!("invalid JSON in response body: {}", e),
                    Some(descriptor),
                )
            })?
        };

        Ok(ApiResponse::new(body, headers))
    }
}

impl GitHubTransport for OctocrabTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse<Value>, TransportError>> + Send {
        self.dispatch(request)
    }
}

impl GitHubClient<OctocrabTransport> {
    /// Builds a client with the configured transport and retry defaults.
    pub fn from_config(config: &ClientConfig) -> Result<Self, octocrab::Error> {
        let transport = OctocrabTransport::from_config(config)?;
        Ok(Self::with_retry_options(transport, config.retry_options()))
    }
}

/// Renders an error and all of its sources, so that DNS, connect and timeout
/// causes buried in the chain stay visible to classification.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl std::fmt::Debug for OctocrabTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
