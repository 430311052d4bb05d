//! The resilient request executor.
//!
//! [`GitHubClient`] wraps a [`GitHubTransport`] and runs every request through
//! [`GitHubClient::execute`]:
//!
//! 1. refuse early if the tracked rate-limit window is exhausted,
//! 2. issue the request,
//! 3. refresh the tracked window from the response headers,
//! 4. on failure, classify the error and ask the [`RetryBudget`] whether to
//!    give up, wait for the rate-limit reset, or back off exponentially.
//!
//! A backoff that would end before the tracked window resets is skipped: the
//! call fails with [`GitHubError::RateLimit`] at once, since the next pre-flight
//! check would refuse anyway.
//!
//! The client is the single owner of its [`RateLimitTracker`]. Concurrent
//! calls share the tracker but each call keeps its own attempt counter.

use std::future::Future;

use chrono::{TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::GitHubError;
use super::rate_limit::{RateLimitTracker, RateLimitWindow};
use super::retry::{RetryBudget, RetryDecision, RetryOptions};
use super::transport::{ApiRequest, ApiResponse, GitHubTransport, TransportError};

/// A GitHub API client with rate-limit-aware retry.
pub struct GitHubClient<T> {
    transport: T,
    rate_limit: RateLimitTracker,
    retry: RetryOptions,
}

impl<T: GitHubTransport> GitHubClient<T> {
    /// Creates a client with the default retry options.
    pub fn new(transport: T) -> Self {
        Self::with_retry_options(transport, RetryOptions::DEFAULT)
    }

    /// Creates a client with custom client-wide retry options.
    pub fn with_retry_options(transport: T, retry: RetryOptions) -> Self {
        Self {
            transport,
            rate_limit: RateLimitTracker::new(),
            retry,
        }
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The client-wide retry defaults.
    pub fn retry_options(&self) -> RetryOptions {
        self.retry
    }

    /// A snapshot of the last observed rate-limit window.
    pub fn rate_limit(&self) -> Option<RateLimitWindow> {
        self.rate_limit.peek()
    }

    /// Runs `operation` with rate-limit gating and retry.
    ///
    /// `operation` must perform exactly one request per invocation. It is
    /// invoked at most `max_retries + 1` times. `options` overrides the
    /// client-wide defaults for this call only.
    ///
    /// # Errors
    ///
    /// Returns the classified error when the rate-limit window is known to be
    /// exhausted, when a non-retryable error occurs, or when the last allowed
    /// attempt fails.
    pub async fn execute<R, F, Fut>(
        &self,
        mut operation: F,
        options: Option<RetryOptions>,
    ) -> Result<R, GitHubError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse<R>, TransportError>>,
    {
        let options = options.unwrap_or(self.retry);
        let mut budget = RetryBudget::new();
        let mut attempt = 0u32;

        loop {
            if let Some(window) = self.rate_limit.peek() {
                if window.is_exhausted_at(Utc::now()) {
                    tracing::debug!(
                        attempt,
                        reset = %window.reset_time,
                        "Rate limit exhausted; not sending request"
                    );
                    return Err(GitHubError::RateLimit {
                        reset_time: Some(window.reset_time),
                    });
                }
            }

            let error = match operation().await {
                Ok(response) => {
                    self.rate_limit.update(&response.headers);
                    return Ok(response.body);
                }
                Err(raw) => {
                    self.rate_limit.update(&raw.headers);
                    GitHubError::from_transport(&raw)
                }
            };

            match budget.next(&error, attempt, &options, Utc::now()) {
                RetryDecision::GiveUp => {
                    tracing::debug!(
                        attempt,
                        kind = %error.kind(),
                        error = %error,
                        "GitHub request failed"
                    );
                    return Err(error);
                }
                RetryDecision::WaitForReset(wait) => {
                    tracing::warn!(
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited; waiting for reset before retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                RetryDecision::Backoff(delay) => {
                    if let Some(window) = self.exhausted_after(delay) {
                        tracing::debug!(
                            attempt,
                            reset = %window.reset_time,
                            "Rate limit still exhausted after backoff; giving up"
                        );
                        return Err(GitHubError::RateLimit {
                            reset_time: Some(window.reset_time),
                        });
                    }
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        kind = %error.kind(),
                        error = %error,
                        "Retrying GitHub request after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }

    /// The tracked window, if it will still be exhausted once `delay` has
    /// passed.
    fn exhausted_after(&self, delay: std::time::Duration) -> Option<RateLimitWindow> {
        let window = self.rate_limit.peek()?;
        let resume_at = TimeDelta::from_std(delay)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))?;
        window.is_exhausted_at(resume_at).then_some(window)
    }

    /// Sends one API request through [`execute`](Self::execute).
    pub async fn send(&self, request: ApiRequest) -> Result<Value, GitHubError> {
        self.execute(|| self.transport.send(request.clone()), None)
            .await
    }

    /// `GET` a path and decode the body as `D`.
    pub async fn get_json<D: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        what: &str,
    ) -> Result<D, GitHubError> {
        let body = self.send(ApiRequest::get(path)).await?;
        serde_json::from_value(body).map_err(|e| GitHubError::unexpected_payload(what, &e))
    }

    /// `POST` a JSON body to a path and decode the response as `D`.
    pub async fn post_json<D: DeserializeOwned>(
        &self,
        path: impl Into<String>,
        body: Value,
        what: &str,
    ) -> Result<D, GitHubError> {
        let body = self.send(ApiRequest::post(path, body)).await?;
        serde_json::from_value(body).map_err(|e| GitHubError::unexpected_payload(what, &e))
    }
}

impl<T> std::fmt::Debug for GitHubClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("rate_limit", &self.rate_limit)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::error::NetworkFailure;
    use crate::test_utils::{ScriptedResponse, ScriptedTransport, rate_limit_headers};
    use http::{HeaderMap, Method};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn fast_options(max_retries: u32) -> RetryOptions {
        RetryOptions::new(
            max_retries,
            Duration::from_millis(10),
            Duration::from_millis(100),
            2.0,
        )
    }

    fn server_error() -> TransportError {
        TransportError::http(503, HeaderMap::new(), None, None)
    }

    fn client() -> GitHubClient<ScriptedTransport> {
        GitHubClient::new(ScriptedTransport::new())
    }

    // ─── Retry Behaviour ──────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let client = client();
        let counter = Arc::new(AtomicU32::new(0));

        let result = client
            .execute(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(ApiResponse::new(42, HeaderMap::new())) }
                },
                None,
            )
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flaky_server_error_is_retried_once_with_sleep() {
        let client = client();
        let counter = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = client
            .execute(
                || {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if count == 0 {
                            Err(server_error())
                        } else {
                            Ok(ApiResponse::new("ok", HeaderMap::new()))
                        }
                    }
                },
                None,
            )
            .await;

        assert_eq!(result, Ok("ok"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn authentication_failure_is_not_retried() {
        let client = client();
        let counter = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = client
            .execute(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(TransportError::http(401, HeaderMap::new(), None, None)) }
                },
                None,
            )
            .await;

        assert_eq!(result, Err(GitHubError::Authentication));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_retryable_makes_n_plus_one_calls() {
        for max_retries in [0u32, 1, 3, 5] {
            let client = client();
            let counter = Arc::new(AtomicU32::new(0));

            let result: Result<(), _> = client
                .execute(
                    || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        async { Err(server_error()) }
                    },
                    Some(fast_options(max_retries)),
                )
                .await;

            assert_eq!(result, Err(GitHubError::ServerError { status: 503 }));
            assert_eq!(counter.load(Ordering::SeqCst), max_retries + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn network_errors_are_retried() {
        let client = client();
        let counter = Arc::new(AtomicU32::new(0));

        let result = client
            .execute(
                || {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if count < 2 {
                            Err(TransportError::without_response("operation timed out", None))
                        } else {
                            Ok(ApiResponse::new(7, HeaderMap::new()))
                        }
                    }
                },
                Some(fast_options(3)),
            )
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_network_retries_report_network_error() {
        let client = client();
        let result: Result<(), _> = client
            .execute(
                || async {
                    Err(TransportError::without_response(
                        "connect ECONNREFUSED 127.0.0.1:443",
                        None,
                    ))
                },
                Some(fast_options(2)),
            )
            .await;

        assert_eq!(
            result,
            Err(GitHubError::Network {
                detail: NetworkFailure::Connection
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_delays_grow_exponentially() {
        let client = client();
        let started = Instant::now();

        let _: Result<(), _> = client
            .execute(|| async { Err(server_error()) }, None)
            .await;

        // 1s + 2s + 4s with the defaults.
        assert_eq!(started.elapsed().as_secs(), 7);
    }

    // ─── Rate Limiting ────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn success_headers_update_the_tracker() {
        let client = client();
        let reset = Utc::now().timestamp() + 3600;

        client
            .execute(
                || async move { Ok(ApiResponse::new((), rate_limit_headers(4999, 5000, reset))) },
                None,
            )
            .await
            .unwrap();

        let window = client.rate_limit().unwrap();
        assert_eq!(window.remaining, 4999);
        assert_eq!(window.limit, 5000);
        assert_eq!(window.reset_time.timestamp(), reset);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_window_short_circuits_without_calling() {
        let client = client();
        let reset = Utc::now().timestamp() + 600;

        client
            .execute(
                || async move { Ok(ApiResponse::new((), rate_limit_headers(0, 5000, reset))) },
                None,
            )
            .await
            .unwrap();

        let counter = Arc::new(AtomicU32::new(0));
        let result: Result<(), _> = client
            .execute(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok(ApiResponse::new((), HeaderMap::new())) }
                },
                None,
            )
            .await;

        assert!(matches!(
            result,
            Err(GitHubError::RateLimit { reset_time: Some(t) }) if t.timestamp() == reset
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn past_reset_does_not_short_circuit() {
        let client = client();
        let reset = Utc::now().timestamp() - 10;

        client
            .execute(
                || async move { Ok(ApiResponse::new((), rate_limit_headers(0, 5000, reset))) },
                None,
            )
            .await
            .unwrap();

        let result = client
            .execute(|| async { Ok(ApiResponse::new(1, HeaderMap::new())) }, None)
            .await;
        assert_eq!(result, Ok(1));
    }

    // Uses real time: the wait is computed against the wall clock.
    #[tokio::test]
    async fn near_rate_limit_reset_is_waited_out() {
        let client = client();
        let reset = Utc::now().timestamp() + 1;
        let counter = Arc::new(AtomicU32::new(0));

        let result = client
            .execute(
                || {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if count == 0 {
                            Err(TransportError::http(
                                403,
                                rate_limit_headers(0, 60, reset),
                                None,
                                Some("API rate limit exceeded".into()),
                            ))
                        } else {
                            Ok(ApiResponse::new("done", rate_limit_headers(59, 60, reset + 3600)))
                        }
                    }
                },
                None,
            )
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(Utc::now().timestamp() >= reset);
        assert_eq!(client.rate_limit().unwrap().remaining, 59);
    }

    #[tokio::test(start_paused = true)]
    async fn far_reset_is_not_waited_for() {
        let client = client();
        let reset = Utc::now().timestamp() + 3600;
        let counter = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), _> = client
            .execute(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Err(TransportError::http(
                            403,
                            rate_limit_headers(0, 60, reset),
                            None,
                            None,
                        ))
                    }
                },
                Some(fast_options(3)),
            )
            .await;

        // One real attempt; the backoff is skipped because the window stays
        // exhausted past it.
        assert!(matches!(
            result,
            Err(GitHubError::RateLimit { reset_time: Some(t) }) if t.timestamp() == reset
        ));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_with_exhausted_window_skips_backoff() {
        let client = client();
        let reset = Utc::now().timestamp() + 3600;
        let counter = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), _> = client
            .execute(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Err(TransportError::http(
                            502,
                            rate_limit_headers(0, 60, reset),
                            None,
                            None,
                        ))
                    }
                },
                Some(fast_options(3)),
            )
            .await;

        assert!(matches!(result, Err(GitHubError::RateLimit { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_quota_still_backs_off() {
        let client = client();
        let reset = Utc::now().timestamp() + 3600;
        let counter = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = client
            .execute(
                || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Err(TransportError::http(
                            502,
                            rate_limit_headers(10, 60, reset),
                            None,
                            None,
                        ))
                    }
                },
                Some(fast_options(2)),
            )
            .await;

        assert_eq!(result, Err(GitHubError::ServerError { status: 502 }));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    // ─── Transport Integration ────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn send_retries_through_the_transport() {
        let transport = ScriptedTransport::new().on(
            Method::GET,
            "/user",
            [
                ScriptedResponse::status(502),
                ScriptedResponse::json(serde_json::json!({"login": "octocat", "id": 1})),
            ],
        );
        let client = GitHubClient::new(transport);

        let body = client.send(ApiRequest::get("/user")).await.unwrap();
        assert_eq!(body["login"], "octocat");
        assert_eq!(client.transport().count(&Method::GET, "/user"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_reports_the_request_path() {
        let client = client();
        let err = client
            .send(ApiRequest::get("/repos/octo/missing"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GitHubError::NotFound {
                resource: "/repos/octo/missing".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_payload_is_unknown() {
        let transport = ScriptedTransport::new().on(
            Method::GET,
            "/user",
            [ScriptedResponse::json(serde_json::json!({"unexpected": true}))],
        );
        let client = GitHubClient::new(transport);

        let err = client
            .get_json::<crate::types::AuthenticatedUser>("/user", "user")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::github::GitHubErrorKind::Unknown);
    }
}
