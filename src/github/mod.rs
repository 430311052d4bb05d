//! GitHub API client with resilient request execution.
//!
//! Key features:
//! - Typed error taxonomy translated from raw transport errors
//! - Exponential backoff retry for transient failures
//! - Rate-limit window tracking with a pre-flight gate and reset-aware waits
//! - Transport trait seam with an octocrab-backed implementation

mod api;
mod client;
mod error;
mod executor;
mod rate_limit;
mod retry;
mod transport;

pub use api::{IssueFilter, IssuePayload, Listing, NewLabel, NewMilestone};
pub use client::OctocrabTransport;
pub use error::{GitHubError, GitHubErrorKind, NetworkFailure};
pub use executor::GitHubClient;
pub use rate_limit::{RateLimitTracker, RateLimitWindow};
pub use retry::{MAX_RATE_LIMIT_WAIT, RetryBudget, RetryDecision, RetryOptions, is_retryable};
pub use transport::{ApiRequest, ApiResponse, GitHubTransport, RequestDescriptor, TransportError};
