//! TPM GitHub - a resilient GitHub client and repository setup validation
//! for the TPM agent.
//!
//! Every request goes through [`github::GitHubClient::execute`], which gates on
//! the tracked rate-limit window, translates failures into
//! [`github::GitHubError`] and retries transient ones with exponential backoff.
//! The [`validation`] workflows turn every failure into a
//! [`validation::ValidationResult`] with an actionable message.

pub mod config;
pub mod github;
pub mod issues;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_utils;
