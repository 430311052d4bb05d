//! Repository setup validation.
//!
//! Before the agent files issues into a repository it checks that the
//! repository is reachable, that the token can do what the agent needs, and
//! optionally that a project board and sprint milestones exist.
//!
//! Every check returns a [`ValidationResult`]; no error escapes a validation
//! workflow, so checks can be chained without handling errors at each step.
//! A failed result always carries a complete sentence naming the repository,
//! the suspected cause and a remediation hint.
//!
//! Checks:
//!
//! 1. **Repository access** ([`RepositoryValidator::validate_repository`])
//! 2. **Permissions** ([`RepositoryValidator::validate_permissions`]): "could not
//!    determine" and "determined but insufficient" are distinct outcomes.
//! 3. **Milestones** ([`RepositoryValidator::validate_milestones`]): reconciles
//!    required sprint milestones, optionally creating the missing ones.
//! 4. **Project** ([`RepositoryValidator::validate_project`])
//! 5. **Full setup** ([`RepositoryValidator::validate_github_setup`]): runs all
//!    of the above without short-circuiting.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::github::{GitHubClient, GitHubError, GitHubTransport};
use crate::types::RepoId;

pub mod milestones;
pub mod permissions;
pub mod projects;
pub mod repository;
pub mod setup;

pub use milestones::{MilestoneOptions, PlannedMilestone, plan_milestone_schedule};
pub use setup::{MilestoneRequirement, SetupOptions, SetupReport};

/// Outcome of one validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ValidationResult {
    pub fn valid(details: Value) -> Self {
        Self {
            is_valid: true,
            error: None,
            details: Some(details),
        }
    }

    pub fn invalid(error: impl Into<String>, details: Value) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            details: Some(details),
        }
    }

    /// The `errorType` recorded in the details, if any.
    pub fn error_type(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.get("errorType"))
            .and_then(Value::as_str)
    }
}

/// Runs validation checks against repositories through a shared client.
pub struct RepositoryValidator<'client, T> {
    client: &'client GitHubClient<T>,
}

impl<'client, T: GitHubTransport> RepositoryValidator<'client, T> {
    pub fn new(client: &'client GitHubClient<T>) -> Self {
        Self { client }
    }
}

/// Explains a failure to read `repo` or the authenticated user.
///
/// Shared by the repository and permission checks, which both start by
/// fetching the repository.
pub(crate) fn access_failure(repo: &RepoId, err: &GitHubError) -> ValidationResult {
    let message = match err {
        GitHubError::Authentication => format!(
            "Authentication failed while accessing {}: the GitHub token is invalid or expired. \
             Verify that GITHUB_TOKEN holds an active token with repo scope.",
            repo
        ),
        GitHubError::NotFound { .. } => format!(
            "Repository {} was not found or is not visible to this token. \
             Check the owner and repository name, and verify the token has repo scope \
             if the repository is private.",
            repo
        ),
        GitHubError::Permission { .. } => format!(
            "Access to repository {} was denied. \
             Verify the token has repo scope and that its account has been granted access.",
            repo
        ),
        other => format!(
            "Failed to access repository {}: {}. Retry later, and check GitHub status \
             if the problem persists.",
            repo, other
        ),
    };

    ValidationResult::invalid(
        message,
        json!({
            "errorType": err.kind().as_str(),
            "repository": repo.to_string(),
        }),
    )
}
