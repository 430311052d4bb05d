//! Repository access check.

use serde_json::json;

use super::{RepositoryValidator, ValidationResult, access_failure};
use crate::github::GitHubTransport;
use crate::types::RepoId;

impl<T: GitHubTransport> RepositoryValidator<'_, T> {
    /// Checks that the token authenticates and can see `repo`.
    ///
    /// Calls "who am I" first so that a bad token is reported as an
    /// authentication problem rather than as a missing repository.
    pub async fn validate_repository(&self, repo: &RepoId) -> ValidationResult {
        let user = match self.client.get_authenticated_user().await {
            Ok(user) => user,
            Err(err) => return access_failure(repo, &err),
        };

        match self.client.get_repository(repo).await {
            Ok(repository) => {
                tracing::debug!(repo = %repo, user = %user.login, "Repository access verified");
                ValidationResult::valid(json!({
                    "repository": {
                        "name": repository.name,
                        "fullName": repository.full_name,
                        "private": repository.private,
                        "description": repository.description,
                    },
                    "authenticatedAs": user.login,
                }))
            }
            Err(err) => {
                tracing::info!(repo = %repo, error = %err, "Repository access check failed");
                access_failure(repo, &err)
            }
        }
    }
}
