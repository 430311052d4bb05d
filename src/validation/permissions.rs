//! Permission check.
//!
//! The agent needs to create issues, create labels and modify projects. The
//! caller's collaborator permission level is looked up and mapped to
//! capabilities with [`PermissionLevel::capabilities`].
//!
//! Two failure outcomes are kept apart:
//!
//! - `permission_check_failed`: the level could not be determined (the lookup
//!   failed or returned an unrecognized role). We don't know.
//! - `insufficient_permissions`: the level is known and is not enough.

use serde_json::json;

use super::{RepositoryValidator, ValidationResult, access_failure};
use crate::github::GitHubTransport;
use crate::types::{PermissionLevel, RepoId};

impl<T: GitHubTransport> RepositoryValidator<'_, T> {
    /// Checks that the authenticated user can create issues, labels and
    /// project items in `repo`.
    pub async fn validate_permissions(&self, repo: &RepoId) -> ValidationResult {
        if let Err(err) = self.client.get_repository(repo).await {
            return access_failure(repo, &err);
        }
        let user = match self.client.get_authenticated_user().await {
            Ok(user) => user,
            Err(err) => return access_failure(repo, &err),
        };

        let level = match self
            .client
            .get_collaborator_permission(repo, &user.login)
            .await
        {
            Ok(permission) => match permission.level() {
                Some(level) => level,
                None => {
                    return ValidationResult::invalid(
                        format!(
                            "Could not determine the permission level of {} on {}: GitHub \
                             reported the unrecognized role '{}'. Check the role assigned to \
                             this account in the repository's access settings.",
                            user.login,
                            repo,
                            permission.role_name.as_deref().unwrap_or(&permission.permission)
                        ),
                        json!({
                            "errorType": "permission_check_failed",
                            "repository": repo.to_string(),
                            "user": user.login,
                        }),
                    );
                }
            },
            Err(err) => {
                tracing::warn!(repo = %repo, user = %user.login, error = %err, "Permission lookup failed");
                return ValidationResult::invalid(
                    format!(
                        "Could not determine the permission level of {} on {}: {}. \
                         Verify the token has repo scope and can read repository collaborators, \
                         then retry.",
                        user.login, repo, err
                    ),
                    json!({
                        "errorType": "permission_check_failed",
                        "repository": repo.to_string(),
                        "user": user.login,
                        "cause": err.kind().as_str(),
                    }),
                );
            }
        };

        permission_outcome(repo, &user.login, level)
    }
}

/// Builds the result for a known permission level.
fn permission_outcome(repo: &RepoId, login: &str, level: PermissionLevel) -> ValidationResult {
    let capabilities = level.capabilities();

    if capabilities.is_sufficient() {
        return ValidationResult::valid(json!({
            "repository": repo.to_string(),
            "user": login,
            "permission": level.as_str(),
            "capabilities": capabilities,
        }));
    }

    let missing = capabilities.missing_required();
    ValidationResult::invalid(
        format!(
            "Account {} has {} access to {}, which cannot {}. \
             Ask a repository administrator to grant maintain or admin access.",
            login,
            level,
            repo,
            missing.join(", ")
        ),
        json!({
            "errorType": "insufficient_permissions",
            "repository": repo.to_string(),
            "user": login,
            "permission": level.as_str(),
            "capabilities": capabilities,
            "missing": missing,
        }),
    )
}
