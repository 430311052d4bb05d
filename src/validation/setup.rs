//! Aggregated setup check.

use serde::{Deserialize, Serialize};

use super::milestones::MilestoneOptions;
use super::{RepositoryValidator, ValidationResult};
use crate::github::GitHubTransport;
use crate::types::RepoId;

/// Milestones the setup check should require.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRequirement {
    pub titles: Vec<String>,
    #[serde(default)]
    pub options: MilestoneOptions,
}

/// Optional checks for [`RepositoryValidator::validate_github_setup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupOptions {
    /// Project board title to look for.
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub milestones: Option<MilestoneRequirement>,
}

/// Combined outcome of every check that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupReport {
    /// True when every check that ran passed.
    pub is_valid: bool,

    /// One human-readable line per check, in run order.
    pub summary: Vec<String>,

    pub repository: ValidationResult,
    pub permissions: ValidationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestones: Option<ValidationResult>,
}

fn summary_line(check: &str, result: &ValidationResult, ok: &str) -> String {
    if result.is_valid {
        return format!("✓ {}: {}", check, ok);
    }
    match &result.error {
        Some(error) => format!("✗ {}: {}", check, error),
        None => format!("✗ {}: failed", check),
    }
}

impl<T: GitHubTransport> RepositoryValidator<'_, T> {
    /// Runs the repository and permission checks, plus the project and
    /// milestone checks when requested.
    ///
    /// Every check runs even after an earlier one fails, so the report
    /// describes everything that needs fixing.
    pub async fn validate_github_setup(&self, repo: &RepoId, options: &SetupOptions) -> SetupReport {
        let mut summary = Vec::new();

        let repository = self.validate_repository(repo).await;
        summary.push(summary_line(
            "Repository access",
            &repository,
            &format!("{} is accessible", repo),
        ));

        let permissions = self.validate_permissions(repo).await;
        let granted = permissions
            .details
            .as_ref()
            .and_then(|d| d.get("permission"))
            .and_then(|p| p.as_str())
            .unwrap_or("sufficient")
            .to_string();
        summary.push(summary_line(
            "Permissions",
            &permissions,
            &format!("{} access", granted),
        ));

        let project = match &options.project {
            Some(title) => {
                let result = self.validate_project(repo, title).await;
                summary.push(summary_line(
                    "Project board",
                    &result,
                    &format!("'{}' found", title),
                ));
                Some(result)
            }
            None => None,
        };

        let milestones = match &options.milestones {
            Some(requirement) => {
                let result = self
                    .validate_milestones(repo, &requirement.titles, &requirement.options)
                    .await;
                let created = result
                    .details
                    .as_ref()
                    .and_then(|d| d.get("created"))
                    .and_then(|c| c.as_array())
                    .map_or(0, Vec::len);
                let ok = if created == 0 {
                    format!("{} required present", requirement.titles.len())
                } else {
                    format!("created {} missing", created)
                };
                summary.push(summary_line("Milestones", &result, &ok));
                Some(result)
            }
            None => None,
        };

        let is_valid = repository.is_valid
            && permissions.is_valid
            && project.as_ref().is_none_or(|r| r.is_valid)
            && milestones.as_ref().is_none_or(|r| r.is_valid);

        if is_valid {
            tracing::info!(repo = %repo, "GitHub setup validated");
        } else {
            tracing::warn!(repo = %repo, "GitHub setup validation failed");
        }

        SetupReport {
            is_valid,
            summary,
            repository,
            permissions,
            project,
            milestones,
        }
    }
}
