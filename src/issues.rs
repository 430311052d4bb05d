//! Issue creation with label and milestone resolution.
//!
//! Labels the repository lacks are created before the issue. A label that
//! cannot be created is dropped from the request and reported as a warning;
//! so is a milestone title that does not resolve. Only the issue create
//! itself can fail the operation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::github::{GitHubClient, GitHubError, GitHubTransport, IssuePayload, NewLabel};
use crate::types::{Issue, MilestoneNumber, RepoId};

/// Colour for labels created on demand (GitHub's default grey).
pub const DEFAULT_LABEL_COLOR: &str = "ededed";

/// An issue to file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIssue {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Milestone title, resolved to its number before creation.
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub assignees: Vec<String>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// The created issue and anything that was skipped along the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedIssue {
    pub issue: Issue,
    pub warnings: Vec<String>,
}

impl<T: GitHubTransport> GitHubClient<T> {
    /// Files `issue` in `repo`, creating missing labels first.
    pub async fn file_issue(
        &self,
        repo: &RepoId,
        issue: &NewIssue,
    ) -> Result<CreatedIssue, GitHubError> {
        let mut warnings = Vec::new();

        let labels = self
            .ensure_labels(repo, &issue.labels, &mut warnings)
            .await;
        let milestone = match &issue.milestone {
            Some(title) => self.resolve_milestone(repo, title, &mut warnings).await,
            None => None,
        };

        let payload = IssuePayload {
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels,
            milestone,
            assignees: issue.assignees.clone(),
        };
        let created = self.create_issue(repo, &payload).await?;

        tracing::info!(
            repo = %repo,
            issue = %created.number,
            warnings = warnings.len(),
            "Created issue"
        );
        Ok(CreatedIssue {
            issue: created,
            warnings,
        })
    }

    /// Returns the labels that exist (or were created), in request order.
    async fn ensure_labels(
        &self,
        repo: &RepoId,
        requested: &[String],
        warnings: &mut Vec<String>,
    ) -> Vec<String> {
        if requested.is_empty() {
            return Vec::new();
        }

        let existing: HashSet<String> = match self.list_labels(repo).await {
            Ok(labels) => labels.into_iter().map(|l| l.name.to_lowercase()).collect(),
            Err(err) => {
                warnings.push(format!(
                    "Could not list labels of {} ({}); labels were sent as given.",
                    repo, err
                ));
                return requested.to_vec();
            }
        };

        let mut kept = Vec::with_capacity(requested.len());
        let mut seen = HashSet::new();
        for name in requested {
            // Label names are case-insensitive on GitHub.
            let key = name.to_lowercase();
            if !seen.insert(key.clone()) {
                continue;
            }
            if existing.contains(&key) {
                kept.push(name.clone());
                continue;
            }

            let label = NewLabel {
                name: name.clone(),
                color: DEFAULT_LABEL_COLOR.to_string(),
                description: None,
            };
            match self.create_label(repo, &label).await {
                Ok(_) => {
                    tracing::debug!(repo = %repo, label = %name, "Created label");
                    kept.push(name.clone());
                }
                Err(err) => {
                    tracing::warn!(repo = %repo, label = %name, error = %err, "Label creation failed");
                    warnings.push(format!(
                        "Label '{}' could not be created in {} ({}) and was left off the issue.",
                        name, repo, err
                    ));
                }
            }
        }
        kept
    }

    async fn resolve_milestone(
        &self,
        repo: &RepoId,
        title: &str,
        warnings: &mut Vec<String>,
    ) -> Option<MilestoneNumber> {
        match self.list_milestones(repo).await {
            Ok(milestones) => {
                let number = milestones
                    .items
                    .iter()
                    .find(|m| m.title == title)
                    .map(|m| m.number);
                if number.is_none() {
                    warnings.push(format!(
                        "Milestone '{}' does not exist in {}; the issue was created without one.",
                        title, repo
                    ));
                }
                number
            }
            Err(err) => {
                warnings.push(format!(
                    "Could not list milestones of {} ({}); the issue was created without one.",
                    repo, err
                ));
                None
            }
        }
    }
}
