//! Sprint milestone reconciliation.
//!
//! Required milestone titles are diffed against the repository's milestones
//! (open and closed). Missing ones can be created, each due one sprint after
//! the previous: the first at `start + sprint`, the next at `start + 2 sprints`,
//! and so on. Creation is sequential and stops at the first failure; milestones
//! already created are reported and left in place.

use std::collections::HashSet;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{RepositoryValidator, ValidationResult};
use crate::github::{GitHubTransport, NewMilestone};
use crate::types::RepoId;

/// Default sprint length.
pub const DEFAULT_SPRINT_WEEKS: u32 = 2;

/// How [`RepositoryValidator::validate_milestones`] treats missing milestones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneOptions {
    /// Create missing milestones instead of reporting them.
    #[serde(default)]
    pub create_missing: bool,

    #[serde(default = "default_sprint_weeks")]
    pub sprint_duration_weeks: u32,

    /// Start of the first sprint. Defaults to now.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
}

fn default_sprint_weeks() -> u32 {
    DEFAULT_SPRINT_WEEKS
}

impl Default for MilestoneOptions {
    fn default() -> Self {
        Self {
            create_missing: false,
            sprint_duration_weeks: DEFAULT_SPRINT_WEEKS,
            start_date: None,
        }
    }
}

impl MilestoneOptions {
    /// Options that create missing milestones with default sprint length.
    pub fn creating() -> Self {
        Self {
            create_missing: true,
            ..Self::default()
        }
    }
}

/// A milestone scheduled for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedMilestone {
    pub title: String,
    pub due_on: DateTime<Utc>,
}

/// Chains due dates over `titles`, one sprint apart, starting one sprint
/// after `start`.
///
/// Returns `None` when a due date falls outside the representable range.
pub fn plan_milestone_schedule<I, S>(
    titles: I,
    start: DateTime<Utc>,
    sprint_weeks: u32,
) -> Option<Vec<PlannedMilestone>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let sprint = Duration::try_weeks(i64::from(sprint_weeks))?;
    titles
        .into_iter()
        .scan(start, |cursor, title| {
            let due_on = cursor.checked_add_signed(sprint);
            if let Some(due) = due_on {
                *cursor = due;
            }
            Some(due_on.map(|due_on| PlannedMilestone {
                title: title.into(),
                due_on,
            }))
        })
        .collect()
}

/// Required titles absent from `existing`, in required order, each once.
fn missing_titles<'a>(required: &'a [String], existing: &HashSet<&str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    required
        .iter()
        .map(String::as_str)
        .filter(|title| !existing.contains(title) && seen.insert(*title))
        .collect()
}

fn rfc3339(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl<T: GitHubTransport> RepositoryValidator<'_, T> {
    /// Checks that every title in `required` exists as a milestone of `repo`,
    /// creating the missing ones when `options.create_missing` is set.
    pub async fn validate_milestones(
        &self,
        repo: &RepoId,
        required: &[String],
        options: &MilestoneOptions,
    ) -> ValidationResult {
        let milestones = match self.client.list_milestones(repo).await {
            Ok(milestones) => milestones,
            Err(err) => {
                return ValidationResult::invalid(
                    format!(
                        "Could not list milestones of {}: {}. Verify the token has repo scope \
                         and retry.",
                        repo, err
                    ),
                    json!({
                        "errorType": err.kind().as_str(),
                        "repository": repo.to_string(),
                    }),
                );
            }
        };

        let existing: HashSet<&str> = milestones
            .items
            .iter()
            .map(|m| m.title.as_str())
            .collect();
        let missing = missing_titles(required, &existing);

        if !missing.is_empty() && milestones.truncated {
            return ValidationResult::invalid(
                format!(
                    "Repository {} has more milestones than can be listed, so it is unknown \
                     whether {} exist. Close or delete unused milestones and retry.",
                    repo,
                    missing.join(", ")
                ),
                json!({
                    "errorType": "incomplete_milestone_list",
                    "repository": repo.to_string(),
                    "unconfirmed": missing,
                }),
            );
        }

        if missing.is_empty() {
            return ValidationResult::valid(json!({
                "repository": repo.to_string(),
                "required": required,
                "created": [],
            }));
        }

        if !options.create_missing {
            return ValidationResult::invalid(
                format!(
                    "Repository {} is missing required milestones: {}. \
                     Create them, or rerun with milestone creation enabled.",
                    repo,
                    missing.join(", ")
                ),
                json!({
                    "errorType": "missing_milestones",
                    "repository": repo.to_string(),
                    "missing": missing,
                }),
            );
        }

        let start = options.start_date.unwrap_or_else(Utc::now);
        let Some(plan) = plan_milestone_schedule(
            missing.iter().copied(),
            start,
            options.sprint_duration_weeks,
        ) else {
            return ValidationResult::invalid(
                format!(
                    "Cannot schedule milestones for {}: a sprint length of {} weeks puts due \
                     dates out of range. Use a shorter sprint duration.",
                    repo, options.sprint_duration_weeks
                ),
                json!({
                    "errorType": "invalid_schedule",
                    "repository": repo.to_string(),
                    "sprintDurationWeeks": options.sprint_duration_weeks,
                }),
            );
        };

        let mut created = Vec::with_capacity(plan.len());
        for planned in &plan {
            let request = NewMilestone {
                title: planned.title.clone(),
                description: None,
                due_on: Some(planned.due_on),
            };
            match self.client.create_milestone(repo, &request).await {
                Ok(milestone) => {
                    tracing::info!(
                        repo = %repo,
                        title = %planned.title,
                        number = milestone.number.0,
                        due_on = %rfc3339(&planned.due_on),
                        "Created milestone"
                    );
                    created.push(json!({
                        "title": planned.title,
                        "number": milestone.number.0,
                        "dueOn": rfc3339(&planned.due_on),
                    }));
                }
                Err(err) => {
                    tracing::warn!(repo = %repo, title = %planned.title, error = %err, "Milestone creation failed");
                    let created_titles: Vec<&str> = created
                        .iter()
                        .filter_map(|m| m["title"].as_str())
                        .collect();
                    let already = if created_titles.is_empty() {
                        String::from("none were created")
                    } else {
                        format!("already created: {}", created_titles.join(", "))
                    };
                    return ValidationResult::invalid(
                        format!(
                            "Failed to create milestone '{}' in {} ({}): {}. \
                             Check that the token can write to the repository, then rerun to \
                             create the rest.",
                            planned.title, repo, already, err
                        ),
                        json!({
                            "errorType": "milestone_creation_failed",
                            "repository": repo.to_string(),
                            "failed": planned.title,
                            "cause": err.kind().as_str(),
                            "created": created,
                        }),
                    );
                }
            }
        }

        ValidationResult::valid(json!({
            "repository": repo.to_string(),
            "required": required,
            "created": created,
        }))
    }
}
