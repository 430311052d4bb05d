//! Typed GitHub endpoints used by the workflows.
//!
//! Each method is one logical API operation issued through
//! [`GitHubClient::execute`], so every request (and every page of a list)
//! gets rate-limit gating and retry. Only the endpoints the validation and
//! issue workflows need are covered.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::GitHubError;
use super::executor::GitHubClient;
use super::transport::GitHubTransport;
use crate::types::{
    AuthenticatedUser, CollaboratorPermission, Issue, Label, Milestone, MilestoneNumber, Project,
    RepoId, Repository,
};

/// Page size for list endpoints (GitHub's maximum).
const PER_PAGE: usize = 100;

/// Safety limit to prevent runaway pagination.
const MAX_PAGES: u32 = 10;

/// GraphQL query for the Projects (v2) boards linked to a repository.
const REPOSITORY_PROJECTS_QUERY: &str = r#"
query($owner: String!, $repo: String!) {
    repository(owner: $owner, name: $repo) {
        projectsV2(first: 100) {
            nodes {
                number
                title
                url
            }
        }
    }
}
"#;

/// Items from a paginated list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    /// Pagination stopped at the page limit; more items may exist.
    pub truncated: bool,
}

/// Which issues to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFilter {
    #[default]
    Open,
    Closed,
    All,
}

impl IssueFilter {
    fn as_query(&self) -> &'static str {
        match self {
            IssueFilter::Open => "open",
            IssueFilter::Closed => "closed",
            IssueFilter::All => "all",
        }
    }
}

/// Body of `POST /repos/{owner}/{repo}/milestones`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewMilestone {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_due_on"
    )]
    pub due_on: Option<DateTime<Utc>>,
}

fn serialize_due_on<S: serde::Serializer>(
    due_on: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match due_on {
        Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => serializer.serialize_none(),
    }
}

/// Body of `POST /repos/{owner}/{repo}/labels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLabel {
    pub name: String,
    /// Six hex digits, no leading `#`.
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `POST /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuePayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<MilestoneNumber>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

// ─── GraphQL Types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectsQueryData {
    repository: Option<ProjectsRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectsRepository {
    projects_v2: ProjectConnection,
}

#[derive(Debug, Deserialize)]
struct ProjectConnection {
    #[serde(default)]
    nodes: Vec<Option<Project>>,
}

fn repo_path(repo: &RepoId) -> String {
    format!(
        "/repos/{}/{}",
        urlencoding::encode(&repo.owner),
        urlencoding::encode(&repo.repo)
    )
}

impl<T: GitHubTransport> GitHubClient<T> {
    /// `GET /user`: who the token authenticates as.
    pub async fn get_authenticated_user(&self) -> Result<AuthenticatedUser, GitHubError> {
        self.get_json("/user", "user").await
    }

    /// `GET /repos/{owner}/{repo}`.
    pub async fn get_repository(&self, repo: &RepoId) -> Result<Repository, GitHubError> {
        self.get_json(repo_path(repo), "repository").await
    }

    /// `GET /repos/{owner}/{repo}/collaborators/{username}/permission`.
    pub async fn get_collaborator_permission(
        &self,
        repo: &RepoId,
        username: &str,
    ) -> Result<CollaboratorPermission, GitHubError> {
        let path = format!(
            "{}/collaborators/{}/permission",
            repo_path(repo),
            urlencoding::encode(username)
        );
        self.get_json(path, "collaborator permission").await
    }

    /// All milestones, open and closed.
    ///
    /// Reports truncation so callers that create missing milestones can
    /// avoid duplicating ones past the page limit.
    pub async fn list_milestones(&self, repo: &RepoId) -> Result<Listing<Milestone>, GitHubError> {
        self.get_paginated(
            &format!("{}/milestones", repo_path(repo)),
            Some("state=all"),
            "milestone list",
        )
        .await
    }

    pub async fn create_milestone(
        &self,
        repo: &RepoId,
        milestone: &NewMilestone,
    ) -> Result<Milestone, GitHubError> {
        let body = serde_json::to_value(milestone)
            .map_err(|e| GitHubError::unexpected_payload("milestone request", &e))?;
        self.post_json(format!("{}/milestones", repo_path(repo)), body, "milestone")
            .await
    }

    pub async fn list_labels(&self, repo: &RepoId) -> Result<Vec<Label>, GitHubError> {
        let listing = self
            .get_paginated(&format!("{}/labels", repo_path(repo)), None, "label list")
            .await?;
        Ok(listing.items)
    }

    pub async fn create_label(&self, repo: &RepoId, label: &NewLabel) -> Result<Label, GitHubError> {
        let body = serde_json::to_value(label)
            .map_err(|e| GitHubError::unexpected_payload("label request", &e))?;
        self.post_json(format!("{}/labels", repo_path(repo)), body, "label")
            .await
    }

    /// Lists issues, excluding pull requests (which share the endpoint).
    pub async fn list_issues(
        &self,
        repo: &RepoId,
        filter: IssueFilter,
    ) -> Result<Vec<Issue>, GitHubError> {
        let query = format!("state={}", filter.as_query());
        let listing: Listing<Issue> = self
            .get_paginated(
                &format!("{}/issues", repo_path(repo)),
                Some(&query),
                "issue list",
            )
            .await?;
        Ok(listing
            .items
            .into_iter()
            .filter(|i| !i.is_pull_request())
            .collect())
    }

    pub async fn create_issue(
        &self,
        repo: &RepoId,
        issue: &IssuePayload,
    ) -> Result<Issue, GitHubError> {
        let body = serde_json::to_value(issue)
            .map_err(|e| GitHubError::unexpected_payload("issue request", &e))?;
        self.post_json(format!("{}/issues", repo_path(repo)), body, "issue")
            .await
    }

    /// Projects (v2) boards linked to the repository, via GraphQL.
    pub async fn list_repository_projects(
        &self,
        repo: &RepoId,
    ) -> Result<Vec<Project>, GitHubError> {
        let body = json!({
            "query": REPOSITORY_PROJECTS_QUERY,
            "variables": { "owner": repo.owner, "repo": repo.repo },
        });
        let response: GraphQlResponse<ProjectsQueryData> =
            self.post_json("/graphql", body, "projects query").await?;

        if let Some(err) = response.errors.first() {
            return Err(graphql_error(repo, err, &response.errors));
        }

        let repository = response
            .data
            .and_then(|d| d.repository)
            .ok_or_else(|| GitHubError::NotFound {
                resource: repo_path(repo),
            })?;

        Ok(repository.projects_v2.nodes.into_iter().flatten().collect())
    }

    async fn get_paginated<D: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&str>,
        what: &str,
    ) -> Result<Listing<D>, GitHubError> {
        let mut items = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = match query {
                Some(q) => format!("{}?{}&per_page={}&page={}", path, q, PER_PAGE, page),
                None => format!("{}?per_page={}&page={}", path, PER_PAGE, page),
            };
            let batch: Vec<D> = self.get_json(url, what).await?;
            let is_last_page = batch.len() < PER_PAGE;
            items.extend(batch);

            if is_last_page {
                return Ok(Listing {
                    items,
                    truncated: false,
                });
            }
        }

        tracing::warn!(
            path,
            pages = MAX_PAGES,
            "Stopped paginating at the page limit; results may be incomplete"
        );
        Ok(Listing {
            items,
            truncated: true,
        })
    }
}

/// Maps GraphQL errors (which arrive with HTTP 200) onto the taxonomy.
fn graphql_error(repo: &RepoId, first: &GraphQlError, all: &[GraphQlError]) -> GitHubError {
    match first.error_type.as_deref() {
        Some("NOT_FOUND") => GitHubError::NotFound {
            resource: repo_path(repo),
        },
        Some("FORBIDDEN") | Some("INSUFFICIENT_SCOPES") => GitHubError::Permission {
            action: format!("read projects of {}", repo),
        },
        _ => GitHubError::Validation {
            detail: all
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        },
    }
}
