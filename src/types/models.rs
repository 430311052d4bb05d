//! GitHub resource models.
//!
//! These are the subsets of GitHub's REST payloads that the validation and
//! issue workflows read. Unknown fields are ignored on deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{IssueNumber, MilestoneNumber};

/// The user the configured token authenticates as (`GET /user`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub login: String,
    pub id: u64,
}

/// Repository metadata (`GET /repos/{owner}/{repo}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub private: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// A collaborator's permission level on a repository.
///
/// GitHub reports the coarse `permission` (`admin`, `write`, `read`, `none`)
/// and the finer `role_name`, which also distinguishes `maintain` and `triage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Admin,
    Maintain,
    Write,
    Triage,
    Read,
    None,
}

impl PermissionLevel {
    /// Parses a GitHub permission or role name. Custom role names return `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(PermissionLevel::Admin),
            "maintain" => Some(PermissionLevel::Maintain),
            "write" | "push" => Some(PermissionLevel::Write),
            "triage" => Some(PermissionLevel::Triage),
            "read" | "pull" => Some(PermissionLevel::Read),
            "none" => Some(PermissionLevel::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Admin => "admin",
            PermissionLevel::Maintain => "maintain",
            PermissionLevel::Write => "write",
            PermissionLevel::Triage => "triage",
            PermissionLevel::Read => "read",
            PermissionLevel::None => "none",
        }
    }

    /// Derives what a caller at this level is allowed to do.
    pub fn capabilities(&self) -> PermissionCapabilities {
        use PermissionLevel::*;

        let writes = matches!(self, Admin | Write | Maintain);
        PermissionCapabilities {
            can_create_issues: writes,
            can_create_labels: writes,
            can_push: writes,
            can_modify_projects: matches!(self, Admin | Maintain),
            can_admin: matches!(self, Admin),
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability booleans derived from a [`PermissionLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCapabilities {
    pub can_create_issues: bool,
    pub can_create_labels: bool,
    pub can_modify_projects: bool,
    pub can_push: bool,
    pub can_admin: bool,
}

impl PermissionCapabilities {
    /// Returns the human-readable names of the capabilities the agent needs
    /// but does not have. Empty when the level is sufficient.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.can_create_issues {
            missing.push("create issues");
        }
        if !self.can_create_labels {
            missing.push("create labels");
        }
        if !self.can_modify_projects {
            missing.push("modify projects");
        }
        missing
    }

    pub fn is_sufficient(&self) -> bool {
        self.can_create_issues && self.can_create_labels && self.can_modify_projects
    }
}

/// Response of `GET /repos/{owner}/{repo}/collaborators/{username}/permission`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollaboratorPermission {
    pub permission: String,
    #[serde(default)]
    pub role_name: Option<String>,
}

impl CollaboratorPermission {
    /// The effective level: `role_name` when it is a built-in role, else `permission`.
    pub fn level(&self) -> Option<PermissionLevel> {
        self.role_name
            .as_deref()
            .and_then(PermissionLevel::parse)
            .or_else(|| PermissionLevel::parse(&self.permission))
    }
}

/// Milestone open/closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneState {
    Open,
    Closed,
}

/// A repository milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub number: MilestoneNumber,
    pub title: String,
    pub state: MilestoneState,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_on: Option<DateTime<Utc>>,
}

/// A repository label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Issue open/closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
}

/// A repository issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: IssueNumber,
    pub title: String,
    pub state: IssueState,
    pub html_url: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Pull requests also come through the issues endpoint; present only for them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// A Projects (v2) board linked to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}
