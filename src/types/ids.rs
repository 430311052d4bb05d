//! Newtype wrappers for GitHub identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using a
//! milestone number where an issue number is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// An issue number within a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueNumber(pub u64);

impl fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for IssueNumber {
    fn from(n: u64) -> Self {
        IssueNumber(n)
    }
}

/// A milestone number within a repository.
///
/// GitHub addresses milestones by number, not by their global ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilestoneNumber(pub u64);

impl fmt::Display for MilestoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MilestoneNumber {
    fn from(n: u64) -> Self {
        MilestoneNumber(n)
    }
}

/// Error returned when a repository slug cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid repository '{input}': expected owner/repo")]
pub struct InvalidRepoId {
    pub input: String,
}

/// A repository identifier (owner/repo format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoId {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Parses `owner/repo`, also accepting `github.com` URLs and a trailing `.git`.
    pub fn parse(input: &str) -> Result<Self, InvalidRepoId> {
        let trimmed = input.trim();
        let slug = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("github.com/"))
            .unwrap_or(trimmed);
        let slug = slug.trim_end_matches('/');
        let slug = slug.strip_suffix(".git").unwrap_or(slug);

        match slug.split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(RepoId::new(owner, repo))
            }
            _ => Err(InvalidRepoId {
                input: input.to_string(),
            }),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
