//! Core domain types for the GitHub client.
//!
//! Identifiers are newtypes; resource models are the subsets of GitHub's
//! payloads that the workflows actually read.

pub mod ids;
pub mod models;

// Re-export commonly used types at the module level
pub use ids::{InvalidRepoId, IssueNumber, MilestoneNumber, RepoId};
pub use models::{
    AuthenticatedUser, CollaboratorPermission, Issue, IssueState, Label, Milestone,
    MilestoneState, PermissionCapabilities, PermissionLevel, Project, Repository,
};
