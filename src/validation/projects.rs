//! Project board check.

use serde_json::json;

use super::{RepositoryValidator, ValidationResult};
use crate::github::{GitHubError, GitHubTransport};
use crate::types::RepoId;

impl<T: GitHubTransport> RepositoryValidator<'_, T> {
    /// Checks that a Projects board titled `title` (case-insensitive) is
    /// linked to `repo`.
    pub async fn validate_project(&self, repo: &RepoId, title: &str) -> ValidationResult {
        let projects = match self.client.list_repository_projects(repo).await {
            Ok(projects) => projects,
            Err(err) => {
                let hint = match err {
                    GitHubError::Permission { .. } | GitHubError::Authentication => {
                        "Verify the token has the read:project scope."
                    }
                    GitHubError::NotFound { .. } => {
                        "Check the owner and repository name."
                    }
                    _ => "Retry later.",
                };
                return ValidationResult::invalid(
                    format!(
                        "Could not look up project boards of {}: {}. {}",
                        repo, err, hint
                    ),
                    json!({
                        "errorType": err.kind().as_str(),
                        "repository": repo.to_string(),
                        "project": title,
                    }),
                );
            }
        };

        let wanted = title.trim().to_lowercase();
        match projects
            .iter()
            .find(|p| p.title.trim().to_lowercase() == wanted)
        {
            Some(project) => ValidationResult::valid(json!({
                "repository": repo.to_string(),
                "project": project,
            })),
            None => {
                let available: Vec<&str> = projects.iter().map(|p| p.title.as_str()).collect();
                let listing = if available.is_empty() {
                    String::from("no boards are linked")
                } else {
                    format!("available boards: {}", available.join(", "))
                };
                ValidationResult::invalid(
                    format!(
                        "Project board '{}' is not linked to {} ({}). \
                         Create the board or link it to the repository.",
                        title, repo, listing
                    ),
                    json!({
                        "errorType": "project_not_found",
                        "repository": repo.to_string(),
                        "project": title,
                        "available": available,
                    }),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::GitHubClient;
    use crate::test_utils::{ScriptedResponse, ScriptedTransport};
    use http::Method;

    fn boards() -> ScriptedResponse {
        ScriptedResponse::json(json!({
            "data": {"repository": {"projectsV2": {"nodes": [
                {"number": 1, "title": "Roadmap", "url": "https://github.com/orgs/octo/projects/1"},
                {"number": 2, "title": "Sprint Board", "url": "https://github.com/orgs/octo/projects/2"}
            ]}}}
        }))
    }

    async fn validate(response: ScriptedResponse, title: &str) -> ValidationResult {
        let client =
            GitHubClient::new(ScriptedTransport::new().on(Method::POST, "/graphql", [response]));
        RepositoryValidator::new(&client)
            .validate_project(&RepoId::new("octo", "widgets"), title)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn matches_title_case_insensitively() {
        let result = validate(boards(), "sprint board").await;
        assert!(result.is_valid);
        assert_eq!(result.details.unwrap()["project"]["number"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_board_lists_available() {
        let result = validate(boards(), "Backlog").await;
        assert_eq!(result.error_type(), Some("project_not_found"));
        assert_eq!(
            result.details.as_ref().unwrap()["available"],
            json!(["Roadmap", "Sprint Board"])
        );
        assert!(result.error.unwrap().contains("Roadmap, Sprint Board"));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_scope_is_permission() {
        let result = validate(
            ScriptedResponse::json(json!({
                "data": null,
                "errors": [{"type": "INSUFFICIENT_SCOPES", "message": "missing read:project"}]
            })),
            "Roadmap",
        )
        .await;
        assert_eq!(result.error_type(), Some("permission"));
        assert!(result.error.unwrap().contains("read:project"));
    }
}
