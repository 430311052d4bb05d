use std::process::ExitCode;

use anyhow::Context;
use tpm_github::config::ClientConfig;
use tpm_github::github::GitHubClient;
use tpm_github::types::RepoId;
use tpm_github::validation::{RepositoryValidator, SetupOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Repository to validate when no argument is given.
const REPO_VAR: &str = "GITHUB_REPOSITORY";

/// Optional project board title to check.
const PROJECT_VAR: &str = "GITHUB_PROJECT";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tpm_github=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let slug = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => std::env::var(REPO_VAR).with_context(|| {
            format!("usage: tpm-github-preflight <owner/repo> (or set {})", REPO_VAR)
        })?,
    };
    let repo = RepoId::parse(&slug)?;

    let config = ClientConfig::from_env().context("failed to load GitHub configuration")?;
    let client = GitHubClient::from_config(&config).context("failed to build GitHub client")?;

    let options = SetupOptions {
        project: std::env::var(PROJECT_VAR).ok().filter(|p| !p.trim().is_empty()),
        milestones: None,
    };

    tracing::info!(repo = %repo, api_url = %config.api_url, "Validating GitHub setup");
    let report = RepositoryValidator::new(&client)
        .validate_github_setup(&repo, &options)
        .await;

    for line in &report.summary {
        eprintln!("{}", line);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(window) = client.rate_limit() {
        tracing::debug!(
            remaining = window.remaining,
            limit = window.limit,
            reset = %window.reset_time,
            "Rate limit after validation"
        );
    }

    Ok(if report.is_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
