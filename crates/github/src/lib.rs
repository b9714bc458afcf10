pub mod api;
pub mod remote;

use anyhow::{Context, Result, anyhow};
use http::StatusCode;
use octocrab::{GitHubError, Octocrab};
use pipeline_monitor_core::{
    config::GitHubConfig,
    models::{PrSummary, Workflows},
    stats::group_runs,
};

use crate::{
    api::{PullRequest, WorkflowRunsPage, filter_dependency_prs},
    remote::RepoId,
};

#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
    pub repo: RepoId,
    run_limit: u8,
    pull_limit: u8,
    dependency_bot: String,
}

#[derive(serde::Serialize)]
struct ListParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a str>,
    per_page: u8,
}

impl GitHub {
    pub fn new(config: &GitHubConfig, repo: RepoId) -> Result<Self> {
        let token = config.token.clone().context("GitHub token not configured")?;
        let client = Octocrab::builder()
            .personal_token(token)
            .base_uri(config.api_url.as_str())
            .with_context(|| format!("Invalid GitHub API URL {}", config.api_url))?
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self {
            client,
            repo,
            run_limit: config.run_limit,
            pull_limit: config.pull_limit,
            dependency_bot: config.dependency_bot.clone(),
        })
    }

    /// Fetch the most recent workflow runs, newest first.
    pub async fn workflow_runs(&self) -> Result<WorkflowRunsPage> {
        let route = format!("/repos/{}/{}/actions/runs", self.repo.owner, self.repo.name);
        let mut page: WorkflowRunsPage = self
            .client
            .get(&route, Some(&ListParams { state: None, per_page: self.run_limit }))
            .await
            .map_err(|e| not_found(e, &self.repo))
            .with_context(|| format!("Failed to fetch workflow runs for {}", self.repo))?;
        page.workflow_runs.truncate(self.run_limit as usize);
        Ok(page)
    }

    /// Fetch recent runs and group them into per-workflow summaries.
    pub async fn fetch_workflows(&self) -> Result<Workflows> {
        let page = self.workflow_runs().await?;
        tracing::debug!(
            "Fetched {} of {} workflow runs for {}",
            page.workflow_runs.len(),
            page.total_count,
            self.repo
        );
        Ok(group_runs(
            page.workflow_runs.iter().map(|run| (run.workflow_name().to_string(), run.summary())),
        ))
    }

    pub async fn open_pull_requests(&self) -> Result<Vec<PullRequest>> {
        let route = format!("/repos/{}/{}/pulls", self.repo.owner, self.repo.name);
        self.client
            .get(&route, Some(&ListParams { state: Some("open"), per_page: self.pull_limit }))
            .await
            .map_err(|e| not_found(e, &self.repo))
            .with_context(|| format!("Failed to fetch pull requests for {}", self.repo))
    }

    /// Open pull requests authored by the dependency update bot.
    pub async fn fetch_dependency_prs(&self) -> Result<Vec<PrSummary>> {
        let pulls = self.open_pull_requests().await?;
        let total = pulls.len();
        let prs = filter_dependency_prs(pulls, &self.dependency_bot);
        tracing::debug!(
            "{} of {} open pull requests are from {}",
            prs.len(),
            total,
            self.dependency_bot
        );
        Ok(prs)
    }
}

fn not_found(e: octocrab::Error, repo: &RepoId) -> anyhow::Error {
    match e {
        octocrab::Error::GitHub { source, .. }
            if matches!(*source, GitHubError { status_code: StatusCode::NOT_FOUND, .. }) =>
        {
            anyhow!("Repository {} not found or token lacks access", repo)
        }
        e => e.into(),
    }
}
