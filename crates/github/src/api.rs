//! Response shapes for the REST endpoints the monitor reads.
//!
//! Only the fields the monitor uses are declared. Anything optional upstream is optional
//! here, so a sparse payload still maps cleanly.

use pipeline_monitor_core::models::{Conclusion, PrSummary, RunSummary};
use serde::Deserialize;

/// `GET /repos/{owner}/{repo}/actions/runs`
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunsPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl WorkflowRun {
    pub fn workflow_name(&self) -> &str { self.name.as_deref().unwrap_or("[unnamed]") }

    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            self.id,
            self.status.clone(),
            self.conclusion.as_deref().and_then(|c| c.parse::<Conclusion>().ok()),
            self.created_at.clone(),
            self.updated_at.clone(),
        )
    }
}

/// One entry of `GET /repos/{owner}/{repo}/pulls`
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

impl PullRequest {
    pub fn author(&self) -> Option<&str> { self.user.as_ref().map(|u| u.login.as_str()) }
}

impl From<PullRequest> for PrSummary {
    fn from(pr: PullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            created_at: pr.created_at,
            updated_at: pr.updated_at,
            state: pr.state.unwrap_or_default(),
            url: pr.html_url.unwrap_or_default(),
            mergeable: pr.mergeable,
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
        }
    }
}

/// Keep pull requests opened by `bot`, in the order the provider returned them.
pub fn filter_dependency_prs(
    pulls: impl IntoIterator<Item = PullRequest>,
    bot: &str,
) -> Vec<PrSummary> {
    pulls.into_iter().filter(|pr| pr.author() == Some(bot)).map(PrSummary::from).collect()
}
