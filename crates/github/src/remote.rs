use std::{fmt, path::Path, str::FromStr, sync::OnceLock};

use anyhow::{Result, anyhow};
use regex::Regex;

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into() }
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self::new(*owner, *name)),
            _ => Err(anyhow!("Expected repository in owner/name form, got '{s}'")),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Extract the owner and repository from a GitHub remote URL (https or ssh).
pub fn extract_github_url(url: &str) -> Option<(&str, &str)> {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    let caps = REGEX
        .get_or_init(|| {
            Regex::new(
                r"^(?:https?://(?:[^@/]+@)?|ssh://git@|git@)github\.com[/:](?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?(?:/|$)",
            )
            .unwrap()
        })
        .captures(url.trim())?;
    let owner = caps.name("owner").map(|m| m.as_str()).unwrap_or_default();
    let repo = caps.name("repo").map(|m| m.as_str()).unwrap_or_default();
    Some((owner, repo))
}

/// The `url` of `[remote "origin"]` in a git config file.
pub fn origin_url(git_config: &str) -> Option<&str> {
    let mut in_origin = false;
    for line in git_config.lines().map(str::trim) {
        if line.starts_with('[') {
            in_origin = line == r#"[remote "origin"]"#;
        } else if in_origin
            && let Some((key, value)) = line.split_once('=')
            && key.trim() == "url"
        {
            return Some(value.trim());
        }
    }
    None
}

/// Determine which repository to poll: the configured `owner/name` if it parses,
/// otherwise the GitHub `origin` remote of the local checkout.
pub async fn resolve_repository(configured: Option<&str>, repo_path: &Path) -> Option<RepoId> {
    if let Some(configured) = configured {
        match configured.parse::<RepoId>() {
            Ok(repo) => return Some(repo),
            Err(e) => tracing::warn!("Ignoring GITHUB_REPOSITORY: {e}"),
        }
    }
    let config = tokio::fs::read_to_string(repo_path.join(".git").join("config")).await.ok()?;
    let url = origin_url(&config)?;
    match extract_github_url(url) {
        Some((owner, name)) => {
            let repo = RepoId::new(owner, name);
            tracing::info!("Using repository {} from origin remote", repo);
            Some(repo)
        }
        None => {
            tracing::debug!("Origin remote {} is not a GitHub repository", url);
            None
        }
    }
}
