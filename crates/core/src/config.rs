use std::{
    fs::File,
    io::BufReader,
    net::{IpAddr, Ipv4Addr},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEPENDENCY_BOT_LOGIN: &str = "dependabot[bot]";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub github: GitHubConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self { Self { host: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 8080 } }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    /// Repository in `owner/name` form.
    pub repository: Option<String>,
    pub api_url: String,
    /// Author login used to pick out dependency update pull requests.
    pub dependency_bot: String,
    pub run_limit: u8,
    pub pull_limit: u8,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            repository: None,
            api_url: DEFAULT_API_URL.to_string(),
            dependency_bot: DEPENDENCY_BOT_LOGIN.to_string(),
            run_limit: 10,
            pull_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub repo_path: PathBuf,
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self { Self { repo_path: PathBuf::from("."), interval_secs: 30 } }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration { Duration::from_secs(self.interval_secs) }

    /// Output directory for the snapshot and the dashboard page.
    pub fn reports_dir(&self) -> PathBuf { self.repo_path.join("docs").join("pipeline-reports") }

    pub fn snapshot_path(&self) -> PathBuf { self.reports_dir().join("current-status.json") }

    pub fn dashboard_path(&self) -> PathBuf { self.reports_dir().join("dashboard.html") }

    pub fn security_reports_dir(&self) -> PathBuf {
        self.repo_path.join("docs").join("security-reports").join("combined")
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = BufReader::new(
            File::open(path)
                .with_context(|| format!("Failed to open config file {}", path.display()))?,
        );
        serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `GITHUB_TOKEN`, `GITHUB_REPOSITORY` and `GITHUB_API_URL` from the environment.
    pub fn apply_env(&mut self) { self.apply_env_with(|key| std::env::var(key).ok()) }

    pub fn apply_env_with(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = var("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(repository) = var("GITHUB_REPOSITORY") {
            self.github.repository = Some(repository);
        }
        if let Some(api_url) = var("GITHUB_API_URL") {
            self.github.api_url = api_url;
        }
    }
}
