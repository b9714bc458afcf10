use std::{path::PathBuf, sync::Arc, time::Duration};

use pipeline_monitor_core::{
    config::Config, models::StatusDocument, security::load_security_summary,
    snapshot::write_snapshot, stats::rollup_metrics,
};
use pipeline_monitor_github::GitHub;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

use crate::hub::Hub;

/// Owns the status document and refreshes it on a fixed interval.
pub struct Poller {
    github: Option<GitHub>,
    hub: Arc<Hub>,
    document: StatusDocument,
    interval: Duration,
    security_dir: PathBuf,
    snapshot_path: PathBuf,
}

impl Poller {
    pub fn new(config: &Config, github: Option<GitHub>, hub: Arc<Hub>) -> Self {
        Self {
            github,
            document: StatusDocument::clone(&hub.current()),
            hub,
            interval: config.monitor.interval(),
            security_dir: config.monitor.security_reports_dir(),
            snapshot_path: config.monitor.snapshot_path(),
        }
    }

    #[cfg(test)]
    pub fn document(&self) -> &StatusDocument { &self.document }

    /// Poll until `shutdown` is cancelled. A cycle in progress is allowed to finish.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!("Polling pipeline status every {}s", self.interval.as_secs());
        loop {
            self.refresh().await;
            self.publish().await;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        tracing::info!("Poller stopped");
    }

    /// Refresh every source. A failing source keeps its previous value.
    pub async fn refresh(&mut self) {
        tracing::info!("Checking pipeline status...");
        if let Some(github) = &self.github {
            match github.fetch_workflows().await {
                Ok(workflows) => self.document.workflows = workflows,
                Err(e) => tracing::error!("Error updating workflow status: {:?}", e),
            }
            match github.fetch_dependency_prs().await {
                Ok(prs) => self.document.open_dependency_prs = prs,
                Err(e) => tracing::error!("Error updating dependency PRs: {:?}", e),
            }
        } else {
            tracing::warn!("GitHub token or repository not configured");
        }
        self.document.security_status = load_security_summary(&self.security_dir).await;
        self.document.metrics = rollup_metrics(&self.document.workflows);
        self.document.last_update = Some(OffsetDateTime::now_utc());
    }

    /// Push the document to viewers and overwrite the snapshot file.
    pub async fn publish(&self) {
        let delivered = self.hub.publish(self.document.clone()).await;
        tracing::debug!("Status update sent to {} viewers", delivered);
        if let Err(e) = write_snapshot(&self.snapshot_path, &self.document).await {
            tracing::error!("Error saving status: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use httpmock::prelude::*;
    use pipeline_monitor_core::models::SecurityStatus;
    use pipeline_monitor_github::remote::RepoId;
    use serde_json::{Value, json};

    use super::*;

    fn temp_repo(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("pipeline-monitor-poller-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join(".git")).unwrap();
        dir
    }

    fn config(repo: &Path, api_url: String) -> Config {
        let mut config = Config::default();
        config.monitor.repo_path = repo.to_path_buf();
        config.github.token = Some("token".to_string());
        config.github.api_url = api_url;
        config
    }

    fn run(id: u64, name: &str, conclusion: &str) -> Value {
        json!({
            "id": id, "name": name, "status": "completed", "conclusion": conclusion,
            "created_at": "2024-04-01T10:00:00Z", "updated_at": "2024-04-01T10:01:00Z",
        })
    }

    #[tokio::test]
    async fn test_cycle_end_to_end() {
        let repo = temp_repo("e2e");
        let server = MockServer::start_async().await;
        let runs = [
            ("CI", "success"),
            ("CI", "success"),
            ("Nightly", "failure"),
            ("CI", "success"),
            ("Nightly", "success"),
            ("CI", "cancelled"),
            ("Nightly", "success"),
            ("CI", "success"),
            ("Nightly", "failure"),
            ("CI", "success"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (name, conclusion))| run(100 - i as u64, name, conclusion))
        .collect::<Vec<_>>();
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/widgets/actions/runs");
                then.status(200).json_body(json!({ "total_count": 10, "workflow_runs": runs }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/widgets/pulls");
                then.status(200).json_body(json!([
                    {"number": 5, "title": "Bump serde", "state": "open",
                     "user": {"login": "dependabot[bot]"}, "labels": []}
                ]));
            })
            .await;

        let config = config(&repo, server.base_url());
        let github = GitHub::new(&config.github, RepoId::new("octo", "widgets")).unwrap();
        let hub = Arc::new(Hub::new(StatusDocument::default()));
        let (_, mut viewer) = hub.register().await;
        viewer.recv().await.unwrap();

        let mut poller = Poller::new(&config, Some(github), hub.clone());
        poller.refresh().await;
        poller.publish().await;

        let document = poller.document();
        assert_eq!(document.metrics.total_runs, 10);
        assert_eq!(document.metrics.success_rate_percent, 70.0);
        let ci_rate = document.workflows.get("CI").unwrap().success_rate;
        assert!((ci_rate - 500.0 / 6.0).abs() < 1e-9, "{ci_rate}");
        assert_eq!(document.workflows.get("Nightly").unwrap().success_rate, 50.0);
        assert_eq!(document.open_dependency_prs.len(), 1);
        assert_eq!(document.security_status.status, SecurityStatus::NoScan);
        assert!(document.last_update.is_some());

        let update: Value =
            serde_json::from_str(viewer.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(update["type"], "status_update");
        assert_eq!(update["data"]["metrics"]["total_runs"], 10);

        let snapshot: Value =
            serde_json::from_slice(&std::fs::read(config.monitor.snapshot_path()).unwrap())
                .unwrap();
        assert_eq!(snapshot, update["data"]);

        std::fs::remove_dir_all(&repo).unwrap();
    }

    #[tokio::test]
    async fn test_failed_source_keeps_previous_value() {
        let repo = temp_repo("failure");
        let server = MockServer::start_async().await;
        let mut runs_ok = server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/widgets/actions/runs");
                then.status(200)
                    .json_body(json!({ "total_count": 1, "workflow_runs": [run(1, "CI", "success")] }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/widgets/pulls");
                then.status(200).body("this is not json");
            })
            .await;

        let config = config(&repo, server.base_url());
        let github = GitHub::new(&config.github, RepoId::new("octo", "widgets")).unwrap();
        let hub = Arc::new(Hub::new(StatusDocument::default()));
        let mut poller = Poller::new(&config, Some(github), hub);

        poller.refresh().await;
        assert_eq!(poller.document().metrics.total_runs, 1);
        assert!(poller.document().open_dependency_prs.is_empty());

        runs_ok.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/widgets/actions/runs");
                then.status(502);
            })
            .await;
        poller.refresh().await;
        assert_eq!(poller.document().workflows.len(), 1);
        assert_eq!(poller.document().metrics.total_runs, 1);

        std::fs::remove_dir_all(&repo).unwrap();
    }

    #[tokio::test]
    async fn test_without_github() {
        let repo = temp_repo("offline");
        let config = config(&repo, "http://127.0.0.1:9".to_string());
        let hub = Arc::new(Hub::new(StatusDocument::default()));
        let mut poller = Poller::new(&config, None, hub.clone());
        poller.refresh().await;
        poller.publish().await;
        assert!(poller.document().workflows.is_empty());
        assert_eq!(hub.current().security_status.status, SecurityStatus::NoScan);
        assert!(config.monitor.snapshot_path().exists());
        std::fs::remove_dir_all(&repo).unwrap();
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let repo = temp_repo("shutdown");
        let mut config = config(&repo, "http://127.0.0.1:9".to_string());
        config.monitor.interval_secs = 3600;
        let hub = Arc::new(Hub::new(StatusDocument::default()));
        let poller = Poller::new(&config, None, hub.clone());
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(poller.run(shutdown.clone()));
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
        std::fs::remove_dir_all(&repo).unwrap();
    }
}
