use httpmock::prelude::*;
use pipeline_monitor_core::{config::GitHubConfig, stats::rollup_metrics};
use pipeline_monitor_github::{GitHub, remote::RepoId};
use serde_json::{Value, json};

fn client(server: &MockServer) -> GitHub {
    let config = GitHubConfig {
        token: Some("test-token".to_string()),
        api_url: server.base_url(),
        ..Default::default()
    };
    GitHub::new(&config, RepoId::new("octo", "widgets")).unwrap()
}

fn run(id: u64, name: &str, conclusion: &str, minutes: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "status": "completed",
        "conclusion": conclusion,
        "created_at": "2024-04-01T10:00:00Z",
        "updated_at": format!("2024-04-01T10:{minutes:02}:00Z"),
    })
}

/// Ten runs across two workflows: 7 success, 2 failure, 1 cancelled.
fn canned_runs() -> Value {
    json!({
        "total_count": 240,
        "workflow_runs": [
            run(110, "CI", "success", 4),
            run(109, "Release", "failure", 9),
            run(108, "CI", "success", 6),
            run(107, "Release", "success", 12),
            run(106, "CI", "failure", 2),
            run(105, "Release", "cancelled", 1),
            run(104, "CI", "success", 5),
            run(103, "Release", "success", 10),
            run(102, "CI", "success", 3),
            run(101, "Release", "success", 8),
        ]
    })
}

#[tokio::test]
async fn test_fetch_workflows() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/octo/widgets/actions/runs")
                .query_param("per_page", "10")
                .header_exists("authorization");
            then.status(200).header("content-type", "application/json").json_body(canned_runs());
        })
        .await;

    let workflows = client(&server).fetch_workflows().await.unwrap();
    mock.assert_async().await;

    assert_eq!(workflows.iter().map(|(name, _)| name).collect::<Vec<_>>(), ["CI", "Release"]);
    let ci = workflows.get("CI").unwrap();
    assert_eq!(ci.recent_runs.len(), 5);
    assert_eq!(ci.latest_run.id, 110);
    assert_eq!(ci.success_rate, 80.0);
    assert_eq!(ci.avg_duration_seconds, 240.0);
    let release = workflows.get("Release").unwrap();
    assert_eq!(release.recent_runs.len(), 5);
    assert_eq!(release.latest_run.id, 109);
    assert_eq!(release.success_rate, 60.0);

    let metrics = rollup_metrics(&workflows);
    assert_eq!(metrics.total_runs, 10);
    assert_eq!(metrics.success_rate_percent, 70.0);
    // first match in group order: CI's runs come first
    assert_eq!(metrics.last_success_timestamp.as_deref(), Some("2024-04-01T10:04:00Z"));
    assert_eq!(metrics.last_failure_timestamp.as_deref(), Some("2024-04-01T10:02:00Z"));
}

#[tokio::test]
async fn test_fetch_workflows_truncates_to_limit() {
    let server = MockServer::start_async().await;
    let runs = (0..15).map(|i| run(200 - i, "CI", "success", 1)).collect::<Vec<_>>();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/widgets/actions/runs");
            then.status(200).json_body(json!({ "total_count": 15, "workflow_runs": runs }));
        })
        .await;

    let workflows = client(&server).fetch_workflows().await.unwrap();
    assert_eq!(workflows.get("CI").unwrap().recent_runs.len(), 10);
}

#[tokio::test]
async fn test_fetch_workflows_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/widgets/actions/runs");
            then.status(500).json_body(json!({ "message": "Server Error" }));
        })
        .await;

    let err = client(&server).fetch_workflows().await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to fetch workflow runs for octo/widgets"));
}

#[tokio::test]
async fn test_fetch_workflows_not_found() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/octo/widgets/actions/runs");
            then.status(404).json_body(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest",
            }));
        })
        .await;

    let err = client(&server).fetch_workflows().await.unwrap_err();
    assert!(format!("{err:#}").contains("Repository octo/widgets not found"));
}

#[tokio::test]
async fn test_fetch_dependency_prs() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/octo/widgets/pulls")
                .query_param("state", "open")
                .query_param("per_page", "50");
            then.status(200).json_body(json!([
                {"number": 12, "title": "Bump axum from 0.7 to 0.8", "state": "open",
                 "html_url": "https://github.com/octo/widgets/pull/12",
                 "created_at": "2024-04-02T00:00:00Z", "updated_at": "2024-04-03T00:00:00Z",
                 "user": {"login": "dependabot[bot]"}, "labels": [{"name": "dependencies"}]},
                {"number": 11, "title": "Add feature", "state": "open",
                 "user": {"login": "octocat"}, "labels": []},
                {"number": 10, "title": "Bump tokio", "state": "open",
                 "user": {"login": "dependabot[bot]"}, "mergeable": false, "labels": []}
            ]));
        })
        .await;

    let prs = client(&server).fetch_dependency_prs().await.unwrap();
    mock.assert_async().await;

    assert_eq!(prs.iter().map(|pr| pr.number).collect::<Vec<_>>(), [12, 10]);
    assert_eq!(prs[0].title, "Bump axum from 0.7 to 0.8");
    assert_eq!(prs[0].created_at.as_deref(), Some("2024-04-02T00:00:00Z"));
    assert_eq!(prs[0].mergeable, None);
    assert_eq!(prs[1].mergeable, Some(false));
}

#[test]
fn test_new_requires_token() {
    let config = GitHubConfig::default();
    assert!(GitHub::new(&config, RepoId::new("octo", "widgets")).is_err());
}
