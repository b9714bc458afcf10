use std::{collections::BTreeSet, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};
use time::OffsetDateTime;

use crate::util::duration_seconds;

/// Aggregated pipeline status pushed to viewers and written to the snapshot file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusDocument {
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_update: Option<OffsetDateTime>,
    pub workflows: Workflows,
    pub open_dependency_prs: Vec<PrSummary>,
    pub security_status: SecuritySummary,
    pub metrics: PipelineMetrics,
}

/// Workflow summaries keyed by workflow name, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflows(Vec<(String, WorkflowSummary)>);

impl Workflows {
    pub fn get(&self, name: &str) -> Option<&WorkflowSummary> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, w)| w)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut WorkflowSummary> {
        self.0.iter_mut().find(|(n, _)| n == name).map(|(_, w)| w)
    }

    pub fn insert(&mut self, name: String, summary: WorkflowSummary) {
        match self.get_mut(&name) {
            Some(existing) => *existing = summary,
            None => self.0.push((name, summary)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkflowSummary)> {
        self.0.iter().map(|(n, w)| (n.as_str(), w))
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// All runs across every workflow, in group order.
    pub fn runs(&self) -> impl Iterator<Item = &RunSummary> {
        self.0.iter().flat_map(|(_, w)| w.recent_runs.iter())
    }
}

impl Serialize for Workflows {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.collect_map(self.0.iter().map(|(n, w)| (n, w)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSummary {
    pub latest_run: RunSummary,
    pub recent_runs: Vec<RunSummary>,
    pub success_rate: f64,
    pub avg_duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub id: u64,
    pub status: Option<String>,
    pub conclusion: Option<Conclusion>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub duration_seconds: u64,
}

impl RunSummary {
    /// Builds a run summary, deriving the duration from its timestamps.
    /// Runs that have not completed report a duration of 0.
    pub fn new(
        id: u64,
        status: Option<String>,
        conclusion: Option<Conclusion>,
        created_at: Option<String>,
        updated_at: Option<String>,
    ) -> Self {
        let duration_seconds = if status.as_deref().is_none_or(|s| s == "completed") {
            duration_seconds(created_at.as_deref(), updated_at.as_deref())
        } else {
            0
        };
        Self { id, status, conclusion, created_at, updated_at, duration_seconds }
    }

    pub fn is_success(&self) -> bool { self.conclusion == Some(Conclusion::Success) }

    pub fn is_failure(&self) -> bool {
        matches!(self.conclusion, Some(Conclusion::Failure | Conclusion::Cancelled))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    #[serde(other)]
    Other,
}

impl FromStr for Conclusion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "cancelled" => Self::Cancelled,
            _ => Self::Other,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrSummary {
    pub number: u64,
    pub title: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub state: String,
    pub url: String,
    /// `None` while the provider is still computing mergeability.
    pub mergeable: Option<bool>,
    pub labels: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecuritySummary {
    pub last_scan_timestamp: Option<String>,
    pub total_vulnerabilities: u64,
    pub status: SecurityStatus,
    pub report_path: Option<PathBuf>,
}

impl Default for SecuritySummary {
    fn default() -> Self {
        Self {
            last_scan_timestamp: None,
            total_vulnerabilities: 0,
            status: SecurityStatus::Unknown,
            report_path: None,
        }
    }
}

impl SecuritySummary {
    pub fn no_scan() -> Self { Self { status: SecurityStatus::NoScan, ..Default::default() } }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityStatus {
    Clean,
    VulnerabilitiesFound,
    NoScan,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineMetrics {
    pub total_runs: usize,
    pub success_rate_percent: f64,
    pub avg_duration_seconds: f64,
    pub last_success_timestamp: Option<String>,
    pub last_failure_timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(id: u64, status: &str, conclusion: Option<Conclusion>) -> RunSummary {
        RunSummary::new(
            id,
            Some(status.to_string()),
            conclusion,
            Some("2024-03-01T10:00:00Z".to_string()),
            Some("2024-03-01T10:02:30Z".to_string()),
        )
    }

    #[test]
    fn test_run_duration() {
        assert_eq!(run(1, "completed", Some(Conclusion::Success)).duration_seconds, 150);
        assert_eq!(run(2, "in_progress", None).duration_seconds, 0);
        let broken = RunSummary::new(3, Some("completed".into()), None, None, Some("nope".into()));
        assert_eq!(broken.duration_seconds, 0);
    }

    #[test]
    fn test_conclusion_parse() {
        assert_eq!("success".parse::<Conclusion>(), Ok(Conclusion::Success));
        assert_eq!("cancelled".parse::<Conclusion>(), Ok(Conclusion::Cancelled));
        assert_eq!("timed_out".parse::<Conclusion>(), Ok(Conclusion::Other));
        assert_eq!(serde_json::from_str::<Conclusion>("\"skipped\"").unwrap(), Conclusion::Other);
    }

    #[test]
    fn test_security_status_serde() {
        assert_eq!(
            serde_json::to_value(SecurityStatus::VulnerabilitiesFound).unwrap(),
            json!("VULNERABILITIES_FOUND")
        );
        assert_eq!(
            serde_json::from_value::<SecurityStatus>(json!("SOMETHING_ELSE")).unwrap(),
            SecurityStatus::Unknown
        );
    }

    #[test]
    fn test_workflows_serialize_in_insertion_order() {
        let mut workflows = Workflows::default();
        for name in ["zeta", "alpha", "mid"] {
            let latest = run(1, "completed", Some(Conclusion::Success));
            workflows.insert(name.to_string(), WorkflowSummary {
                latest_run: latest.clone(),
                recent_runs: vec![latest],
                success_rate: 100.0,
                avg_duration_seconds: 150.0,
            });
        }
        let text = serde_json::to_string(&workflows).unwrap();
        let zeta = text.find("\"zeta\"").unwrap();
        let alpha = text.find("\"alpha\"").unwrap();
        let mid = text.find("\"mid\"").unwrap();
        assert!(zeta < alpha && alpha < mid);
        assert_eq!(workflows.runs().count(), 3);
    }

    #[test]
    fn test_document_shape() {
        let doc = StatusDocument::default();
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["last_update"], json!(null));
        assert_eq!(value["workflows"], json!({}));
        assert_eq!(value["open_dependency_prs"], json!([]));
        assert_eq!(value["security_status"]["status"], json!("UNKNOWN"));
        assert_eq!(value["metrics"]["total_runs"], json!(0));
    }
}
