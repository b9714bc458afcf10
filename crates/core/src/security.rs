use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::models::{SecurityStatus, SecuritySummary};

#[derive(Debug, Deserialize)]
struct SecurityReport {
    timestamp: Option<String>,
    #[serde(default)]
    summary: ReportSummary,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReportSummary {
    total_vulnerabilities: u64,
    status: SecurityStatus,
}

fn is_report_name(name: &str) -> bool {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^security-report-.*\.json$").unwrap()).is_match(name)
}

/// Find the report in `dir` with the latest modification time.
/// Returns `None` if the directory does not exist or holds no reports.
pub async fn latest_report(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
        }
    };
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    while let Some(entry) =
        entries.next_entry().await.with_context(|| format!("Failed to read {}", dir.display()))?
    {
        if !entry.file_name().to_str().is_some_and(is_report_name) {
            continue;
        }
        let path = entry.path();
        // Follows symlinks. A report removed mid-scan is skipped, not fatal
        let modified = match tokio::fs::metadata(&path).await {
            Ok(metadata) if !metadata.is_file() => continue,
            Ok(metadata) => metadata.modified(),
            Err(e) => Err(e),
        };
        let modified = match modified {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!("Skipping security report {}: {}", path.display(), e);
                continue;
            }
        };
        if latest.as_ref().is_none_or(|(time, _)| modified > *time) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}

async fn read_report(path: &Path) -> Result<SecurityReport> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve the current security status from the newest report in `dir`.
///
/// Never fails: a missing directory or report is `NO_SCAN`, anything unreadable is `UNKNOWN`.
pub async fn load_security_summary(dir: &Path) -> SecuritySummary {
    let path = match latest_report(dir).await {
        Ok(Some(path)) => path,
        Ok(None) => return SecuritySummary::no_scan(),
        Err(e) => {
            tracing::warn!("Error scanning security reports: {:?}", e);
            return SecuritySummary::default();
        }
    };
    match read_report(&path).await {
        Ok(report) => SecuritySummary {
            last_scan_timestamp: report.timestamp,
            total_vulnerabilities: report.summary.total_vulnerabilities,
            status: report.summary.status,
            report_path: Some(path),
        },
        Err(e) => {
            tracing::warn!("Error loading security report: {:?}", e);
            SecuritySummary { report_path: Some(path), ..Default::default() }
        }
    }
}
