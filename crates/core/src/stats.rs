//! Derived figures for workflow groups and the pipeline as a whole.
//!
//! Everything here is recomputed from the runs currently held; nothing is
//! accumulated across poll cycles.

use crate::models::{PipelineMetrics, RunSummary, WorkflowSummary, Workflows};

/// Percentage of runs that concluded successfully. An empty list yields 0.
pub fn success_rate<'a>(runs: impl IntoIterator<Item = &'a RunSummary>) -> f64 {
    let (mut total, mut successful) = (0usize, 0usize);
    for run in runs {
        total += 1;
        if run.is_success() {
            successful += 1;
        }
    }
    if total == 0 { 0.0 } else { successful as f64 / total as f64 * 100.0 }
}

/// Mean duration of runs with a non-zero duration. Returns 0 when there are none.
pub fn average_duration<'a>(runs: impl IntoIterator<Item = &'a RunSummary>) -> f64 {
    let (mut count, mut sum) = (0u64, 0u64);
    for run in runs.into_iter().filter(|r| r.duration_seconds > 0) {
        count += 1;
        sum += run.duration_seconds;
    }
    if count == 0 { 0.0 } else { sum as f64 / count as f64 }
}

/// Group runs (newest first, as received) by workflow name.
pub fn group_runs(runs: impl IntoIterator<Item = (String, RunSummary)>) -> Workflows {
    let mut groups: Vec<(String, Vec<RunSummary>)> = Vec::new();
    for (name, run) in runs {
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, runs)) => runs.push(run),
            None => groups.push((name, vec![run])),
        }
    }
    let mut workflows = Workflows::default();
    for (name, recent_runs) in groups {
        let Some(latest_run) = recent_runs.first().cloned() else {
            continue;
        };
        workflows.insert(name, WorkflowSummary {
            latest_run,
            success_rate: success_rate(&recent_runs),
            avg_duration_seconds: average_duration(&recent_runs),
            recent_runs,
        });
    }
    workflows
}

/// Roll every workflow's runs up into pipeline-wide metrics.
///
/// The last success and last failure timestamps are the `updated_at` of the first
/// matching run in group order. They are not necessarily the most recent by time.
pub fn rollup_metrics(workflows: &Workflows) -> PipelineMetrics {
    let mut metrics = PipelineMetrics {
        total_runs: workflows.runs().count(),
        success_rate_percent: success_rate(workflows.runs()),
        avg_duration_seconds: average_duration(workflows.runs()),
        ..Default::default()
    };
    for run in workflows.runs() {
        if run.is_success() {
            if metrics.last_success_timestamp.is_none() {
                metrics.last_success_timestamp = run.updated_at.clone();
            }
        } else if run.is_failure() && metrics.last_failure_timestamp.is_none() {
            metrics.last_failure_timestamp = run.updated_at.clone();
        }
    }
    metrics
}
