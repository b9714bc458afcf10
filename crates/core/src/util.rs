use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

/// Whole seconds between two RFC 3339 timestamps.
/// Missing, malformed or reversed timestamps yield 0.
pub fn duration_seconds(start: Option<&str>, end: Option<&str>) -> u64 {
    let (Some(start), Some(end)) = (start.and_then(parse_timestamp), end.and_then(parse_timestamp))
    else {
        return 0;
    };
    u64::try_from((end - start).whole_seconds()).unwrap_or(0)
}

/// Validate that `path` points at a git working tree and return its canonical form.
pub fn check_repository(path: &Path) -> Result<PathBuf> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Repository path {} does not exist", path.display()))?;
    if !path.is_dir() {
        bail!("Repository path {} is not a directory", path.display());
    }
    // `.git` is a file for worktrees and submodules
    if !path.join(".git").exists() {
        bail!("{} is not a git repository", path.display());
    }
    Ok(path)
}
