use std::path::Path;

use anyhow::{Context, Result};

use crate::models::StatusDocument;

/// Overwrite the snapshot at `path` with the pretty-printed document.
pub async fn write_snapshot(path: &Path, document: &StatusDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(document).context("Failed to serialize status")?;
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
