//! Major version detection from an existing data directory

use std::path::Path;

use crate::error::{RestoreError, Result};
use crate::names::PG_VERSION;

/// Reads the major version PostgreSQL recorded in `PG_VERSION`
pub async fn detect_major_version(pgdata: &Path) -> Result<u32> {
    let path = pgdata.join(PG_VERSION);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| RestoreError::MajorVersion {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    parse_major_version(&content).ok_or_else(|| RestoreError::MajorVersion {
        path,
        reason: format!("unexpected content {:?}", content.trim()),
    })
}

/// `"14"` is 14, `"9.6"` is 9
pub fn parse_major_version(content: &str) -> Option<u32> {
    content.trim().split('.').next()?.parse().ok()
}
