//! Physical restore of the data directory through the external restore tool

use std::path::Path;

use tokio::process::Command;

use crate::backup::BackupDescriptor;
use crate::error::{RestoreError, Result};

/// Tool copying a base backup out of object storage
pub const DEFAULT_RESTORE_TOOL: &str = "barman-cloud-restore";

/// Arguments for the restore tool, in the order it expects them:
/// `[--endpoint-url URL] [-e ENCRYPTION] DESTINATION SERVER BACKUP_ID PGDATA`
pub fn restore_arguments(backup: &BackupDescriptor, pgdata: &Path) -> Vec<String> {
    let mut options = Vec::new();
    if let Some(endpoint_url) = &backup.endpoint_url {
        options.push("--endpoint-url".to_string());
        options.push(endpoint_url.clone());
    }
    if let Some(encryption) = &backup.encryption {
        options.push("-e".to_string());
        options.push(encryption.clone());
    }
    options.push(backup.destination_path.clone());
    options.push(backup.server_name.clone());
    options.push(backup.backup_id.clone());
    options.push(pgdata.display().to_string());
    options
}

/// Runs `tool` to populate `pgdata` from the backup
///
/// The caller guarantees `pgdata` holds no data yet. Both output streams are
/// collected and, on failure, returned in the error.
pub async fn restore_data_dir(tool: &str, backup: &BackupDescriptor, pgdata: &Path) -> Result<()> {
    let options = restore_arguments(backup, pgdata);
    tracing::info!(options = ?options, "Starting {}", tool);

    let output = Command::new(tool)
        .args(&options)
        .output()
        .await
        .map_err(|source| RestoreError::Spawn {
            program: tool.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        tracing::error!(
            status = %output.status,
            stdout = %stdout,
            stderr = %stderr,
            "Can't restore backup"
        );
        return Err(RestoreError::RestoreFailed {
            status: output.status,
            stdout,
            stderr,
        });
    }

    tracing::info!("Restore completed");
    tracing::debug!(output = %stdout, "Restore tool output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn descriptor() -> BackupDescriptor {
        BackupDescriptor {
            destination_path: "s3://bucket/path".into(),
            server_name: "srv1".into(),
            backup_id: "B20240101".into(),
            endpoint_url: None,
            encryption: None,
        }
    }

    #[test]
    fn test_arguments_without_optional_flags() {
        let args = restore_arguments(&descriptor(), &PathBuf::from("/var/lib/pgdata"));

        assert_eq!(args, vec!["s3://bucket/path", "srv1", "B20240101", "/var/lib/pgdata"]);
        assert!(!args.iter().any(|a| a == "--endpoint-url" || a == "-e"));
    }

    #[test]
    fn test_arguments_with_endpoint_and_encryption() {
        let backup = BackupDescriptor {
            endpoint_url: Some("https://minio:9000".into()),
            encryption: Some("AES256".into()),
            ..descriptor()
        };

        let args = restore_arguments(&backup, &PathBuf::from("/var/lib/pgdata"));
        assert_eq!(
            args,
            vec![
                "--endpoint-url",
                "https://minio:9000",
                "-e",
                "AES256",
                "s3://bucket/path",
                "srv1",
                "B20240101",
                "/var/lib/pgdata",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_tool_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = restore_data_dir("/nonexistent/restore-tool", &descriptor(), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, RestoreError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_keeps_captured_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("restore-tool");
        std::fs::write(
            &tool,
            "#!/bin/sh\necho \"fetching $3\"\necho 'backup not found in catalog' >&2\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = restore_data_dir(tool.to_str().unwrap(), &descriptor(), &dir.path().join("pgdata"))
            .await
            .unwrap_err();

        match err {
            RestoreError::RestoreFailed { status, stdout, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stdout, "fetching B20240101\n");
                assert_eq!(stderr, "backup not found in catalog\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success() {
        let dir = tempfile::tempdir().unwrap();
        restore_data_dir("true", &descriptor(), dir.path()).await.unwrap();
    }
}
