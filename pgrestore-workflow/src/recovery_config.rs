//! Recovery configuration for the restored data directory
//!
//! PostgreSQL 12 moved recovery settings into the regular configuration
//! and replaced `recovery.conf` with a `recovery.signal` marker. The scheme
//! is picked once from the restored `PG_VERSION` and only that scheme's
//! files are written.

use std::path::Path;

use crate::backup::BackupDescriptor;
use crate::error::{RestoreError, Result};
use crate::fileutils::{append_to_file, write_file};
use crate::names::{AUTO_CONF, CUSTOM_CONF, RECOVERY_CONF, RECOVERY_SIGNAL, SIGNAL_FILE_MAJOR_VERSION};
use crate::version::detect_major_version;

/// Tool PostgreSQL calls to fetch a single WAL segment during replay
pub const DEFAULT_WAL_RESTORE_TOOL: &str = "barman-cloud-wal-restore";

/// Keeps the restored instance from archiving until it owns the archive
pub const ARCHIVE_COMMAND_DISABLED: &str = "archive_command = 'cd .'\n";

/// How recovery is requested for a given major version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryScheme {
    /// `recovery.conf` holds every recovery setting
    Legacy,
    /// Settings go in `custom.conf`, `recovery.signal` triggers recovery
    SignalBased,
}

impl RecoveryScheme {
    pub fn for_major_version(major: u32) -> Self {
        if major >= SIGNAL_FILE_MAJOR_VERSION {
            RecoveryScheme::SignalBased
        } else {
            RecoveryScheme::Legacy
        }
    }

    /// Writes this scheme's recovery files into `pgdata`
    pub async fn write(self, pgdata: &Path, settings: &str) -> Result<()> {
        match self {
            RecoveryScheme::SignalBased => write_signal_based(pgdata, settings).await,
            RecoveryScheme::Legacy => write_legacy(pgdata, settings).await,
        }
    }
}

async fn write_signal_based(pgdata: &Path, settings: &str) -> Result<()> {
    append_to_file(&pgdata.join(CUSTOM_CONF), settings)
        .await
        .map_err(|e| RestoreError::io("cannot write recovery config", e))?;

    write_file(&pgdata.join(AUTO_CONF), "")
        .await
        .map_err(|e| RestoreError::io("cannot erase auto config", e))?;

    write_file(&pgdata.join(RECOVERY_SIGNAL), "")
        .await
        .map_err(|e| RestoreError::io("cannot create recovery signal file", e))
}

async fn write_legacy(pgdata: &Path, settings: &str) -> Result<()> {
    write_file(&pgdata.join(RECOVERY_CONF), settings)
        .await
        .map_err(|e| RestoreError::io("cannot write recovery.conf", e))
}

/// Command line PostgreSQL runs for each WAL segment, `%f` and `%p` are
/// substituted by the server
pub fn wal_restore_command(tool: &str, backup: &BackupDescriptor) -> String {
    let mut cmd = vec![tool.to_string()];
    if let Some(encryption) = &backup.encryption {
        cmd.push("-e".to_string());
        cmd.push(encryption.clone());
    }
    if let Some(endpoint_url) = &backup.endpoint_url {
        cmd.push("--endpoint-url".to_string());
        cmd.push(endpoint_url.clone());
    }
    cmd.push(backup.destination_path.clone());
    cmd.push(backup.server_name.clone());
    cmd.push("%f".to_string());
    cmd.push("%p".to_string());
    cmd.join(" ")
}

/// Settings that replay the archived WAL and then promote
pub fn recovery_settings(tool: &str, backup: &BackupDescriptor, recovery_target: &str) -> String {
    let mut settings = format!(
        "# recovery from backup {} of server {}\n\
         recovery_target_action = promote\n\
         restore_command = '{}'\n",
        backup.backup_id,
        backup.server_name,
        wal_restore_command(tool, backup).replace('\'', "''"),
    );

    let recovery_target = recovery_target.trim();
    if !recovery_target.is_empty() {
        settings.push_str(recovery_target);
        settings.push('\n');
    }
    settings
}

/// Prepares `pgdata` so that the next start replays WAL from object storage
/// and then promotes
///
/// Archiving is always disabled. Any failed write aborts: a data directory
/// with partial recovery settings must not be started.
pub async fn write_restore_wal_config(
    pgdata: &Path,
    wal_restore_tool: &str,
    backup: &BackupDescriptor,
    recovery_target: &str,
) -> Result<RecoveryScheme> {
    let major = detect_major_version(pgdata).await?;
    let scheme = RecoveryScheme::for_major_version(major);
    let settings = recovery_settings(wal_restore_tool, backup, recovery_target);

    tracing::info!(
        major_version = major,
        scheme = ?scheme,
        configuration = %settings,
        "Generated recovery configuration"
    );

    append_to_file(&pgdata.join(CUSTOM_CONF), ARCHIVE_COMMAND_DISABLED)
        .await
        .map_err(|e| RestoreError::io("cannot write recovery config", e))?;

    scheme.write(pgdata, &settings).await?;
    Ok(scheme)
}
