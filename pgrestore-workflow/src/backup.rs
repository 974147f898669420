//! Backup metadata loading
//!
//! The Backup resource tells us where in object storage the base backup
//! lives. A missing or incomplete Backup is a configuration problem, so
//! nothing here retries.

use async_trait::async_trait;
use pgrestore_models::resources::BACKUP_PHASE_COMPLETED;
use pgrestore_models::{Backup, Cluster};

use crate::error::{RestoreError, Result};

/// Read-only access to the cluster resources the workflow needs
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetches a Backup, failing with [`RestoreError::BackupNotFound`] when absent
    async fn get_backup(&self, namespace: &str, name: &str) -> Result<Backup>;

    /// Fetches the Cluster the restored instance belongs to
    async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Cluster>;
}

/// What the restore tools need to know about a backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDescriptor {
    pub destination_path: String,
    pub server_name: String,
    pub backup_id: String,
    pub endpoint_url: Option<String>,
    pub encryption: Option<String>,
}

impl BackupDescriptor {
    /// Extracts the descriptor from a Backup's status
    pub fn from_backup(backup: &Backup) -> Result<Self> {
        let namespace = backup.metadata.namespace.clone().unwrap_or_default();
        let name = backup.metadata.name.clone().unwrap_or_default();
        let invalid = |reason: &str| RestoreError::InvalidBackup {
            namespace: namespace.clone(),
            name: name.clone(),
            reason: reason.to_string(),
        };

        let status = backup.status.as_ref().ok_or_else(|| invalid("status is missing"))?;

        if status.destination_path.is_empty() {
            return Err(invalid("destinationPath is empty"));
        }
        if status.server_name.is_empty() {
            return Err(invalid("serverName is empty"));
        }
        if status.backup_id.is_empty() {
            return Err(invalid("backupId is empty"));
        }

        match status.phase.as_deref() {
            Some(BACKUP_PHASE_COMPLETED) => {}
            phase => tracing::warn!(
                backup = %name,
                phase = ?phase,
                "Restoring from a backup that is not marked as completed"
            ),
        }

        Ok(Self {
            destination_path: status.destination_path.clone(),
            server_name: status.server_name.clone(),
            backup_id: status.backup_id.clone(),
            endpoint_url: non_empty(&status.endpoint_url),
            encryption: non_empty(&status.encryption),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Loads the Backup named by (namespace, name) and turns it into a descriptor
pub async fn load_backup<A: ClusterApi + ?Sized>(
    api: &A,
    namespace: &str,
    name: &str,
) -> Result<BackupDescriptor> {
    tracing::info!("Loading backup {}/{}", namespace, name);
    let backup = api.get_backup(namespace, name).await?;
    BackupDescriptor::from_backup(&backup)
}
