//! The request describing one restore run

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything the restore workflow needs to know about the instance it
/// is bringing up
///
/// Built once by the caller and only read afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Data directory the backup is restored into
    pub pgdata: PathBuf,
    /// Kubernetes namespace of the cluster and backup
    pub namespace: String,
    /// Name of the Backup resource to restore
    pub backup_name: String,
    /// Cluster the restored instance will join
    pub cluster_name: String,
    /// Pod hosting this instance
    pub pod_name: String,
    /// File holding the superuser password
    pub password_file: PathBuf,
    /// Extra recovery target directive, empty to replay all available WAL
    #[serde(default)]
    pub recovery_target: String,
    /// Only derive configuration, never start the instance
    #[serde(default)]
    pub temporary: bool,
}

impl RestoreRequest {
    /// (namespace, name) of the Backup resource
    pub fn backup_key(&self) -> (&str, &str) {
        (&self.namespace, &self.backup_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "pgdata": "/var/lib/postgresql/data/pgdata",
            "namespace": "db",
            "backup_name": "nightly",
            "cluster_name": "orders",
            "pod_name": "orders-1",
            "password_file": "/etc/superuser-secret/password"
        }"#;

        let request: RestoreRequest = serde_json::from_str(json).unwrap();
        assert!(request.recovery_target.is_empty());
        assert!(!request.temporary);
        assert_eq!(request.backup_key(), ("db", "nightly"));
    }
}
