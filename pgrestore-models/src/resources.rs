//! Custom resources describing clusters and their backups

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Phase reported by a backup that finished uploading
pub const BACKUP_PHASE_COMPLETED: &str = "completed";

/// Spec for a Backup resource
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "pgrestore.io",
    version = "v1",
    kind = "Backup",
    namespaced,
    status = "BackupStatus",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.cluster.name"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    /// Cluster this backup was taken from
    pub cluster: ClusterReference,
}

/// Reference to a Cluster in the same namespace
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub struct ClusterReference {
    pub name: String,
}

/// Where the backup landed in object storage
///
/// Filled in by the backup process once the base backup has been uploaded.
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    /// Object storage prefix, e.g. `s3://bucket/path`
    #[serde(default)]
    pub destination_path: String,

    /// Server name the base backup and WAL archive are stored under
    #[serde(default)]
    pub server_name: String,

    /// Identifier of the base backup inside the server's catalog
    #[serde(default, rename = "backupId")]
    pub backup_id: String,

    /// Endpoint override for S3-compatible stores
    #[serde(default, rename = "endpointURL")]
    pub endpoint_url: String,

    /// Server-side encryption mode the backup was written with
    #[serde(default)]
    pub encryption: String,

    #[serde(default)]
    pub phase: Option<String>,
}

/// Spec for a Cluster resource
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "pgrestore.io",
    version = "v1",
    kind = "Cluster",
    namespaced,
    printcolumn = r#"{"name":"Instances","type":"integer","jsonPath":".spec.instances"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Number of instances in the cluster
    #[serde(default = "default_instances")]
    pub instances: u32,

    /// PostgreSQL configuration overrides
    #[serde(default)]
    pub postgresql: PostgresConfiguration,
}

fn default_instances() -> u32 {
    1
}

/// User-supplied PostgreSQL settings
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema, PartialEq, Eq)]
pub struct PostgresConfiguration {
    /// GUC overrides, rendered into the custom configuration file
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_manifest_parses_status() {
        let manifest = r#"
apiVersion: pgrestore.io/v1
kind: Backup
metadata:
  name: nightly
  namespace: db
spec:
  cluster:
    name: orders
status:
  destinationPath: s3://bucket/path
  serverName: orders
  backupId: 20240101T000000
  endpointURL: https://minio.local:9000
  encryption: AES256
  phase: completed
"#;
        let backup: Backup = serde_yaml::from_str(manifest).unwrap();
        assert_eq!(backup.spec.cluster.name, "orders");

        let status = backup.status.unwrap();
        assert_eq!(status.destination_path, "s3://bucket/path");
        assert_eq!(status.backup_id, "20240101T000000");
        assert_eq!(status.endpoint_url, "https://minio.local:9000");
        assert_eq!(status.encryption, "AES256");
        assert_eq!(status.phase.as_deref(), Some(BACKUP_PHASE_COMPLETED));
    }

    #[test]
    fn test_backup_status_fields_default_to_empty() {
        let status: BackupStatus = serde_json::from_str(r#"{"destinationPath":"s3://b"}"#).unwrap();
        assert_eq!(status.destination_path, "s3://b");
        assert!(status.endpoint_url.is_empty());
        assert!(status.encryption.is_empty());
        assert!(status.phase.is_none());
    }

    #[test]
    fn test_cluster_manifest_defaults() {
        let manifest = r#"
apiVersion: pgrestore.io/v1
kind: Cluster
metadata:
  name: orders
  namespace: db
spec:
  postgresql:
    parameters:
      shared_buffers: 256MB
      work_mem: 8MB
"#;
        let cluster: Cluster = serde_yaml::from_str(manifest).unwrap();
        assert_eq!(cluster.spec.instances, 1);
        assert_eq!(
            cluster.spec.postgresql.parameters.get("shared_buffers").map(String::as_str),
            Some("256MB")
        );
        assert_eq!(cluster.spec.postgresql.parameters.len(), 2);
    }
}
