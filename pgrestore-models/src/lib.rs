//! Shared types for the pgrestore workspace
//!
//! Kubernetes resources read by the restore bootstrapper and the request
//! value describing one restore run.

pub mod request;
pub mod resources;

pub use request::RestoreRequest;
pub use resources::{
    Backup, BackupSpec, BackupStatus, Cluster, ClusterReference, ClusterSpec,
    PostgresConfiguration,
};
