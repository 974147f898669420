//! pgrestore workflow - bringing a PostgreSQL instance back from an
//! object-storage backup
//!
//! The steps run in order by [`restore::restore`]:
//!
//! 1. load the Backup resource ([`backup`])
//! 2. restore the base backup into the data directory ([`data_restore`])
//! 3. replace the restored configuration with the cluster's ([`config_seeder`])
//! 4. allow passwordless local access ([`access_policy`])
//! 5. write the recovery settings for the installed major version ([`recovery_config`])
//! 6. start the instance, wait for WAL replay ([`wait_recovery`]) and set
//!    the superuser password
//!
//! # Usage
//!
//! ```rust,no_run
//! use pgrestore_workflow::instance::PostgresInstance;
//! use pgrestore_workflow::k8s_client::KubeClusterApi;
//! use pgrestore_workflow::restore::{restore, RestoreOptions};
//! use pgrestore_models::RestoreRequest;
//!
//! # async fn example(request: RestoreRequest, instance: PostgresInstance) -> pgrestore_workflow::Result<()> {
//! let api = KubeClusterApi::try_default().await?;
//! let output = restore(&request, &api, &instance, &RestoreOptions::default()).await?;
//! println!("restored backup {}", output.backup_id);
//! # Ok(())
//! # }
//! ```

pub mod access_policy;
pub mod backup;
pub mod config_seeder;
pub mod data_restore;
pub mod error;
pub mod fileutils;
pub mod instance;
pub mod k8s_client;
pub mod names;
pub mod recovery_config;
pub mod restore;
pub mod version;
pub mod wait_recovery;

pub use backup::{BackupDescriptor, ClusterApi};
pub use error::{RestoreError, Result};
pub use instance::{InstanceControl, SuperUserSession};
pub use recovery_config::RecoveryScheme;
pub use restore::{restore, RestoreOptions, RestoreOutput};
pub use wait_recovery::RecoveryWaitPolicy;
