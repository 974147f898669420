//! The restore workflow
//!
//! Runs every step needed to turn a backup into a new instance of the
//! cluster. Each step must succeed before the next one starts and the
//! first failure ends the run.

use std::path::PathBuf;

use pgrestore_models::RestoreRequest;

use crate::access_policy::write_restore_hba_conf;
use crate::backup::{load_backup, ClusterApi};
use crate::config_seeder::write_initial_postgresql_conf;
use crate::data_restore::{restore_data_dir, DEFAULT_RESTORE_TOOL};
use crate::error::{RestoreError, Result};
use crate::instance::{quote_literal, with_active_instance, InstanceControl, SuperUserSession, SUPERUSER};
use crate::names::SIGNAL_FILE_MAJOR_VERSION;
use crate::recovery_config::{write_restore_wal_config, RecoveryScheme, DEFAULT_WAL_RESTORE_TOOL};
use crate::version::detect_major_version;
use crate::wait_recovery::{wait_until_recovery_finishes, RecoveryWaitPolicy};

/// Settings of the restore run that do not come from the request
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Program restoring the base backup
    pub restore_tool: String,
    /// Program PostgreSQL calls to fetch WAL segments
    pub wal_restore_tool: String,
    /// Port written into the seeded configuration
    pub port: u16,
    /// Socket directory written into the seeded configuration
    pub socket_directory: PathBuf,
    pub wait_policy: RecoveryWaitPolicy,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            restore_tool: DEFAULT_RESTORE_TOOL.to_string(),
            wal_restore_tool: DEFAULT_WAL_RESTORE_TOOL.to_string(),
            port: 5432,
            socket_directory: PathBuf::from("/controller/run"),
            wait_policy: RecoveryWaitPolicy::default(),
        }
    }
}

/// What a restore run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutput {
    pub backup_id: String,
    pub major_version: u32,
    pub scheme: RecoveryScheme,
    /// False for temporary requests, which never start the instance
    pub finalized: bool,
}

/// Restores the data directory from the requested backup and, unless the
/// request is temporary, brings the instance out of recovery
pub async fn restore<A, I>(
    request: &RestoreRequest,
    api: &A,
    instance: &I,
    options: &RestoreOptions,
) -> Result<RestoreOutput>
where
    A: ClusterApi + ?Sized,
    I: InstanceControl + ?Sized,
{
    let (namespace, backup_name) = request.backup_key();
    tracing::info!(
        "Restoring cluster {} from backup {}/{} into {}",
        request.cluster_name,
        namespace,
        backup_name,
        request.pgdata.display()
    );

    // Step 1: Find the backup
    let backup = load_backup(api, namespace, backup_name).await?;

    // Step 2: Copy the base backup into the data directory
    restore_data_dir(&options.restore_tool, &backup, &request.pgdata).await?;

    // Step 3: Replace the restored configuration with the cluster's
    write_initial_postgresql_conf(
        api,
        &request.pgdata,
        &request.namespace,
        &request.cluster_name,
        options.port,
        &options.socket_directory,
    )
    .await?;

    // Step 4: Local access without password
    write_restore_hba_conf(&request.pgdata).await?;

    // Step 5: Recovery settings
    let scheme = write_restore_wal_config(
        &request.pgdata,
        &options.wal_restore_tool,
        &backup,
        &request.recovery_target,
    )
    .await?;

    let major_version = detect_major_version(&request.pgdata).await?;
    let mut output = RestoreOutput {
        backup_id: backup.backup_id,
        major_version,
        scheme,
        finalized: false,
    };

    if request.temporary {
        tracing::info!("Temporary restore, leaving the instance stopped");
        return Ok(output);
    }

    // Step 6: Replay WAL, set the password, prepare for replication
    configure_instance_after_restore(request, instance, &options.wait_policy).await?;
    output.finalized = true;

    tracing::info!("Restore of cluster {} complete", request.cluster_name);
    Ok(output)
}

/// Starts the instance, waits for it to leave recovery and sets the
/// superuser password from the request's password file
///
/// The instance is stopped again before this returns, whatever the outcome.
pub async fn configure_instance_after_restore<I>(
    request: &RestoreRequest,
    instance: &I,
    wait_policy: &RecoveryWaitPolicy,
) -> Result<()>
where
    I: InstanceControl + ?Sized,
{
    let password = tokio::fs::read_to_string(&request.password_file)
        .await
        .map_err(|source| RestoreError::PasswordFile {
            path: request.password_file.clone(),
            source,
        })?;

    let major_version = detect_major_version(&request.pgdata).await?;

    // Starting the instance begins the replay of the WAL archived after the
    // backup; once done the server switches to a new timeline
    with_active_instance(instance, || async move {
        let session = instance.superuser_session().await?;

        if let Err(err) = wait_until_recovery_finishes(&session, wait_policy).await {
            tracing::error!("While waiting for PostgreSQL to stop recovery mode: {}", err);
            return Err(err);
        }

        set_superuser_password(&session, &password).await
    })
    .await?;

    if major_version >= SIGNAL_FILE_MAJOR_VERSION {
        instance
            .write_promoted_configuration(&request.cluster_name, &request.pod_name)
            .await?;
    }

    Ok(())
}

async fn set_superuser_password<S>(session: &S, password: &str) -> Result<()>
where
    S: SuperUserSession + ?Sized,
{
    let statement = format!("ALTER USER {} PASSWORD {}", SUPERUSER, quote_literal(password));
    session.execute(&statement).await?;

    tracing::info!("Superuser password set");
    Ok(())
}
