use std::time::Duration;

use anyhow::{bail, Result};
use pgrestore_models::RestoreRequest;
use pgrestore_workflow::instance::PostgresInstance;
use pgrestore_workflow::{RecoveryWaitPolicy, RestoreOptions};

use crate::cli::Args;

/// Everything needed for one restore run, checked up front
#[derive(Debug, Clone)]
pub struct Settings {
    pub request: RestoreRequest,
    pub options: RestoreOptions,
    pub instance: PostgresInstance,
}

impl Settings {
    pub fn from_args(args: Args) -> Result<Self> {
        for (flag, value) in [
            ("--namespace", &args.namespace),
            ("--cluster-name", &args.cluster_name),
            ("--backup-name", &args.backup_name),
            ("--pod-name", &args.pod_name),
        ] {
            if value.trim().is_empty() {
                bail!("{} must not be empty", flag);
            }
        }
        if !args.pgdata.is_absolute() {
            bail!("--pgdata must be an absolute path, got {}", args.pgdata.display());
        }
        if args.recovery_poll_interval == 0 {
            bail!("--recovery-poll-interval must be at least one second");
        }
        if args.recovery_max_attempts == Some(0) {
            bail!("--recovery-max-attempts must be at least one");
        }

        let mut wait_policy =
            RecoveryWaitPolicy::default().with_interval(Duration::from_secs(args.recovery_poll_interval));
        if let Some(max_attempts) = args.recovery_max_attempts {
            wait_policy = wait_policy.with_max_attempts(max_attempts);
        }

        let instance = PostgresInstance {
            pgdata: args.pgdata.clone(),
            pg_ctl: args.pg_ctl,
            port: args.port,
            socket_directory: args.socket_dir.clone(),
            start_timeout: Duration::from_secs(args.start_timeout),
        };

        let options = RestoreOptions {
            restore_tool: args.restore_tool,
            wal_restore_tool: args.wal_restore_tool,
            port: args.port,
            socket_directory: args.socket_dir,
            wait_policy,
        };

        let request = RestoreRequest {
            pgdata: args.pgdata,
            namespace: args.namespace,
            backup_name: args.backup_name,
            cluster_name: args.cluster_name,
            pod_name: args.pod_name,
            password_file: args.password_file,
            recovery_target: args.recovery_target,
            temporary: args.temporary,
        };

        Ok(Self {
            request,
            options,
            instance,
        })
    }
}
