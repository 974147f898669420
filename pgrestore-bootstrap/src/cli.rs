use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// pgrestore - bring a PostgreSQL instance back from an object-storage backup
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Data directory to restore into (must not hold data yet)
    #[arg(long, env = "PGDATA")]
    pub pgdata: PathBuf,

    /// Namespace of the cluster and the backup
    #[arg(long, env = "NAMESPACE")]
    pub namespace: String,

    /// Cluster the restored instance joins
    #[arg(long, env = "CLUSTER_NAME")]
    pub cluster_name: String,

    /// Backup resource to restore
    #[arg(long, env = "BACKUP_NAME")]
    pub backup_name: String,

    /// Pod hosting this instance
    #[arg(long, env = "POD_NAME")]
    pub pod_name: String,

    /// File holding the superuser password
    #[arg(long = "pw-file", env = "PW_FILE")]
    pub password_file: PathBuf,

    /// Recovery target directive, e.g. "recovery_target_time = '2024-01-01 00:00:00+00'"
    #[arg(long, env = "RECOVERY_TARGET", default_value = "")]
    pub recovery_target: String,

    /// Only generate the configuration, never start the instance
    #[arg(long)]
    pub temporary: bool,

    /// pg_ctl binary
    #[arg(long, env = "PG_CTL", default_value = "pg_ctl")]
    pub pg_ctl: String,

    /// Directory holding the server's unix socket
    #[arg(long, env = "SOCKET_DIR", default_value = "/controller/run")]
    pub socket_dir: PathBuf,

    /// Port the server listens on
    #[arg(long, default_value = "5432")]
    pub port: u16,

    /// Seconds pg_ctl waits for the server to accept connections
    #[arg(long, default_value = "86400")]
    pub start_timeout: u64,

    /// Base backup restore tool
    #[arg(long, default_value = "barman-cloud-restore")]
    pub restore_tool: String,

    /// WAL restore tool written into restore_command
    #[arg(long, default_value = "barman-cloud-wal-restore")]
    pub wal_restore_tool: String,

    /// Seconds between two checks of the recovery status
    #[arg(long, default_value = "5")]
    pub recovery_poll_interval: u64,

    /// Give up waiting for recovery after this many checks (default: never)
    #[arg(long)]
    pub recovery_max_attempts: Option<u32>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
