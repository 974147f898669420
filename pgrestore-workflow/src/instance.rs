//! Lifecycle of the PostgreSQL instance living in the restored data directory

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_postgres::NoTls;

use crate::config_seeder::write_promoted_auto_conf;
use crate::error::{RestoreError, Result};

/// Role the workflow connects as, and whose password it sets
pub const SUPERUSER: &str = "postgres";

/// Database the superuser session connects to
const SUPERUSER_DATABASE: &str = "postgres";

/// Connection to the running instance with superuser rights
#[async_trait]
pub trait SuperUserSession: Send + Sync {
    /// Whether the server is still replaying WAL
    async fn is_in_recovery(&self) -> Result<bool>;

    /// Runs a single statement with no parameters and no result rows
    async fn execute(&self, statement: &str) -> Result<()>;
}

/// Starting and stopping the instance
#[async_trait]
pub trait InstanceControl: Send + Sync {
    type Session: SuperUserSession;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Opens a session on the running instance
    async fn superuser_session(&self) -> Result<Self::Session>;

    /// Records the cluster and pod identity in the instance's automatic
    /// configuration once it has been promoted
    async fn write_promoted_configuration(&self, cluster_name: &str, pod_name: &str) -> Result<()>;
}

/// Runs `body` while the instance is up
///
/// The instance is stopped on every path once it has started. If both the
/// body and the stop fail, the body's error wins and the stop failure is
/// only logged.
pub async fn with_active_instance<I, F, Fut, T>(instance: &I, body: F) -> Result<T>
where
    I: InstanceControl + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    instance.start().await?;

    let result = body().await;
    let stopped = instance.stop().await;

    match (result, stopped) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(stop_err)) => Err(stop_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(stop_err)) => {
            tracing::warn!("Cannot stop the instance after a failure: {}", stop_err);
            Err(err)
        }
    }
}

/// Quotes `literal` as a SQL string constant
///
/// Single quotes are doubled. A value holding backslashes is written as an
/// escape string so the backslashes survive whatever
/// `standard_conforming_strings` is set to.
pub fn quote_literal(literal: &str) -> String {
    let literal = literal.replace('\'', "''");
    if literal.contains('\\') {
        format!(" E'{}'", literal.replace('\\', "\\\\"))
    } else {
        format!("'{}'", literal)
    }
}

/// An instance managed through `pg_ctl`
#[derive(Debug, Clone)]
pub struct PostgresInstance {
    pub pgdata: PathBuf,
    pub pg_ctl: String,
    pub port: u16,
    pub socket_directory: PathBuf,
    pub start_timeout: Duration,
}

impl PostgresInstance {
    fn start_arguments(&self) -> Vec<String> {
        vec![
            "start".to_string(),
            "-w".to_string(),
            "-t".to_string(),
            self.start_timeout.as_secs().to_string(),
            "-D".to_string(),
            self.pgdata.display().to_string(),
            "-o".to_string(),
            format!(
                "-c port={} -c unix_socket_directories={}",
                self.port,
                self.socket_directory.display()
            ),
        ]
    }

    fn stop_arguments(&self) -> Vec<String> {
        vec![
            "stop".to_string(),
            "-w".to_string(),
            "-m".to_string(),
            "fast".to_string(),
            "-D".to_string(),
            self.pgdata.display().to_string(),
        ]
    }

    fn spawn_error(&self, source: std::io::Error) -> RestoreError {
        RestoreError::Spawn {
            program: self.pg_ctl.clone(),
            source,
        }
    }
}

#[async_trait]
impl InstanceControl for PostgresInstance {
    type Session = PostgresSession;

    async fn start(&self) -> Result<()> {
        let options = self.start_arguments();
        tracing::info!(options = ?options, "Starting PostgreSQL");

        // The postmaster inherits our output, so it cannot be captured here
        let status = Command::new(&self.pg_ctl)
            .args(&options)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !status.success() {
            return Err(RestoreError::InstanceControl {
                action: "start",
                status,
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        tracing::info!("PostgreSQL started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let options = self.stop_arguments();
        tracing::info!(options = ?options, "Stopping PostgreSQL");

        let output = Command::new(&self.pg_ctl)
            .args(&options)
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(RestoreError::InstanceControl {
                action: "stop",
                status: output.status,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        tracing::info!("PostgreSQL stopped");
        Ok(())
    }

    async fn superuser_session(&self) -> Result<PostgresSession> {
        let mut config = tokio_postgres::Config::new();
        config
            .host_path(&self.socket_directory)
            .port(self.port)
            .user(SUPERUSER)
            .dbname(SUPERUSER_DATABASE)
            .application_name("pgrestore");

        let (client, connection) = config.connect(NoTls).await.map_err(RestoreError::Connection)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(PostgresSession { client })
    }

    async fn write_promoted_configuration(&self, cluster_name: &str, pod_name: &str) -> Result<()> {
        write_promoted_auto_conf(&self.pgdata, cluster_name, pod_name).await
    }
}

/// Superuser session over the local socket
pub struct PostgresSession {
    client: tokio_postgres::Client,
}

#[async_trait]
impl SuperUserSession for PostgresSession {
    async fn is_in_recovery(&self) -> Result<bool> {
        let context = "error while reading results of pg_is_in_recovery";
        let row = self
            .client
            .query_one("SELECT pg_is_in_recovery()", &[])
            .await
            .map_err(|source| RestoreError::Query {
                context: context.to_string(),
                source,
            })?;

        row.try_get(0).map_err(|source| RestoreError::Query {
            context: context.to_string(),
            source,
        })
    }

    async fn execute(&self, statement: &str) -> Result<()> {
        self.client
            .batch_execute(statement)
            .await
            .map_err(|source| RestoreError::Query {
                context: "cannot execute statement".to_string(),
                source,
            })
    }
}
