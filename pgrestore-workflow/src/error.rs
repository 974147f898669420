//! Error type shared by every restore step

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("cannot read superuser password file {path}: {source}")]
    PasswordFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("backup {namespace}/{name} is not usable: {reason}")]
    InvalidBackup {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("backup {namespace}/{name} not found")]
    BackupNotFound { namespace: String, name: String },

    #[error("kubernetes API error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("cannot detect major version in {path}: {reason}")]
    MajorVersion { path: PathBuf, reason: String },

    #[error("cannot run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("restore tool exited with {status}: {stderr}")]
    RestoreFailed {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },

    #[error("pg_ctl {action} exited with {status}: {stderr}")]
    InstanceControl {
        action: &'static str,
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot render {template}: {source}")]
    Template {
        template: &'static str,
        #[source]
        source: tera::Error,
    },

    #[error("cannot connect to the instance: {0}")]
    Connection(#[source] tokio_postgres::Error),

    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("instance in recovery")]
    InstanceInRecovery,

    #[error("gave up after {attempts} attempts: {last}")]
    RetryBudgetExhausted {
        attempts: u32,
        last: Box<RestoreError>,
    },
}

impl RestoreError {
    /// Wraps an I/O failure with a description of what was being done
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        RestoreError::Io {
            context: context.into(),
            source,
        }
    }

    /// Only an instance still replaying WAL is worth waiting for
    pub fn is_transient(&self) -> bool {
        matches!(self, RestoreError::InstanceInRecovery)
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_recovery_is_transient() {
        assert!(RestoreError::InstanceInRecovery.is_transient());
        assert!(!RestoreError::Configuration("x".into()).is_transient());
        assert!(!RestoreError::io(
            "cannot write recovery config",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        )
        .is_transient());
    }

    #[test]
    fn test_io_error_message_keeps_context() {
        let err = RestoreError::io(
            "cannot erase auto config",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "cannot erase auto config: denied");
    }
}
