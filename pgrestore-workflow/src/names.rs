//! Names of the files the workflow reads and writes inside a data directory

/// Main PostgreSQL configuration file
pub const POSTGRESQL_CONF: &str = "postgresql.conf";

/// Operator-managed settings, included from `postgresql.conf`
pub const CUSTOM_CONF: &str = "custom.conf";

/// File rewritten by `ALTER SYSTEM`
pub const AUTO_CONF: &str = "postgresql.auto.conf";

/// Zero-byte marker that puts PostgreSQL 12+ into targeted recovery
pub const RECOVERY_SIGNAL: &str = "recovery.signal";

/// Recovery settings file used before PostgreSQL 12
pub const RECOVERY_CONF: &str = "recovery.conf";

/// Host-based authentication rules
pub const HBA_CONF: &str = "pg_hba.conf";

/// User name maps referenced by `map=` in the HBA rules
pub const IDENT_CONF: &str = "pg_ident.conf";

/// Major version marker written by initdb
pub const PG_VERSION: &str = "PG_VERSION";

/// First major version configuring recovery through GUCs and a signal file
pub const SIGNAL_FILE_MAJOR_VERSION: u32 = 12;
