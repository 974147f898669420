//! Base configuration for a restored data directory
//!
//! The restored directory carries the configuration of the cluster the
//! backup was taken from. The files describing the current cluster are
//! computed in memory from its identity and parameter overrides and then
//! written over the restored ones.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tera::{Context as TeraContext, Tera};

use crate::backup::ClusterApi;
use crate::error::{RestoreError, Result};
use crate::fileutils::{append_to_file, write_file};
use crate::names::{AUTO_CONF, CUSTOM_CONF, POSTGRESQL_CONF};
use crate::version::detect_major_version;

/// Appended once the seeded files are in place: certificates for the
/// restored instance are provisioned later
pub const SSL_DISABLED: &str = "ssl = 'off'\n";

/// Parameters owned by the operator, never taken from user overrides
const FIXED_PARAMETERS: &[&str] = &[
    "listen_addresses",
    "port",
    "unix_socket_directories",
    "cluster_name",
    "hot_standby",
    "wal_level",
    "max_wal_senders",
    "max_replication_slots",
    "archive_mode",
    "archive_command",
    "wal_keep_size",
    "wal_keep_segments",
    "logging_collector",
    "log_destination",
    "ssl",
];

/// Identity of the instance the configuration is generated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterIdentity {
    pub namespace: String,
    pub cluster_name: String,
    pub major_version: u32,
    pub port: u16,
    pub socket_directory: PathBuf,
}

#[derive(Debug, Serialize)]
struct Parameter {
    name: String,
    value: String,
}

/// The three configuration files of a freshly bootstrapped instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredConfiguration {
    pub postgresql_conf: String,
    pub custom_conf: String,
    pub auto_conf: String,
}

impl DesiredConfiguration {
    /// Renders the configuration for `identity` with the user's `overrides`
    pub fn compute(identity: &ClusterIdentity, overrides: &BTreeMap<String, String>) -> Result<Self> {
        let tera = templates()?;

        let mut context = TeraContext::new();
        context.insert("namespace", &identity.namespace);
        context.insert("cluster_name", &identity.cluster_name);
        context.insert("major_version", &identity.major_version);
        context.insert("custom_conf", CUSTOM_CONF);
        context.insert("parameters", &parameters(identity, overrides));
        context.insert("primary_conninfo", "");

        Ok(Self {
            postgresql_conf: render(&tera, POSTGRESQL_CONF, &context)?,
            custom_conf: render(&tera, CUSTOM_CONF, &context)?,
            auto_conf: render(&tera, AUTO_CONF, &context)?,
        })
    }

    /// Writes the files over whatever `pgdata` currently holds, then turns SSL off
    pub async fn apply(&self, pgdata: &Path) -> Result<()> {
        for (name, content) in [
            (POSTGRESQL_CONF, &self.postgresql_conf),
            (CUSTOM_CONF, &self.custom_conf),
            (AUTO_CONF, &self.auto_conf),
        ] {
            write_file(&pgdata.join(name), content)
                .await
                .map_err(|e| RestoreError::io(format!("while creating {}", name), e))?;
        }

        append_to_file(&pgdata.join(CUSTOM_CONF), SSL_DISABLED)
            .await
            .map_err(|e| RestoreError::io("cannot disable ssl", e))
    }
}

fn parameters(identity: &ClusterIdentity, overrides: &BTreeMap<String, String>) -> Vec<Parameter> {
    let (wal_keep_name, wal_keep_value) = if identity.major_version >= 13 {
        ("wal_keep_size", "512MB")
    } else {
        ("wal_keep_segments", "32")
    };

    let fixed = [
        ("listen_addresses", "*".to_string()),
        ("port", identity.port.to_string()),
        ("unix_socket_directories", identity.socket_directory.display().to_string()),
        ("cluster_name", identity.cluster_name.clone()),
        ("hot_standby", "on".to_string()),
        ("wal_level", "logical".to_string()),
        ("max_wal_senders", "10".to_string()),
        ("max_replication_slots", "10".to_string()),
        ("archive_mode", "on".to_string()),
        (wal_keep_name, wal_keep_value.to_string()),
        ("logging_collector", "off".to_string()),
        ("log_destination", "stderr".to_string()),
    ];

    let mut parameters: Vec<Parameter> = fixed
        .into_iter()
        .map(|(name, value)| Parameter {
            name: name.to_string(),
            value: quote_value(&value),
        })
        .collect();

    for (name, value) in overrides {
        if FIXED_PARAMETERS.contains(&name.as_str()) {
            tracing::warn!(parameter = %name, "Ignoring override of an operator-managed parameter");
            continue;
        }
        parameters.push(Parameter {
            name: name.clone(),
            value: quote_value(value),
        });
    }

    parameters
}

fn quote_value(value: &str) -> String {
    value.replace('\'', "''")
}

pub(crate) fn templates() -> Result<Tera> {
    let mut tera = Tera::default();
    for (name, source) in [
        (POSTGRESQL_CONF, include_str!("templates/postgresql.conf")),
        (CUSTOM_CONF, include_str!("templates/custom.conf")),
        (AUTO_CONF, include_str!("templates/postgresql.auto.conf")),
    ] {
        tera.add_raw_template(name, source)
            .map_err(|source| RestoreError::Template { template: name, source })?;
    }
    Ok(tera)
}

pub(crate) fn render(tera: &Tera, template: &'static str, context: &TeraContext) -> Result<String> {
    tera.render(template, context)
        .map_err(|source| RestoreError::Template { template, source })
}

/// `postgresql.auto.conf` for an instance that has left recovery, naming
/// the cluster and the read-write service replicas of this pod will follow
pub fn promoted_auto_conf(cluster_name: &str, pod_name: &str) -> Result<String> {
    let tera = templates()?;

    let primary_conninfo = format!(
        "host={}-rw user=streaming_replica dbname=postgres application_name={}",
        cluster_name, pod_name
    );
    let mut context = TeraContext::new();
    context.insert("cluster_name", &quote_value(cluster_name));
    context.insert("primary_conninfo", &quote_value(&primary_conninfo));

    render(&tera, AUTO_CONF, &context)
}

/// Rewrites `postgresql.auto.conf` once the instance has been promoted
pub async fn write_promoted_auto_conf(pgdata: &Path, cluster_name: &str, pod_name: &str) -> Result<()> {
    let content = promoted_auto_conf(cluster_name, pod_name)?;
    write_file(&pgdata.join(AUTO_CONF), &content)
        .await
        .map_err(|e| RestoreError::io("cannot write postgresql.auto.conf", e))
}

/// Replaces the restored configuration with the one the cluster asks for
pub async fn write_initial_postgresql_conf<A: ClusterApi + ?Sized>(
    api: &A,
    pgdata: &Path,
    namespace: &str,
    cluster_name: &str,
    port: u16,
    socket_directory: &Path,
) -> Result<()> {
    let cluster = api.get_cluster(namespace, cluster_name).await?;
    let identity = ClusterIdentity {
        namespace: namespace.to_string(),
        cluster_name: cluster_name.to_string(),
        major_version: detect_major_version(pgdata).await?,
        port,
        socket_directory: socket_directory.to_path_buf(),
    };

    let desired = DesiredConfiguration::compute(&identity, &cluster.spec.postgresql.parameters)?;
    desired.apply(pgdata).await?;

    tracing::info!(
        cluster = %cluster_name,
        overrides = cluster.spec.postgresql.parameters.len(),
        "Wrote initial PostgreSQL configuration"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(major_version: u32) -> ClusterIdentity {
        ClusterIdentity {
            namespace: "db".into(),
            cluster_name: "orders".into(),
            major_version,
            port: 5432,
            socket_directory: PathBuf::from("/controller/run"),
        }
    }

    #[test]
    fn test_postgresql_conf_includes_custom_conf() {
        let desired = DesiredConfiguration::compute(&identity(14), &BTreeMap::new()).unwrap();

        assert!(desired.postgresql_conf.contains("include 'custom.conf'\n"));
        assert!(desired.postgresql_conf.contains("cluster orders in namespace db"));
    }

    #[test]
    fn test_custom_conf_renders_fixed_then_overrides() {
        let overrides = BTreeMap::from([
            ("work_mem".to_string(), "8MB".to_string()),
            ("shared_buffers".to_string(), "256MB".to_string()),
        ]);
        let desired = DesiredConfiguration::compute(&identity(14), &overrides).unwrap();
        let custom = &desired.custom_conf;

        assert!(custom.contains("port = '5432'\n"));
        assert!(custom.contains("unix_socket_directories = '/controller/run'\n"));
        assert!(custom.contains("cluster_name = 'orders'\n"));
        assert!(custom.contains("wal_keep_size = '512MB'\n"));
        assert!(!custom.contains("wal_keep_segments"));

        let shared_buffers = custom.find("shared_buffers = '256MB'").unwrap();
        let work_mem = custom.find("work_mem = '8MB'").unwrap();
        let port = custom.find("port = ").unwrap();
        assert!(port < shared_buffers);
        assert!(shared_buffers < work_mem);
    }

    #[test]
    fn test_fixed_parameters_cannot_be_overridden() {
        let overrides = BTreeMap::from([
            ("port".to_string(), "6543".to_string()),
            ("ssl".to_string(), "on".to_string()),
        ]);
        let desired = DesiredConfiguration::compute(&identity(14), &overrides).unwrap();

        assert!(!desired.custom_conf.contains("6543"));
        assert!(!desired.custom_conf.contains("ssl"));
    }

    #[test]
    fn test_values_are_quoted() {
        let overrides = BTreeMap::from([(
            "log_line_prefix".to_string(),
            "%m [%p] 'app' ".to_string(),
        )]);
        let desired = DesiredConfiguration::compute(&identity(14), &overrides).unwrap();

        assert!(desired.custom_conf.contains("log_line_prefix = '%m [%p] ''app'' '\n"));
    }

    #[test]
    fn test_old_versions_keep_segments() {
        let desired = DesiredConfiguration::compute(&identity(11), &BTreeMap::new()).unwrap();
        assert!(desired.custom_conf.contains("wal_keep_segments = '32'\n"));
    }

    #[test]
    fn test_auto_conf_is_only_the_header() {
        let desired = DesiredConfiguration::compute(&identity(14), &BTreeMap::new()).unwrap();
        assert_eq!(
            desired.auto_conf,
            "# Do not edit this file manually!\n# It will be overwritten by the ALTER SYSTEM command.\n"
        );
    }

    #[test]
    fn test_promoted_auto_conf_names_cluster_and_pod() {
        let auto = promoted_auto_conf("orders", "orders-1").unwrap();

        assert!(auto.starts_with("# Do not edit this file manually!\n"));
        assert!(auto.contains("cluster_name = 'orders'\n"));
        assert!(auto.contains(
            "primary_conninfo = 'host=orders-rw user=streaming_replica dbname=postgres application_name=orders-1'\n"
        ));
    }

    #[tokio::test]
    async fn test_apply_overwrites_and_disables_ssl() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(CUSTOM_CONF), "ssl = 'on'\nold = 'value'\n")
            .await
            .unwrap();

        let desired = DesiredConfiguration::compute(&identity(14), &BTreeMap::new()).unwrap();
        desired.apply(dir.path()).await.unwrap();

        let custom = tokio::fs::read_to_string(dir.path().join(CUSTOM_CONF)).await.unwrap();
        assert!(!custom.contains("old = 'value'"));
        assert!(custom.ends_with(SSL_DISABLED));
        assert_eq!(custom, format!("{}{}", desired.custom_conf, SSL_DISABLED));

        let postgresql = tokio::fs::read_to_string(dir.path().join(POSTGRESQL_CONF)).await.unwrap();
        assert_eq!(postgresql, desired.postgresql_conf);
    }
}
