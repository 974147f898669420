use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod config;

use cli::{Args, LogFormat};
use config::Settings;
use pgrestore_workflow::k8s_client::KubeClusterApi;
use pgrestore_workflow::restore::restore;

/// Initialize tracing on stderr, human-readable or as JSON lines
fn initialize_tracing(format: LogFormat) -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,\
         pgrestore_workflow=debug,\
         pgrestore_bootstrap=debug,\
         kube=warn,\
         tokio_postgres=warn"
            .into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to initialize tracing")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    initialize_tracing(args.log_format)?;

    let settings = Settings::from_args(args).context("Invalid configuration")?;

    let api = KubeClusterApi::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let output = restore(&settings.request, &api, &settings.instance, &settings.options)
        .await
        .with_context(|| {
            format!(
                "Restore of {} from backup {} failed",
                settings.request.cluster_name, settings.request.backup_name
            )
        })?;

    tracing::info!(
        backup_id = %output.backup_id,
        major_version = output.major_version,
        scheme = ?output.scheme,
        finalized = output.finalized,
        "✓ Restore finished"
    );
    Ok(())
}
