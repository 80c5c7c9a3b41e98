//! Command implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use permload_cf::CloudController;
use permload_core::RunConfig;
use permload_engine::{InMemoryPlatform, Provisioner, RemoteApi, RetryPolicy, RunReport, Seeder};
use tracing::{info, warn};

/// Load and validate a config file.
pub fn load(path: &Path) -> anyhow::Result<RunConfig> {
    let config = RunConfig::load(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    config.validate().context("Invalid config")?;
    Ok(config)
}

/// Seed the Cloud Controller named in `config`.
pub async fn run(config: &RunConfig) -> anyhow::Result<RunReport> {
    let client = CloudController::connect(&config.cloud_controller)
        .await
        .context("Failed to connect to Cloud Controller")?;
    seed(config, Arc::new(client)).await
}

/// Seed an in-memory platform with the same configuration.
pub async fn dry_run(config: &RunConfig) -> anyhow::Result<RunReport> {
    info!("Dry run against an in-memory platform");
    seed(config, Arc::new(InMemoryPlatform::new())).await
}

async fn seed(config: &RunConfig, api: Arc<dyn RemoteApi>) -> anyhow::Result<RunReport> {
    let policy = RetryPolicy::from_config(&config.test_data.retry);
    let seeder = Seeder::new(Provisioner::new(api, policy));

    let cancel = seeder.cancel_signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let report = seeder.run(&config.test_data).await?;
    Ok(report)
}

pub fn print_report(report: &RunReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
