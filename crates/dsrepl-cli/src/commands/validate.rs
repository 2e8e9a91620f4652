//! Validate topology command

use anyhow::{Context, Result};
use dsrepl_core::Config;

/// Run the validate command
pub async fn run(config_path: &str) -> Result<()> {
    tracing::info!("Validating topology: {}", config_path);

    let config = Config::load(config_path).context("Failed to load topology")?;

    tracing::info!("✓ Pools: {}", config.pools.len());
    tracing::info!("✓ Pushs: {}", config.pushs.len());
    tracing::info!("✓ Pulls: {}", config.pulls.len());
    tracing::info!("✓ Sinks: {}", config.sinks.len());
    tracing::info!("✓ Digest: {}", config.digest);

    println!(
        "ok: {} pools, {} pushs, {} pulls, {} sinks ({})",
        config.pools.len(),
        config.pushs.len(),
        config.pulls.len(),
        config.sinks.len(),
        config.digest
    );
    Ok(())
}
