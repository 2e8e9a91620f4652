//! Pool listing command

use anyhow::{Context, Result};
use dsrepl_core::Config;

/// List declared pools
pub async fn list(config_path: &str) -> Result<()> {
    tracing::info!("Listing pools");

    let config = Config::load(config_path).context("Failed to load topology")?;

    if config.pools.is_empty() {
        println!("No pools declared");
        return Ok(());
    }

    for pool in config.pools.iter() {
        println!("{}\t{}", pool.name, pool.transport);
    }
    Ok(())
}
