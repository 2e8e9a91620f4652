//! Dataset mapping command

use anyhow::{Context, Result, anyhow};
use dsrepl_core::{Config, DatasetPath};

/// Relationship whose mapping is applied
#[derive(Debug)]
pub enum Relationship {
    /// Pull from the named pool
    Pull(String),
    /// Sink accepting from the named peer
    Sink(String),
}

/// Resolve `dataset` through a relationship's mapping and print the target
pub async fn run(config_path: &str, relationship: Relationship, dataset: &str) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load topology")?;
    let source = DatasetPath::parse(dataset)?;

    let mapping = match &relationship {
        Relationship::Pull(pool) => config
            .find_pull(pool)
            .map(|p| &p.mapping)
            .ok_or_else(|| anyhow!("no pull from pool '{}'", pool))?,
        Relationship::Sink(from) => config
            .find_sink(from)
            .map(|s| &s.mapping)
            .ok_or_else(|| anyhow!("no sink accepting from '{}'", from))?,
    };

    tracing::debug!("Mapping {} via {:?}", source, relationship);

    let target = mapping
        .map(&source)
        .await
        .with_context(|| format!("Failed to map '{}'", source))?;

    println!("{} -> {}", source, target);
    Ok(())
}
