//! dsrepl CLI
//!
//! Validates and inspects replication topologies.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// dsrepl - dataset replication topology tool
#[derive(Parser)]
#[command(name = "dsrepl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Topology file or directory containing dsrepl.yaml
    #[arg(short, long, default_value = "dsrepl.yaml", env = "DSREPL_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the topology without running anything
    Validate,

    /// List declared pools and their transports
    Pools,

    /// Show where a dataset would be received
    Map {
        /// Use the mapping of the pull from this pool
        #[arg(long, conflicts_with = "sink", required_unless_present = "sink")]
        pull: Option<String>,

        /// Use the mapping of the sink accepting from this peer
        #[arg(long)]
        sink: Option<String>,

        /// Source dataset path
        dataset: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Validate => {
            commands::validate::run(&cli.config).await?;
        }
        Commands::Pools => {
            commands::pools::list(&cli.config).await?;
        }
        Commands::Map {
            pull,
            sink,
            dataset,
        } => {
            let relationship = match (pull, sink) {
                (Some(pool), _) => commands::map::Relationship::Pull(pool),
                (None, Some(from)) => commands::map::Relationship::Sink(from),
                (None, None) => anyhow::bail!("either --pull or --sink is required"),
            };
            commands::map::run(&cli.config, relationship, &dataset).await?;
        }
    }

    Ok(())
}
