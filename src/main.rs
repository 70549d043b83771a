// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use canon_lib::canonical::{canonical_organisation_name, LocationCanonicalizer};
use canon_lib::storage::PostgresWarehouse;
use canon_lib::utils::config::CanonicalizationConfig;
use canon_lib::utils::db_connect::{connect, get_pool_status};
use canon_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the canonical form of a location (country) name, retraining on a miss
    Location {
        name: String,
    },
    /// Print the canonical form of an organisation name from the stored clusters
    Organisation {
        name: String,
    },
    /// Create warehouse tables and natural-key indexes
    InitSchema,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    load_env();
    let cli = Cli::parse();

    let config = CanonicalizationConfig::from_env();
    config.log_config();

    match cli.command {
        Command::Location { name } => {
            let canonicalizer = LocationCanonicalizer::from_config(&config)
                .await
                .context("Failed to initialize location canonicalizer")?;
            match canonicalizer.canonical_location_name(Some(&name)).await? {
                Some(canonical) => println!("{}", canonical),
                None => info!("Empty location name, nothing to canonicalize"),
            }
        }
        Command::Organisation { name } => {
            let pool = connect().await.context("Failed to connect to database")?;
            let warehouse = PostgresWarehouse::new(pool);
            let canonical = canonical_organisation_name(&warehouse, name.trim()).await?;
            println!("{}", canonical);
        }
        Command::InitSchema => {
            let pool = connect().await.context("Failed to connect to database")?;
            let warehouse = PostgresWarehouse::new(pool);
            warehouse.ensure_schema().await?;
            let (total, idle, in_use) = get_pool_status(warehouse.pool());
            info!(
                "Schema ready. Pool status: {} total, {} idle, {} in use",
                total, idle, in_use
            );
        }
    }
    Ok(())
}
