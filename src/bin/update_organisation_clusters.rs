// src/bin/update_organisation_clusters.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use canon_lib::clustering::organisation_clusters::update_organisation_clusters;
use canon_lib::storage::PostgresWarehouse;
use canon_lib::utils::config::CanonicalizationConfig;
use canon_lib::utils::db_connect::connect;
use canon_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about = "Recompute the organisation name clusters", long_about = None)]
struct Args {
    /// Minimum pair match probability, overrides ORG_MATCH_THRESHOLD
    #[arg(long)]
    threshold: Option<f64>,

    /// Labeled pairs file, overrides ORG_TRAINING_FILE
    #[arg(long)]
    training_file: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting organisation clusters update");
    load_env();
    let args = Args::parse();

    let mut config = CanonicalizationConfig::from_env();
    if let Some(threshold) = args.threshold {
        config.org_match_threshold = threshold.clamp(0.0, 1.0);
    }
    if args.training_file.is_some() {
        config.org_training_file = args.training_file;
    }
    if args.no_progress {
        config.progress_enabled = false;
    }
    config.log_config();

    let start = Instant::now();
    let pool = connect().await.context("Failed to connect to database")?;
    let warehouse = PostgresWarehouse::new(pool);
    warehouse.ensure_schema().await?;

    let stats = update_organisation_clusters(&warehouse, &config).await?;
    info!(
        "Organisation clusters updated in {:.2?}: {} names, {} candidate pairs, {} matched, {} clusters",
        start.elapsed(),
        stats.names,
        stats.candidate_pairs,
        stats.matched_pairs,
        stats.clusters
    );
    Ok(())
}
