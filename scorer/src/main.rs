use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::{ScoringConfig, DEFAULT_CONFIG_FILE};
use crate::helper_functions::project_root;

mod analysis;
mod config;
mod data_handling;
mod errors;
mod helper_functions;
mod models;
mod output;
mod pipeline;
mod protein;
mod sampling;
mod stats;

fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the protease combination scoring");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| project_root().join(DEFAULT_CONFIG_FILE));

    let config = ScoringConfig::from_json_file(&config_path)
        .with_context(|| format!("Could not load configuration {}", config_path.display()))?;

    let output = match pipeline::run(&config) {
        Ok(output) => output,
        Err(e) => {
            error!("Run aborted: {}", e);
            return Err(e).context("Protease scoring failed");
        }
    };

    info!("{:<25} {:>8}", "Result records", output.results.len());
    info!("{:<25} {:>8}", "Scored records", output.scores.len());
    for s in output.summary.iter().take(10) {
        info!(
            "{:<20} {:<30} μ = {:>8.4}  σ = {:>8.4}  n = {:>4}",
            s.group, s.combination, s.unfiltered.mean, s.unfiltered.std_dev, s.unfiltered.count
        );
    }
    info!("Finished; results in {}", config.output_directory.display());
    Ok(())
}
