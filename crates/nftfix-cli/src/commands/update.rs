//! `nftfix update` command implementation
//!
//! Points the invalid records of each uploaded batch at its repaired document.

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::error::Result;
use crate::progress;
use crate::publish::{self, Cluster, CommandPublisher, PublishReport, Publisher};
use colored::Colorize;
use std::path::Path;

/// Update records with the configured helper
pub async fn run(
    config: &Config,
    cluster: Cluster,
    payer: &Path,
    update_authority: &Path,
) -> Result<PublishReport> {
    let publisher = CommandPublisher::from_command_line(&config.publish_helper)?;
    run_with(config, &publisher, cluster, payer, update_authority).await
}

pub async fn run_with(
    config: &Config,
    publisher: &dyn Publisher,
    cluster: Cluster,
    payer: &Path,
    update_authority: &Path,
) -> Result<PublishReport> {
    let store = CheckpointStore::new(&config.data_dir);

    let spinner = progress::create_spinner(&format!("Updating records on {}...", cluster));
    let report =
        publish::update_pending(&store, publisher, cluster, payer, update_authority).await?;
    spinner.finish_and_clear();

    for (batch_id, url) in &report.published {
        println!("{} {} now points at {}", "✓".green(), batch_id, url);
    }
    for failed in &report.failed {
        println!("{} {}: {}", "✗".red(), failed.batch_id, failed.reason);
    }
    if report.published.is_empty() && report.failed.is_empty() {
        println!("Nothing to update on {}", cluster);
    }

    Ok(report)
}
