//! `nftfix status` command implementation
//!
//! Shows the checkpoint state of every batch in the data directory.

use crate::checkpoint::{CheckpointStore, Stamp};
use crate::config::Config;
use crate::error::Result;
use crate::publish::Cluster;
use clap::ValueEnum;
use colored::Colorize;

/// Show status of checkpointed batches
pub async fn run(config: &Config) -> Result<()> {
    let store = CheckpointStore::new(&config.data_dir);
    let batch_ids = store.batch_ids()?;

    if batch_ids.is_empty() {
        println!("No checkpointed batches in {}.", config.data_dir.display());
        println!("Run 'nftfix validate --cmids <file>' first.");
        return Ok(());
    }

    println!("{}", "Batches:".cyan().bold());
    println!();

    let mut total_invalid = 0;
    let mut repaired = 0;
    for batch_id in &batch_ids {
        let counts = store.verdict_counts(batch_id)?;
        let has_repair = store.repair_path(batch_id)?.is_file();
        total_invalid += counts.invalid;
        repaired += usize::from(has_repair);

        let label = if counts.invalid > 0 {
            batch_id.yellow()
        } else {
            batch_id.green()
        };
        println!("{}", label);
        println!("  Valid:    {}", counts.valid);
        println!("  Invalid:  {}", counts.invalid);
        println!("  Repair:   {}", if has_repair { "yes" } else { "no" });

        for cluster in Cluster::value_variants() {
            let uploaded = store.read_stamp(batch_id, Stamp::Upload, cluster.as_str())?;
            let updated = store.read_stamp(batch_id, Stamp::Update, cluster.as_str())?.is_some();
            if let Some(url) = uploaded {
                println!(
                    "  {:<13} uploaded {}{}",
                    format!("{}:", cluster),
                    url,
                    if updated { ", records updated" } else { "" }
                );
            }
        }
        println!();
    }

    println!("{}", "Summary:".cyan().bold());
    println!("  Batches:         {}", batch_ids.len());
    println!("  Invalid records: {}", total_invalid);
    println!("  With repair:     {}", repaired);
    println!("  Data dir:        {}", store.root().display());

    Ok(())
}
