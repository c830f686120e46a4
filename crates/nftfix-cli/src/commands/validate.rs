//! `nftfix validate` command implementation
//!
//! Audits every batch listed in the batch file and writes a run summary.

use crate::checkpoint::CheckpointStore;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::fetch::ResilientFetcher;
use crate::lookup::{IndexerLookup, RecordLookup};
use crate::summary::RunSummary;
use crate::validator::{parse_batch_list, BatchValidator};
use colored::Colorize;
use nftfix_common::proxy::ProxyRewriter;
use std::path::Path;
use tracing::info;

/// Validate the batches listed in `cmids` against the configured indexer
pub async fn run(config: &Config, cmids: &Path, refresh: bool, show_progress: bool) -> Result<RunSummary> {
    let lookup = IndexerLookup::connect_lazy(config.require_indexer_url()?)?;
    run_with_lookup(config, cmids, refresh, Box::new(lookup), show_progress).await
}

/// Validate the batches listed in `cmids` using the given record source
pub async fn run_with_lookup(
    config: &Config,
    cmids: &Path,
    refresh: bool,
    lookup: Box<dyn RecordLookup>,
    show_progress: bool,
) -> Result<RunSummary> {
    let text = std::fs::read_to_string(cmids)
        .map_err(|_| CliError::FileNotFound(cmids.display().to_string()))?;
    let batch_ids = parse_batch_list(&text);

    if batch_ids.is_empty() {
        println!("No batch ids in {}", cmids.display());
    }

    let validator = BatchValidator::new(
        lookup,
        ResilientFetcher::new(config.fetch.clone())?,
        ProxyRewriter::with_mirror_host(&config.mirror_host),
        CheckpointStore::new(&config.data_dir),
    )
    .with_concurrency(config.concurrency)
    .with_progress(show_progress);

    info!(batches = batch_ids.len(), refresh, "Starting validation");
    let summary = validator.run(&batch_ids, refresh).await;

    print_summary(&summary);

    let path = summary.save(&config.summary_dir)?;
    println!("Saving summary to: {}", path.display());

    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    for batch in &summary.failed_batches {
        println!("{} {}: {}", "✗".red(), batch.batch_id, batch.reason);
    }
    for batch_id in &summary.drift_batches {
        println!(
            "{} {}: repaired metadata differs from the stored repair",
            "!".yellow().bold(),
            batch_id
        );
    }
    for record in &summary.rejected_records {
        println!(
            "{} {}/{}: {}",
            "✗".red(),
            record.batch_id,
            record.record_id,
            record.reason
        );
    }
    if !summary.unresolved_records.is_empty() {
        println!(
            "{} {} record(s) could not be fetched and will be retried next run",
            "!".yellow(),
            summary.unresolved_records.len()
        );
    }

    println!(
        "{} {} checked, {} skipped, {} valid",
        "→".cyan(),
        summary.records_seen - summary.records_skipped,
        summary.records_skipped,
        summary.records_valid
    );
    println!("{} {}", "✓".green(), summary.headline());
    if !summary.affected_batch_ids.is_empty() {
        println!(
            "  Repairs written for: {}",
            summary
                .affected_batch_ids
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
