//! `nftfix runall` command implementation
//!
//! Full cycle: validate with refresh, then upload, then update.

use crate::config::Config;
use crate::error::Result;
use crate::publish::Cluster;
use colored::Colorize;
use std::path::Path;

pub async fn run(
    config: &Config,
    cmids: &Path,
    cluster: Cluster,
    payer: &Path,
    update_authority: &Path,
    show_progress: bool,
) -> Result<()> {
    println!("{} Validating (refresh)", "→".cyan());
    super::validate::run(config, cmids, true, show_progress).await?;

    println!("{} Uploading", "→".cyan());
    super::upload::run(config, cluster, payer).await?;

    println!("{} Updating", "→".cyan());
    super::update::run(config, cluster, payer, update_authority).await?;

    println!("\n{} Full cycle complete", "✓".green().bold());
    Ok(())
}
