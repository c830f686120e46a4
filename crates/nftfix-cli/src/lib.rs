//! nftfix CLI Library
//!
//! Audits and repairs the off-chain metadata of NFT collections.
//!
//! # Overview
//!
//! - **Validation**: Fetch every record's metadata document, flag malformed
//!   ones and write one repaired document per batch (`nftfix validate`)
//! - **Upload**: Publish batch repairs to durable storage (`nftfix upload`)
//! - **Update**: Point invalid records at the published repair (`nftfix update`)
//! - **Full cycle**: Refresh, upload and update in one go (`nftfix runall`)
//! - **Status**: Inspect checkpointed batches (`nftfix status`)
//!
//! Progress is checkpointed on disk under the data directory, so every
//! command can be interrupted and re-run.

pub mod checkpoint;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod lookup;
pub mod progress;
pub mod publish;
pub mod summary;
pub mod validator;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, Result};

use clap::{Parser, Subcommand};
use publish::Cluster;
use std::path::PathBuf;

/// nftfix - NFT metadata audit and repair
#[derive(Parser, Debug)]
#[command(name = "nftfix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Checkpoint directory, one subdirectory per batch
    #[arg(long, env = "NFTFIX_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Print the full command reference as markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate every record of the listed batches and repair malformed metadata
    Validate {
        /// File with one batch id per line (`#` comments out a line)
        #[arg(long, default_value = "cmids.txt")]
        cmids: PathBuf,

        /// Re-evaluate records that already have a verdict
        #[arg(short, long)]
        refresh: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Upload batch repairs that are not uploaded to the cluster yet
    Upload {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Point invalid records at their uploaded repair
    Update {
        #[command(flatten)]
        target: TargetArgs,

        /// Update authority keypair
        #[arg(long)]
        update_authority: PathBuf,
    },

    /// Validate with refresh, then upload, then update
    Runall {
        /// File with one batch id per line
        #[arg(long, default_value = "cmids.txt")]
        cmids: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// Update authority keypair
        #[arg(long)]
        update_authority: PathBuf,
    },

    /// Show checkpoint state of every batch
    Status,
}

/// Options shared by commands that validate
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Indexer Postgres URL used to enumerate batch records
    #[arg(long, env = "HOLAPLEX_INDEXER_POSTGRES_URL", hide_env_values = true)]
    pub indexer_url: Option<String>,

    /// Records of one batch processed at the same time
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Fetch attempts per document before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Hide per-batch progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl RunArgs {
    /// Apply the flags that were given on top of `config`
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(url) = &self.indexer_url {
            config.indexer_url = Some(url.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.set_concurrency(concurrency)?;
        }
        if let Some(attempts) = self.max_attempts {
            config.set_max_attempts(attempts)?;
        }
        Ok(())
    }
}

/// Options shared by commands that publish
#[derive(clap::Args, Debug, Clone)]
pub struct TargetArgs {
    /// Target cluster
    #[arg(long, value_enum, default_value_t = Cluster::Devnet)]
    pub cluster: Cluster,

    /// Payer keypair
    #[arg(long)]
    pub payer: PathBuf,
}
