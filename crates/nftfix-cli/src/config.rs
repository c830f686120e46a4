//! Configuration management for the nftfix CLI
//!
//! Values come from defaults, then environment variables (a `.env` file is
//! loaded by the binary), then command-line flags applied by the commands.

use crate::error::{CliError, Result};
use crate::fetch::FetchConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// CLI Configuration Constants
// ============================================================================

/// Default checkpoint root, one subdirectory per batch
pub const DEFAULT_DATA_DIR: &str = "./cmids";

/// Default number of records of one batch processed at the same time
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Default external program used to upload and update documents
pub const DEFAULT_PUBLISH_HELPER: &str = "ts-node nftutil.ts";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Checkpoint root directory
    pub data_dir: PathBuf,

    /// Where run summaries are written
    pub summary_dir: PathBuf,

    /// Postgres URL of the indexer used to enumerate records
    pub indexer_url: Option<String>,

    /// Mirror host used for gateway URLs
    pub mirror_host: String,

    /// Bounded worker count per batch
    pub concurrency: usize,

    /// Metadata fetch settings
    pub fetch: FetchConfig,

    /// Program (plus leading arguments) invoked to publish documents
    pub publish_helper: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            summary_dir: PathBuf::from("."),
            indexer_url: None,
            mirror_host: nftfix_common::proxy::DEFAULT_MIRROR_HOST.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            fetch: FetchConfig::default(),
            publish_helper: DEFAULT_PUBLISH_HELPER.to_string(),
        }
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| CliError::config(format!("{} has invalid value '{}': {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load config from environment variables
    ///
    /// - `NFTFIX_DATA_DIR`, `NFTFIX_SUMMARY_DIR`
    /// - `HOLAPLEX_INDEXER_POSTGRES_URL`
    /// - `NFTFIX_MIRROR_HOST`, `NFTFIX_CONCURRENCY`
    /// - `NFTFIX_MAX_ATTEMPTS`, `NFTFIX_FETCH_TIMEOUT_SECS`
    /// - `NFTFIX_PUBLISH_HELPER`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("NFTFIX_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("NFTFIX_SUMMARY_DIR") {
            config.summary_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("HOLAPLEX_INDEXER_POSTGRES_URL") {
            config.indexer_url = Some(url);
        }

        if let Ok(host) = std::env::var("NFTFIX_MIRROR_HOST") {
            config.mirror_host = host;
        }

        if let Some(concurrency) = env_parse("NFTFIX_CONCURRENCY")? {
            config.set_concurrency(concurrency)?;
        }

        if let Some(attempts) = env_parse("NFTFIX_MAX_ATTEMPTS")? {
            config.set_max_attempts(attempts)?;
        }

        if let Some(secs) = env_parse::<u64>("NFTFIX_FETCH_TIMEOUT_SECS")? {
            config.fetch.timeout = Duration::from_secs(secs);
        }

        if let Ok(helper) = std::env::var("NFTFIX_PUBLISH_HELPER") {
            config.publish_helper = helper;
        }

        Ok(config)
    }

    /// Set the per-batch worker count (at least 1)
    pub fn set_concurrency(&mut self, concurrency: usize) -> Result<()> {
        if concurrency == 0 {
            return Err(CliError::config("concurrency must be at least 1"));
        }
        self.concurrency = concurrency;
        Ok(())
    }

    /// Set the fetch attempt budget (at least 1)
    pub fn set_max_attempts(&mut self, attempts: u32) -> Result<()> {
        if attempts == 0 {
            return Err(CliError::config("max attempts must be at least 1"));
        }
        self.fetch.max_attempts = attempts;
        Ok(())
    }

    /// The indexer URL, or a configuration error naming the variable to set
    pub fn require_indexer_url(&self) -> Result<&str> {
        self.indexer_url.as_deref().ok_or_else(|| {
            CliError::config(
                "No indexer URL configured; set HOLAPLEX_INDEXER_POSTGRES_URL or pass --indexer-url",
            )
        })
    }
}
