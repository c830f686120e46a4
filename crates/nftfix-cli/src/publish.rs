//! Publishing repaired documents
//!
//! Once a batch has a repair document it is uploaded to durable storage and
//! the batch's invalid records are pointed at the uploaded URL. Both steps are
//! delegated to a [`Publisher`]; this module only decides which batches need
//! which step and records progress in stamp files, so each step happens once
//! per batch and cluster.

use crate::checkpoint::{CheckpointStore, Stamp};
use crate::error::{CliError, Result};
use crate::summary::FailedBatch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// Target cluster; also part of the stamp file names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    Devnet,
    #[value(name = "mainnet-beta")]
    MainnetBeta,
}

impl Cluster {
    pub fn as_str(self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::MainnetBeta => "mainnet-beta",
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to repoint a batch's records
#[derive(Debug, Clone)]
pub struct UpdateRequest<'a> {
    pub batch_id: &'a str,
    pub uri: &'a str,
    pub record_ids: &'a [String],
    pub cluster: Cluster,
    pub payer: &'a Path,
    pub update_authority: &'a Path,
}

/// Uploads documents and updates on-chain pointers
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload `document` and return its public URL
    async fn upload(&self, document: &Path, cluster: Cluster, payer: &Path) -> Result<String>;

    /// Point every record in the request at `request.uri`
    async fn update(&self, request: &UpdateRequest<'_>) -> Result<()>;
}

/// Publisher backed by an external helper program.
///
/// `upload --file_path <path> --payer_keypath <key> --cluster <cluster>` must
/// print the uploaded URL as its last line of output.
/// `update --payer <key> --update_authority <key> --cluster <cluster> --uri <url> --mint <id>...`
/// must exit successfully once every mint is updated.
#[derive(Debug, Clone)]
pub struct CommandPublisher {
    program: String,
    args: Vec<String>,
}

impl CommandPublisher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line such as `ts-node nftutil.ts`
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CliError::config("publish helper command is empty"))?;
        Ok(Self::new(program, parts.collect()))
    }

    async fn run(&self, extra: Vec<OsString>) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(extra)
            .output()
            .await
            .map_err(|e| CliError::publish(format!("failed to start '{}': {}", self.program, e)))?;

        if !output.status.success() {
            return Err(CliError::publish(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn upload(&self, document: &Path, cluster: Cluster, payer: &Path) -> Result<String> {
        let stdout = self
            .run(vec![
                "upload".into(),
                "--file_path".into(),
                document.into(),
                "--payer_keypath".into(),
                payer.into(),
                "--cluster".into(),
                cluster.as_str().into(),
            ])
            .await?;

        let url = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .unwrap_or_default();

        if !is_http_url(url) {
            return Err(CliError::publish(format!(
                "upload helper did not print a URL (last line: {:?})",
                url
            )));
        }
        Ok(url.to_string())
    }

    async fn update(&self, request: &UpdateRequest<'_>) -> Result<()> {
        let mut args: Vec<OsString> = vec![
            "update".into(),
            "--payer".into(),
            request.payer.into(),
            "--update_authority".into(),
            request.update_authority.into(),
            "--cluster".into(),
            request.cluster.as_str().into(),
            "--uri".into(),
            request.uri.into(),
        ];
        for record_id in request.record_ids {
            args.push("--mint".into());
            args.push(record_id.into());
        }

        self.run(args).await?;
        Ok(())
    }
}

/// Result of an upload or update pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Batches handled in this pass with the URL involved
    pub published: Vec<(String, String)>,
    /// Batches with nothing to do
    pub skipped: Vec<String>,
    pub failed: Vec<FailedBatch>,
}

impl PublishReport {
    fn fail(&mut self, batch_id: &str, error: impl fmt::Display) {
        warn!(batch_id, error = %error, "Publish step failed");
        self.failed.push(FailedBatch {
            batch_id: batch_id.to_string(),
            reason: error.to_string(),
        });
    }
}

/// Upload every batch repair that has no upload stamp for `cluster`
pub async fn upload_pending(
    store: &CheckpointStore,
    publisher: &dyn Publisher,
    cluster: Cluster,
    payer: &Path,
) -> Result<PublishReport> {
    let mut report = PublishReport::default();

    for batch_id in store.batch_ids()? {
        let document: PathBuf = store.repair_path(&batch_id)?;
        if !document.is_file() || store.read_stamp(&batch_id, Stamp::Upload, cluster.as_str())?.is_some() {
            report.skipped.push(batch_id);
            continue;
        }

        info!(batch_id = %batch_id, path = %document.display(), %cluster, "Uploading batch repair");
        match publisher.upload(&document, cluster, payer).await {
            Ok(url) => {
                store.write_stamp(&batch_id, Stamp::Upload, cluster.as_str(), &url)?;
                report.published.push((batch_id, url));
            },
            Err(e) => report.fail(&batch_id, e),
        }
    }

    Ok(report)
}

/// Repoint the invalid records of every uploaded batch not yet updated on `cluster`
pub async fn update_pending(
    store: &CheckpointStore,
    publisher: &dyn Publisher,
    cluster: Cluster,
    payer: &Path,
    update_authority: &Path,
) -> Result<PublishReport> {
    let mut report = PublishReport::default();

    for batch_id in store.batch_ids()? {
        let Some(url) = store.read_stamp(&batch_id, Stamp::Upload, cluster.as_str())? else {
            report.skipped.push(batch_id);
            continue;
        };
        if store.read_stamp(&batch_id, Stamp::Update, cluster.as_str())?.is_some() {
            report.skipped.push(batch_id);
            continue;
        }
        if !is_http_url(&url) {
            report.fail(&batch_id, format!("upload stamp does not hold a URL: {:?}", url));
            continue;
        }

        let record_ids = store.invalid_records(&batch_id)?;
        if record_ids.is_empty() {
            info!(batch_id = %batch_id, "No invalid records to update");
            report.skipped.push(batch_id);
            continue;
        }

        info!(batch_id = %batch_id, records = record_ids.len(), %url, %cluster, "Updating records");
        let request = UpdateRequest {
            batch_id: &batch_id,
            uri: &url,
            record_ids: &record_ids,
            cluster,
            payer,
            update_authority,
        };
        match publisher.update(&request).await {
            Ok(()) => {
                store.write_stamp(&batch_id, Stamp::Update, cluster.as_str(), &url)?;
                report.published.push((batch_id, url));
            },
            Err(e) => report.fail(&batch_id, e),
        }
    }

    Ok(report)
}
