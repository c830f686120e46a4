//! Run summary
//!
//! One summary is accumulated per `validate` run and written once at the end
//! as `summary_<unix-nanos>.json`. Nothing reads it back.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A record found malformed during this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRecord {
    pub batch_id: String,
    pub record_id: String,
    pub metadata_uri: String,
    /// URI actually fetched, after proxy rewriting
    pub fetched_uri: String,
}

/// A record whose document could not be fetched; it has no verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedRecord {
    pub batch_id: String,
    pub record_id: String,
    pub fetched_uri: String,
}

/// A record whose id cannot be checkpointed; it was not evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub batch_id: String,
    pub record_id: String,
    pub reason: String,
}

/// A batch that was aborted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch_id: String,
    pub reason: String,
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub refresh: bool,
    pub batches_processed: usize,
    pub records_seen: usize,
    pub records_skipped: usize,
    pub records_valid: usize,
    pub invalid_records: Vec<InvalidRecord>,
    pub unresolved_records: Vec<UnresolvedRecord>,
    pub rejected_records: Vec<RejectedRecord>,
    /// Batches whose repair document was written during this run
    pub affected_batch_ids: BTreeSet<String>,
    /// Batches where a new repair disagreed with the stored one
    pub drift_batches: BTreeSet<String>,
    pub failed_batches: Vec<FailedBatch>,
}

impl RunSummary {
    pub fn new(refresh: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            refresh,
            batches_processed: 0,
            records_seen: 0,
            records_skipped: 0,
            records_valid: 0,
            invalid_records: Vec::new(),
            unresolved_records: Vec::new(),
            rejected_records: Vec::new(),
            affected_batch_ids: BTreeSet::new(),
            drift_batches: BTreeSet::new(),
            failed_batches: Vec::new(),
        }
    }

    pub fn invalid_record_count(&self) -> usize {
        self.invalid_records.len()
    }

    /// Number of invalid records and the number of batches they span
    pub fn headline(&self) -> String {
        let batches: BTreeSet<&str> = self
            .invalid_records
            .iter()
            .map(|r| r.batch_id.as_str())
            .collect();
        format!(
            "Found {} bad records across {} batches (since previous run)",
            self.invalid_record_count(),
            batches.len()
        )
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Write the summary into `dir` under a timestamped name
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let stamp = self
            .finished_at
            .unwrap_or(self.started_at)
            .timestamp_nanos_opt()
            .unwrap_or_default();
        let path = dir.join(format!("summary_{}.json", stamp));
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }
}
