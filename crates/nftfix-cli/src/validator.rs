//! Batch validation
//!
//! For every batch id: enumerate its records, fetch each record's metadata
//! document, write a verdict, and keep one repaired document per batch.
//! Records that already have a verdict are skipped unless `refresh` is set, so
//! re-running after an interruption only touches what is left.
//!
//! Records of one batch run concurrently (bounded by `concurrency`). The batch
//! repair document is guarded by a per-batch async mutex: the first malformed
//! record to get there writes it and every later one is compared against it.

use crate::checkpoint::{CheckpointStore, RepairWrite};
use crate::error::Result;
use crate::fetch::ResilientFetcher;
use crate::lookup::RecordLookup;
use crate::progress;
use crate::summary::{FailedBatch, InvalidRecord, RejectedRecord, RunSummary, UnresolvedRecord};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use nftfix_common::metadata::{is_malformed, repair};
use nftfix_common::proxy::ProxyRewriter;
use nftfix_common::{MetadataDocument, RecordRef, Verdict};
use tokio::sync::Mutex;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Marker for lines in a batch list that are ignored
pub const COMMENT_MARKER: char = '#';

/// Parse a batch list file: one id per line, `#` comments and blank lines skipped
pub fn parse_batch_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            if line.starts_with(COMMENT_MARKER) {
                debug!(line, "Skipping commented batch");
                return false;
            }
            !line.is_empty()
        })
        .map(str::to_string)
        .collect()
}

/// What happened to the batch repair document for a malformed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairOutcome {
    /// This record's repair was stored
    Written,
    /// A stored repair existed and was equal
    Matched,
    /// A stored repair existed and differed; it was kept
    Drift,
}

/// Per-record result
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// A verdict already existed
    Skipped,
    Valid,
    Invalid {
        record: InvalidRecord,
        repair: RepairOutcome,
    },
    /// The document could not be fetched; no verdict was written
    Unresolved(UnresolvedRecord),
    /// The record id cannot be stored; the record was not evaluated
    Rejected(RejectedRecord),
}

#[derive(Default)]
struct RepairSlot {
    written_this_run: bool,
}

/// Drives lookup, fetch, detection, repair and checkpointing across batches
pub struct BatchValidator {
    lookup: Box<dyn RecordLookup>,
    fetcher: ResilientFetcher,
    proxy: ProxyRewriter,
    store: CheckpointStore,
    concurrency: usize,
    show_progress: bool,
}

impl BatchValidator {
    pub fn new(
        lookup: Box<dyn RecordLookup>,
        fetcher: ResilientFetcher,
        proxy: ProxyRewriter,
        store: CheckpointStore,
    ) -> Self {
        Self {
            lookup,
            fetcher,
            proxy,
            store,
            concurrency: crate::config::DEFAULT_CONCURRENCY,
            show_progress: false,
        }
    }

    /// Records of one batch processed at the same time (at least 1)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Draw a progress bar per batch
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Validate every batch in order. Batch failures are recorded in the
    /// summary; the run itself always completes.
    pub async fn run(&self, batch_ids: &[String], refresh: bool) -> RunSummary {
        let mut summary = RunSummary::new(refresh);

        for batch_id in batch_ids {
            let span = info_span!("batch", batch_id = %batch_id);
            match self
                .validate_batch(batch_id, refresh, &mut summary)
                .instrument(span)
                .await
            {
                Ok(()) => summary.batches_processed += 1,
                Err(e) => {
                    error!(batch_id = %batch_id, error = %e, "Batch aborted");
                    summary.failed_batches.push(FailedBatch {
                        batch_id: batch_id.clone(),
                        reason: e.to_string(),
                    });
                },
            }
        }

        summary.finish();
        summary
    }

    async fn validate_batch(
        &self,
        batch_id: &str,
        refresh: bool,
        summary: &mut RunSummary,
    ) -> Result<()> {
        self.store.ensure_batch(batch_id)?;

        info!("Validating batch");
        let records = self.lookup.lookup(batch_id).await?;
        if records.is_empty() {
            info!("Batch has no records");
            return Ok(());
        }

        let bar = if self.show_progress {
            progress::create_progress_bar(records.len() as u64, batch_id)
        } else {
            ProgressBar::hidden()
        };

        let slot = Mutex::new(RepairSlot::default());
        let mut outcomes = stream::iter(records.iter())
            .map(|record| self.validate_record(batch_id, record, refresh, &slot))
            .buffered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            bar.inc(1);
            summary.records_seen += 1;

            match outcome? {
                RecordOutcome::Skipped => summary.records_skipped += 1,
                RecordOutcome::Valid => summary.records_valid += 1,
                RecordOutcome::Invalid { record, repair } => {
                    match repair {
                        RepairOutcome::Written => {
                            summary.affected_batch_ids.insert(batch_id.to_string());
                        },
                        RepairOutcome::Drift => {
                            summary.drift_batches.insert(batch_id.to_string());
                        },
                        RepairOutcome::Matched => {},
                    }
                    summary.invalid_records.push(record);
                },
                RecordOutcome::Unresolved(record) => summary.unresolved_records.push(record),
                RecordOutcome::Rejected(record) => summary.rejected_records.push(record),
            }
        }

        bar.finish_and_clear();
        Ok(())
    }

    /// Evaluate one record. Only checkpoint I/O errors are returned; a failed
    /// fetch is reported as [`RecordOutcome::Unresolved`] and an unusable
    /// record id as [`RecordOutcome::Rejected`].
    async fn validate_record(
        &self,
        batch_id: &str,
        record: &RecordRef,
        refresh: bool,
        slot: &Mutex<RepairSlot>,
    ) -> Result<RecordOutcome> {
        let record_id = record.record_id.as_str();

        if let Err(e) = CheckpointStore::check_id(record_id) {
            warn!(record_id, error = %e, "Record id cannot be checkpointed, skipping record");
            return Ok(RecordOutcome::Rejected(RejectedRecord {
                batch_id: batch_id.to_string(),
                record_id: record_id.to_string(),
                reason: e.to_string(),
            }));
        }

        if !refresh && self.store.has_verdict(batch_id, record_id)? {
            debug!(record_id, "Verdict exists, skipping");
            return Ok(RecordOutcome::Skipped);
        }

        let fetched_uri = self.proxy.rewrite(&record.metadata_uri);
        let document = match self.fetcher.fetch(&fetched_uri).await {
            Ok(document) => document,
            Err(e) => {
                error!(record_id, uri = %fetched_uri, error = %e, "Metadata unavailable, leaving record unresolved");
                return Ok(RecordOutcome::Unresolved(UnresolvedRecord {
                    batch_id: batch_id.to_string(),
                    record_id: record_id.to_string(),
                    fetched_uri,
                }));
            },
        };

        if !is_malformed(&document) {
            self.store.write_verdict(batch_id, record_id, Verdict::Valid)?;
            return Ok(RecordOutcome::Valid);
        }

        info!(record_id, uri = %fetched_uri, "Malformed metadata");
        let repaired = repair(&document).document;

        // Repair before verdict: an interruption in between leaves the record
        // without a verdict, so the next run evaluates it again.
        let outcome = self.store_repair(batch_id, &repaired, refresh, slot).await?;
        self.store.write_verdict(batch_id, record_id, Verdict::Invalid)?;

        Ok(RecordOutcome::Invalid {
            record: InvalidRecord {
                batch_id: batch_id.to_string(),
                record_id: record_id.to_string(),
                metadata_uri: record.metadata_uri.clone(),
                fetched_uri,
            },
            repair: outcome,
        })
    }

    async fn store_repair(
        &self,
        batch_id: &str,
        repaired: &MetadataDocument,
        refresh: bool,
        slot: &Mutex<RepairSlot>,
    ) -> Result<RepairOutcome> {
        let mut slot = slot.lock().await;

        // Under refresh the stale document from an earlier run is replaced
        // once; later records of this run compare against the new one.
        if refresh && !slot.written_this_run {
            self.store.overwrite_batch_repair(batch_id, repaired)?;
            slot.written_this_run = true;
            return Ok(RepairOutcome::Written);
        }

        match self.store.write_batch_repair(batch_id, repaired)? {
            RepairWrite::Written => {
                slot.written_this_run = true;
                Ok(RepairOutcome::Written)
            },
            RepairWrite::Existing(existing) if existing == *repaired => Ok(RepairOutcome::Matched),
            RepairWrite::Existing(existing) => {
                error!(
                    fixed = %serde_json::to_string(repaired).unwrap_or_default(),
                    existing = %serde_json::to_string(&existing).unwrap_or_default(),
                    "Fixed metadata is different from existing metadata"
                );
                Ok(RepairOutcome::Drift)
            },
        }
    }
}
