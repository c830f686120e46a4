//! Filesystem checkpoint store
//!
//! Layout under the data directory:
//!
//! ```text
//! <root>/<batch_id>/<record_id>                       "valid" | "invalid"
//! <root>/<batch_id>/metadata.json                     repaired document for the batch
//! <root>/<batch_id>/metadata.json.upload.<target>     URL returned by the upload
//! <root>/<batch_id>/metadata.json.update.<target>     URL the records were pointed at
//! ```
//!
//! Every file is written to a hidden temporary sibling and renamed into place,
//! so an interrupted run leaves either the old content or the new content.

use crate::error::{CliError, Result};
use nftfix_common::types::validate_identifier;
use nftfix_common::{MetadataDocument, Verdict};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the batch repair document
pub const REPAIR_FILE: &str = "metadata.json";

/// Publish progress markers kept next to the repair document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    /// The repaired document was uploaded; holds the resulting URL
    Upload,
    /// The batch's records were pointed at the uploaded URL
    Update,
}

impl Stamp {
    fn file_name(self, target: &str) -> String {
        match self {
            Stamp::Upload => format!("{}.upload.{}", REPAIR_FILE, target),
            Stamp::Update => format!("{}.update.{}", REPAIR_FILE, target),
        }
    }
}

/// Outcome of [`CheckpointStore::write_batch_repair`]
#[derive(Debug, Clone, PartialEq)]
pub enum RepairWrite {
    /// No repair existed; the document was stored
    Written,
    /// A repair already existed and was left untouched
    Existing(MetadataDocument),
}

/// Verdict tally for one batch directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    pub valid: usize,
    pub invalid: usize,
}

/// Checkpoint store rooted at a data directory
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

fn checkpoint_io(action: &str, path: &Path, e: std::io::Error) -> CliError {
    CliError::checkpoint(format!("{} {}: {}", action, path.display(), e))
}

/// Identifiers become file names; reject anything that could collide with the
/// store's own files or leave the batch directory.
fn checked_id(id: &str) -> Result<&str> {
    let id = validate_identifier(id)?;
    if id.starts_with('.') || id.starts_with(REPAIR_FILE) {
        return Err(nftfix_common::NftFixError::InvalidIdentifier(id.to_string()).into());
    }
    Ok(id)
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CliError::checkpoint(format!("invalid checkpoint path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, contents).map_err(|e| checkpoint_io("writing", &tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| checkpoint_io("renaming into", path, e))?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(checkpoint_io("reading", path, e)),
    }
}

impl CheckpointStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that `id` can name a batch directory or record file
    pub fn check_id(id: &str) -> Result<&str> {
        checked_id(id)
    }

    /// Directory holding a batch's checkpoints (not created)
    pub fn batch_dir(&self, batch_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_id(batch_id)?))
    }

    /// Create the batch directory if needed
    pub fn ensure_batch(&self, batch_id: &str) -> Result<PathBuf> {
        let dir = self.batch_dir(batch_id)?;
        fs::create_dir_all(&dir).map_err(|e| checkpoint_io("creating", &dir, e))?;
        Ok(dir)
    }

    fn record_path(&self, batch_id: &str, record_id: &str) -> Result<PathBuf> {
        Ok(self.batch_dir(batch_id)?.join(checked_id(record_id)?))
    }

    /// Path of the batch repair document
    pub fn repair_path(&self, batch_id: &str) -> Result<PathBuf> {
        Ok(self.batch_dir(batch_id)?.join(REPAIR_FILE))
    }

    /// Whether a verdict file exists; the content is not inspected
    pub fn has_verdict(&self, batch_id: &str, record_id: &str) -> Result<bool> {
        Ok(self.record_path(batch_id, record_id)?.is_file())
    }

    pub fn read_verdict(&self, batch_id: &str, record_id: &str) -> Result<Option<Verdict>> {
        let path = self.record_path(batch_id, record_id)?;
        match read_optional(&path)? {
            Some(token) => Ok(Some(token.parse()?)),
            None => Ok(None),
        }
    }

    /// Write (or overwrite) a record's verdict
    pub fn write_verdict(&self, batch_id: &str, record_id: &str, verdict: Verdict) -> Result<()> {
        let path = self.record_path(batch_id, record_id)?;
        write_atomic(&path, verdict.as_str().as_bytes())?;
        debug!(batch_id, record_id, %verdict, "Verdict written");
        Ok(())
    }

    pub fn read_batch_repair(&self, batch_id: &str) -> Result<Option<MetadataDocument>> {
        let path = self.repair_path(batch_id)?;
        match read_optional(&path)? {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Store the batch repair unless one already exists.
    ///
    /// Callers racing on the same batch must serialize through their own lock;
    /// the store only provides the check-then-write.
    pub fn write_batch_repair(&self, batch_id: &str, doc: &MetadataDocument) -> Result<RepairWrite> {
        if let Some(existing) = self.read_batch_repair(batch_id)? {
            return Ok(RepairWrite::Existing(existing));
        }
        self.overwrite_batch_repair(batch_id, doc)?;
        Ok(RepairWrite::Written)
    }

    /// Store the batch repair unconditionally
    pub fn overwrite_batch_repair(&self, batch_id: &str, doc: &MetadataDocument) -> Result<()> {
        let path = self.repair_path(batch_id)?;
        write_atomic(&path, &serde_json::to_vec(doc)?)?;
        debug!(batch_id, path = %path.display(), "Batch repair written");
        Ok(())
    }

    pub fn read_stamp(&self, batch_id: &str, stamp: Stamp, target: &str) -> Result<Option<String>> {
        let path = self.batch_dir(batch_id)?.join(stamp.file_name(target));
        Ok(read_optional(&path)?.map(|s| s.trim().to_string()))
    }

    pub fn write_stamp(&self, batch_id: &str, stamp: Stamp, target: &str, value: &str) -> Result<()> {
        let path = self.batch_dir(batch_id)?.join(stamp.file_name(target));
        write_atomic(&path, value.as_bytes())
    }

    /// Batch ids that have a checkpoint directory, sorted
    pub fn batch_ids(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(checkpoint_io("listing", &self.root, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if checked_id(name).is_ok() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Every readable verdict in a batch, sorted by record id
    pub fn verdicts(&self, batch_id: &str) -> Result<Vec<(String, Verdict)>> {
        let dir = self.batch_dir(batch_id)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(checkpoint_io("listing", &dir, e)),
        };

        let mut verdicts = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if checked_id(&name).is_err() || !entry.file_type()?.is_file() {
                continue;
            }
            match self.read_verdict(batch_id, &name) {
                Ok(Some(verdict)) => verdicts.push((name, verdict)),
                Ok(None) => {},
                Err(e) => warn!(batch_id, record_id = %name, error = %e, "Ignoring unreadable verdict"),
            }
        }
        verdicts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(verdicts)
    }

    /// Record ids with an `invalid` verdict
    pub fn invalid_records(&self, batch_id: &str) -> Result<Vec<String>> {
        Ok(self
            .verdicts(batch_id)?
            .into_iter()
            .filter(|(_, verdict)| *verdict == Verdict::Invalid)
            .map(|(id, _)| id)
            .collect())
    }

    pub fn verdict_counts(&self, batch_id: &str) -> Result<VerdictCounts> {
        let mut counts = VerdictCounts::default();
        for (_, verdict) in self.verdicts(batch_id)? {
            match verdict {
                Verdict::Valid => counts.valid += 1,
                Verdict::Invalid => counts.invalid += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (CheckpointStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = CheckpointStore::new(temp.path().join("cmids"));
        (store, temp)
    }

    fn doc(value: serde_json::Value) -> MetadataDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_verdict_round_trip() {
        let (store, _temp) = create_test_store();
        store.ensure_batch("cm1").unwrap();

        assert!(!store.has_verdict("cm1", "mintA").unwrap());
        store.write_verdict("cm1", "mintA", Verdict::Valid).unwrap();
        assert!(store.has_verdict("cm1", "mintA").unwrap());
        assert_eq!(store.read_verdict("cm1", "mintA").unwrap(), Some(Verdict::Valid));

        store.write_verdict("cm1", "mintA", Verdict::Invalid).unwrap();
        assert_eq!(store.read_verdict("cm1", "mintA").unwrap(), Some(Verdict::Invalid));
        assert_eq!(
            fs::read_to_string(store.batch_dir("cm1").unwrap().join("mintA")).unwrap(),
            "invalid"
        );
    }

    #[test]
    fn test_has_verdict_ignores_content() {
        let (store, _temp) = create_test_store();
        let dir = store.ensure_batch("cm1").unwrap();
        fs::write(dir.join("mintA"), "garbage").unwrap();
        assert!(store.has_verdict("cm1", "mintA").unwrap());
        assert!(store.read_verdict("cm1", "mintA").is_err());
    }

    #[test]
    fn test_first_repair_writer_wins() {
        let (store, _temp) = create_test_store();
        store.ensure_batch("cm1").unwrap();
        let first = doc(json!({"name": "first"}));
        let second = doc(json!({"name": "second"}));

        assert_eq!(store.read_batch_repair("cm1").unwrap(), None);
        assert_eq!(store.write_batch_repair("cm1", &first).unwrap(), RepairWrite::Written);
        assert_eq!(
            store.write_batch_repair("cm1", &second).unwrap(),
            RepairWrite::Existing(first.clone())
        );
        assert_eq!(store.read_batch_repair("cm1").unwrap(), Some(first));

        store.overwrite_batch_repair("cm1", &second).unwrap();
        assert_eq!(store.read_batch_repair("cm1").unwrap(), Some(second));
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let (store, _temp) = create_test_store();
        let dir = store.ensure_batch("cm1").unwrap();
        store.write_verdict("cm1", "mintA", Verdict::Valid).unwrap();
        store.overwrite_batch_repair("cm1", &MetadataDocument::default()).unwrap();

        let names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");
    }

    #[test]
    fn test_listing_and_counts() {
        let (store, _temp) = create_test_store();
        store.ensure_batch("cm2").unwrap();
        store.ensure_batch("cm1").unwrap();
        store.write_verdict("cm1", "mintB", Verdict::Invalid).unwrap();
        store.write_verdict("cm1", "mintA", Verdict::Invalid).unwrap();
        store.write_verdict("cm1", "mintC", Verdict::Valid).unwrap();
        store.overwrite_batch_repair("cm1", &MetadataDocument::default()).unwrap();
        store.write_stamp("cm1", Stamp::Upload, "devnet", "https://arweave.net/x").unwrap();

        assert_eq!(store.batch_ids().unwrap(), vec!["cm1", "cm2"]);
        assert_eq!(store.invalid_records("cm1").unwrap(), vec!["mintA", "mintB"]);
        assert_eq!(
            store.verdict_counts("cm1").unwrap(),
            VerdictCounts { valid: 1, invalid: 2 }
        );
        assert_eq!(store.verdict_counts("cm2").unwrap(), VerdictCounts::default());
    }

    #[test]
    fn test_stamps_are_per_target() {
        let (store, _temp) = create_test_store();
        store.ensure_batch("cm1").unwrap();
        store.write_stamp("cm1", Stamp::Upload, "devnet", "https://arweave.net/x\n").unwrap();

        assert_eq!(
            store.read_stamp("cm1", Stamp::Upload, "devnet").unwrap().as_deref(),
            Some("https://arweave.net/x")
        );
        assert_eq!(store.read_stamp("cm1", Stamp::Upload, "mainnet-beta").unwrap(), None);
        assert_eq!(store.read_stamp("cm1", Stamp::Update, "devnet").unwrap(), None);
    }

    #[test]
    fn test_rejects_escaping_identifiers() {
        let (store, _temp) = create_test_store();
        assert!(store.batch_dir("../outside").is_err());
        assert!(store.batch_dir(".hidden").is_err());
        store.ensure_batch("cm1").unwrap();
        assert!(store.write_verdict("cm1", "metadata.json", Verdict::Valid).is_err());
        assert!(store.write_verdict("cm1", "", Verdict::Valid).is_err());
    }

    #[test]
    fn test_missing_root_lists_nothing() {
        let (store, _temp) = create_test_store();
        assert!(store.batch_ids().unwrap().is_empty());
        assert!(store.invalid_records("cm1").unwrap().is_empty());
    }
}
