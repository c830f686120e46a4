//! Shared domain types

use crate::error::{NftFixError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One on-chain record and the metadata document it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    /// Record identifier (the mint address), unique within a batch
    pub record_id: String,

    /// URI of the off-chain metadata document
    pub metadata_uri: String,
}

impl RecordRef {
    pub fn new(record_id: impl Into<String>, metadata_uri: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            metadata_uri: metadata_uri.into(),
        }
    }
}

/// Persisted outcome of evaluating one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Valid,
    Invalid,
}

impl Verdict {
    /// Token written to the checkpoint file
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Valid => "valid",
            Verdict::Invalid => "invalid",
        }
    }
}

impl FromStr for Verdict {
    type Err = NftFixError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "valid" => Ok(Verdict::Valid),
            "invalid" => Ok(Verdict::Invalid),
            other => Err(NftFixError::InvalidVerdict(other.to_string())),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that an identifier can be used as a single path component.
///
/// Batch ids and record ids become directory and file names in the
/// checkpoint store, so anything that could address another location
/// is rejected.
pub fn validate_identifier(id: &str) -> Result<&str> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0'])
        || id.chars().any(char::is_whitespace);

    if bad {
        return Err(NftFixError::InvalidIdentifier(id.to_string()));
    }
    Ok(id)
}
