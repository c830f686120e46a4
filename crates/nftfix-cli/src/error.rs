//! Error types for the nftfix CLI
//!
//! Messages are user-facing and say what to check next.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Record enumeration for a batch failed
    #[error("Record lookup failed for batch '{batch_id}': {reason}. Check the indexer connection URL.")]
    Lookup { batch_id: String, reason: String },

    /// Every fetch attempt for a metadata document failed
    #[error("Fetching '{uri}' failed after {attempts} attempt(s): {last_error}")]
    FetchExhausted {
        uri: String,
        attempts: u32,
        last_error: String,
    },

    /// Checkpoint directory could not be read or written
    #[error("Checkpoint error: {0}. Check permissions on the data directory.")]
    Checkpoint(String),

    /// Publishing a repaired document failed
    #[error("Publish error: {0}")]
    Publish(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or command-line flags.")]
    Config(String),

    /// Required file is missing
    #[error("File not found: '{0}'. Verify the file path exists and you have read permissions.")]
    FileNotFound(String),

    /// Indexer query failed
    #[error("Database error: {0}. Check the indexer connection URL.")]
    Database(#[from] sqlx::Error),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Shared library error
    #[error(transparent)]
    Common(#[from] nftfix_common::NftFixError),
}

impl CliError {
    /// Create a lookup error
    pub fn lookup(batch_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Lookup {
            batch_id: batch_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Create a publish error
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
