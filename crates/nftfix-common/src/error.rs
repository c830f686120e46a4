//! Error types for nftfix

use thiserror::Error;

/// Result type alias for nftfix operations
pub type Result<T> = std::result::Result<T, NftFixError>;

/// Main error type shared across the workspace
#[derive(Error, Debug)]
pub enum NftFixError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid verdict token: {0:?}")]
    InvalidVerdict(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
