//! nftfix Common Library
//!
//! Shared types and pure building blocks for the nftfix workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`NftFixError`] and the crate [`Result`] alias
//! - **Logging**: [`logging::init_logging`] and its configuration
//! - **Types**: [`RecordRef`] and [`Verdict`]
//! - **Metadata**: the metadata document model, malformation detection and repair
//! - **Proxy**: gateway-to-mirror URL rewriting
//!
//! # Example
//!
//! ```
//! use nftfix_common::metadata::{is_malformed, repair, MetadataDocument};
//!
//! let doc: MetadataDocument = serde_json::from_str(
//!     r#"{"image": "https://x/a.jpg", "properties": {"files": [{"uri": "a.jpg", "type": "image/jpeg"}]}}"#,
//! ).unwrap();
//! assert!(is_malformed(&doc));
//! assert!(!is_malformed(&repair(&doc).document));
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod metadata;
pub mod proxy;
pub mod types;

// Re-export commonly used types
pub use error::{NftFixError, Result};
pub use metadata::MetadataDocument;
pub use types::{RecordRef, Verdict};
