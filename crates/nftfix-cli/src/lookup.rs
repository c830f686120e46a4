//! Record enumeration
//!
//! A batch id (candy machine address) expands into the records minted under
//! it. The production source is the indexer's Postgres database; tests and
//! offline runs use [`StaticLookup`].

use crate::error::{CliError, Result};
use async_trait::async_trait;
use nftfix_common::RecordRef;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Source of the records belonging to a batch
#[async_trait]
pub trait RecordLookup: Send + Sync {
    /// Records of `batch_id` in the source's order. An unknown batch yields an
    /// empty list.
    async fn lookup(&self, batch_id: &str) -> Result<Vec<RecordRef>>;
}

const MEMBER_RECORDS_QUERY: &str = r#"
    SELECT metadatas.mint_address, metadatas.uri
    FROM candy_machines
    INNER JOIN candy_machine_collection_pdas
        ON candy_machine_collection_pdas.candy_machine = candy_machines.address
    INNER JOIN metadata_collection_keys
        ON metadata_collection_keys.collection_address = candy_machine_collection_pdas.mint
    INNER JOIN metadatas
        ON metadatas.address = metadata_collection_keys.metadata_address
    LEFT JOIN current_metadata_owners
        ON metadatas.mint_address = current_metadata_owners.mint_address
    WHERE candy_machines.address = $1
"#;

/// Looks records up in the indexer database
pub struct IndexerLookup {
    pool: PgPool,
}

impl IndexerLookup {
    /// Create a lookup against `database_url`; the connection is opened on first use
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordLookup for IndexerLookup {
    async fn lookup(&self, batch_id: &str) -> Result<Vec<RecordRef>> {
        let rows: Vec<(String, String)> = sqlx::query_as(MEMBER_RECORDS_QUERY)
            .bind(batch_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CliError::lookup(batch_id, e))?;

        debug!(batch_id, records = rows.len(), "Indexer returned records");

        Ok(rows
            .into_iter()
            .map(|(mint, uri)| record_from_row(&mint, &uri))
            .collect())
    }
}

/// The indexer pads some values with spaces, inside as well as around them
fn record_from_row(mint: &str, uri: &str) -> RecordRef {
    RecordRef::new(mint.replace(' ', ""), uri.replace(' ', ""))
}

/// In-memory lookup
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    batches: HashMap<String, Vec<RecordRef>>,
    failing: Vec<String>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the records of a batch
    pub fn with_batch(mut self, batch_id: impl Into<String>, records: Vec<RecordRef>) -> Self {
        self.batches.insert(batch_id.into(), records);
        self
    }

    /// Make lookups of `batch_id` fail
    pub fn with_failure(mut self, batch_id: impl Into<String>) -> Self {
        self.failing.push(batch_id.into());
        self
    }
}

#[async_trait]
impl RecordLookup for StaticLookup {
    async fn lookup(&self, batch_id: &str) -> Result<Vec<RecordRef>> {
        if self.failing.iter().any(|b| b == batch_id) {
            return Err(CliError::lookup(batch_id, "lookup source unavailable"));
        }
        Ok(self.batches.get(batch_id).cloned().unwrap_or_default())
    }
}
