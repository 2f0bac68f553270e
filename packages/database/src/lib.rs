#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Storage for the crime pipeline.
//!
//! Two stores back a run:
//!
//! - the **document store** ([`document_db`]) holds raw incident documents
//!   keyed by `report_number` and the neighborhood boundary collection;
//! - the **warehouse** ([`warehouse_db`]) holds finished tables that are
//!   fully replaced on every write.
//!
//! Both are `DuckDB` files opened once per run and passed explicitly into
//! the pipeline behind the [`IncidentStore`], [`BoundaryStore`] and
//! [`Warehouse`] traits. [`memory`] provides in-process doubles with the
//! same semantics.

pub mod document_db;
pub mod memory;
pub mod paths;
pub mod table;
pub mod timestamp;
pub mod warehouse_db;

use chrono::NaiveDateTime;
use crime_pipeline_neighborhood_models::NormalizedBoundary;

use crate::table::Table;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Stored document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Outcome of one upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    /// Keys that were not present before the batch.
    pub inserted: u64,
    /// Keys that already existed and had their document replaced.
    pub replaced: u64,
    /// Documents rejected for lacking a usable natural key.
    pub skipped: u64,
}

impl std::ops::AddAssign for UpsertCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.replaced += rhs.replaced;
        self.skipped += rhs.skipped;
    }
}

/// Incident documents keyed by natural key.
///
/// Upserts are full-document replacements, never merges, and documents are
/// never deleted.
pub trait IncidentStore {
    /// Returns the latest parseable `offense_date` across all documents.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn max_offense_date(&self) -> Result<Option<NaiveDateTime>, DbError>;

    /// Inserts new documents and replaces existing ones, by `report_number`.
    ///
    /// When a batch contains the same key more than once, the last
    /// occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails. A failed batch leaves the
    /// store unchanged.
    fn upsert_batch(&self, documents: &[serde_json::Value]) -> Result<UpsertCounts, DbError>;

    /// Returns every stored document.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a document is corrupt.
    fn load_all(&self) -> Result<Vec<serde_json::Value>, DbError>;

    /// Returns the number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn count(&self) -> Result<u64, DbError>;
}

/// The neighborhood boundary collection, replaced wholesale on every load.
pub trait BoundaryStore {
    /// Deletes all boundaries and inserts `boundaries` in their place.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails; the previous collection is
    /// kept in that case.
    fn replace_boundaries(&self, boundaries: &[NormalizedBoundary]) -> Result<u64, DbError>;

    /// Returns every stored boundary, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn load_boundaries(&self) -> Result<Vec<NormalizedBoundary>, DbError>;
}

/// Named relational tables with full-replace write semantics.
pub trait Warehouse {
    /// Drops `table.name` if present and recreates it with `table`'s
    /// columns and rows. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the write fails. Whether the previous table
    /// survives a failed write depends on the backend.
    fn replace_table(&self, table: &Table) -> Result<u64, DbError>;

    /// Reads a whole table, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    fn read_table(&self, name: &str) -> Result<Option<Table>, DbError>;
}

/// Runs `f` inside a `DuckDB` transaction, committing on success and
/// rolling back on error.
pub(crate) fn with_transaction<T>(
    conn: &duckdb::Connection,
    f: impl FnOnce(&duckdb::Connection) -> Result<T, DbError>,
) -> Result<T, DbError> {
    conn.execute_batch("BEGIN TRANSACTION")?;

    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                log::warn!("Rollback failed after {e}: {rollback}");
            }
            Err(e)
        }
    }
}
