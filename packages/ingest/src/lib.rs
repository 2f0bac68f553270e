#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incremental crime incident pipeline.
//!
//! The daily run resolves a checkpoint from the document store, fetches
//! every new day page by page, upserts each page, then cleans the whole
//! store into the warehouse. The weekly run reloads the neighborhood
//! boundaries and joins the cleaned incidents against them.
//!
//! Stores, the page source, the pacer and the clock are passed into each
//! run, so the same code drives the `DuckDB` stores in production and the
//! in-memory doubles in tests.

pub mod checkpoint;
pub mod config;
pub mod export;
pub mod fetch;
pub mod runs;
pub mod tables;

use std::path::PathBuf;

use crime_pipeline_database::DbError;
use crime_pipeline_neighborhood::NeighborhoodError;
use crime_pipeline_source::SourceError;

/// Failures of the spatial join that are not storage errors.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// Reference data the join depends on is absent.
    #[error("Missing reference data: {what}")]
    MissingReferenceData {
        /// What was missing.
        what: String,
    },

    /// The input table has not been written yet.
    #[error("Warehouse table {table} does not exist")]
    MissingTable {
        /// Table name.
        table: String,
    },
}

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Remote API request failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Document store or warehouse operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Boundary reference file could not be loaded.
    #[error("Neighborhood error: {0}")]
    Neighborhood(#[from] NeighborhoodError),

    /// Spatial join preconditions were not met.
    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    /// JSON conversion failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV artifact could not be written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
