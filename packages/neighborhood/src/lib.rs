#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood boundary loading.
//!
//! Reads the static neighborhood `GeoJSON` reference file, normalizes its
//! features into [`NormalizedBoundary`] values and replaces the boundary
//! collection in the document store.
//!
//! [`NormalizedBoundary`]: crime_pipeline_neighborhood_models::NormalizedBoundary

pub mod ingest;
pub mod normalize;

use thiserror::Error;

/// Errors that can occur during neighborhood operations.
#[derive(Debug, Error)]
pub enum NeighborhoodError {
    /// Boundary file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that failed.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Boundary file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The file declares a coordinate reference system other than WGS84.
    #[error("Unsupported CRS {crs:?}: boundaries must be WGS84 (EPSG:4326)")]
    UnsupportedCrs {
        /// The declared CRS name.
        crs: String,
    },

    /// Storage operation failed.
    #[error("Database error: {0}")]
    Database(#[from] crime_pipeline_database::DbError),

    /// Data conversion or normalization error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
