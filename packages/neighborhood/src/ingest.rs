//! Loads the boundary reference file into the document store.

use std::path::Path;

use crime_pipeline_database::BoundaryStore;
use crime_pipeline_neighborhood_models::BoundaryFieldMapping;

use crate::NeighborhoodError;
use crate::normalize::normalize_geojson;

/// Outcome of loading a boundary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryIngestSummary {
    /// Boundaries written to the store.
    pub stored: u64,
    /// Features skipped during normalization.
    pub skipped: u64,
    /// CRS declared by the file, if any.
    pub declared_crs: Option<String>,
}

/// Reads `path`, normalizes its features and replaces the stored boundary
/// collection with them.
///
/// The store is only touched once the whole file has been read and
/// normalized, so a bad file leaves the previous collection intact.
///
/// # Errors
///
/// Returns [`NeighborhoodError`] if the file cannot be read or parsed,
/// declares an unsupported CRS, or the store write fails.
pub fn ingest_boundary_file(
    store: &dyn BoundaryStore,
    path: &Path,
    fields: &BoundaryFieldMapping,
) -> Result<BoundaryIngestSummary, NeighborhoodError> {
    log::info!("Loading neighborhood boundaries from {}", path.display());

    let text = std::fs::read_to_string(path).map_err(|source| NeighborhoodError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let collection = normalize_geojson(&text, fields)?;
    log::info!(
        "Normalized {} boundaries ({} skipped)",
        collection.boundaries.len(),
        collection.skipped
    );

    let stored = store.replace_boundaries(&collection.boundaries)?;
    log::info!("Replaced boundary collection with {stored} neighborhoods");

    Ok(BoundaryIngestSummary {
        stored,
        skipped: collection.skipped,
        declared_crs: collection.declared_crs,
    })
}
