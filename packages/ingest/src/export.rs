//! Delimited-file export of warehouse tables.

use std::path::Path;

use crime_pipeline_database::paths::ensure_parent;
use crime_pipeline_database::table::{Cell, Table};

use crate::IngestError;

/// Writes `table` to `path` as CSV with a header row.
///
/// Null cells are written as empty fields. Parent directories are created
/// as needed and an existing file is overwritten.
///
/// # Errors
///
/// Returns [`IngestError`] if the directory cannot be created or the file
/// cannot be written.
pub fn write_csv(path: &Path, table: &Table) -> Result<u64, IngestError> {
    ensure_parent(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;

    for row in &table.rows {
        writer.write_record(row.iter().map(Cell::render))?;
    }

    writer.flush().map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Wrote {} rows to {}", table.len(), path.display());

    Ok(table.len() as u64)
}
