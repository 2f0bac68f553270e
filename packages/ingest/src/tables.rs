//! Conversions between pipeline rows and warehouse tables.

use crime_pipeline_database::table::{Cell, Column, Table};
use crime_pipeline_incident_models::{CleanIncident, IncidentColumn};
use crime_pipeline_spatial::join::JoinedIncident;

use crate::IngestError;

/// Neighborhood code column added by the spatial join.
pub const NEIGHBORHOOD_CODE: &str = "neighborhood_code";

/// Neighborhood name column added by the spatial join.
pub const NEIGHBORHOOD_NAME: &str = "neighborhood_name";

fn incident_columns() -> Vec<Column> {
    IncidentColumn::ALL
        .iter()
        .map(|column| {
            if column.is_coordinate() {
                Column::double(column.to_string())
            } else {
                Column::text(column.to_string())
            }
        })
        .collect()
}

fn incident_cells(incident: &CleanIncident) -> Vec<Cell> {
    IncidentColumn::ALL
        .iter()
        .map(|&column| match column {
            IncidentColumn::Longitude => Cell::Double(incident.longitude),
            IncidentColumn::Latitude => Cell::Double(incident.latitude),
            other => incident
                .text(other)
                .map_or(Cell::Null, |s| Cell::Text(s.to_string())),
        })
        .collect()
}

/// Builds the cleaned incidents table.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if `name` is not a plain identifier.
pub fn clean_table(name: &str, incidents: &[CleanIncident]) -> Result<Table, IngestError> {
    let mut table = Table::new(name, incident_columns())?;
    for incident in incidents {
        table.push_row(incident_cells(incident))?;
    }
    Ok(table)
}

/// Builds the joined table: every incident column plus the nullable
/// neighborhood code and name.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if `name` is not a plain identifier.
pub fn joined_table(name: &str, rows: &[JoinedIncident]) -> Result<Table, IngestError> {
    let mut columns = incident_columns();
    columns.push(Column::text(NEIGHBORHOOD_CODE));
    columns.push(Column::text(NEIGHBORHOOD_NAME));

    let mut table = Table::new(name, columns)?;
    for row in rows {
        let mut cells = incident_cells(&row.incident);
        cells.push(row.neighborhood_code.clone().map_or(Cell::Null, Cell::Text));
        cells.push(row.neighborhood_name.clone().map_or(Cell::Null, Cell::Text));
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Reads cleaned incidents back out of a warehouse table.
///
/// Columns are matched by name, so extra columns are ignored.
///
/// # Errors
///
/// Returns [`IngestError::Conversion`] for null or non-finite cells, and
/// [`IngestError::Json`] if a required column is missing or mistyped.
pub fn incidents_from_table(table: &Table) -> Result<Vec<CleanIncident>, IngestError> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut object = serde_json::Map::with_capacity(row.len());
            for (column, cell) in table.columns.iter().zip(row) {
                let value = match cell {
                    Cell::Text(s) => serde_json::Value::String(s.clone()),
                    Cell::Double(v) => serde_json::Number::from_f64(*v)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| IngestError::Conversion {
                            message: format!(
                                "non-finite {} in row {index} of {}",
                                column.name, table.name
                            ),
                        })?,
                    Cell::Null => {
                        return Err(IngestError::Conversion {
                            message: format!(
                                "null {} in row {index} of {}",
                                column.name, table.name
                            ),
                        });
                    }
                };
                object.insert(column.name.clone(), value);
            }
            Ok(serde_json::from_value(serde_json::Value::Object(object))?)
        })
        .collect()
}
