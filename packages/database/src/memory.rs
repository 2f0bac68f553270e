//! In-memory store implementations.
//!
//! Same semantics as the `DuckDB` stores, without touching disk. Used by
//! tests and by dry runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::NaiveDateTime;
use crime_pipeline_incident_models::{IncidentColumn, natural_key};
use crime_pipeline_neighborhood_models::NormalizedBoundary;

use crate::table::{Table, validate_identifier};
use crate::{BoundaryStore, DbError, IncidentStore, UpsertCounts, Warehouse};

fn poisoned() -> DbError {
    DbError::Conversion {
        message: "in-memory store lock poisoned".to_string(),
    }
}

/// Incident documents held in a sorted map keyed by `report_number`.
#[derive(Default)]
pub struct MemoryIncidentStore {
    documents: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl MemoryIncidentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IncidentStore for MemoryIncidentStore {
    fn max_offense_date(&self) -> Result<Option<NaiveDateTime>, DbError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;

        Ok(documents
            .values()
            .filter_map(|doc| doc.get(IncidentColumn::OffenseDate.as_ref()))
            .filter_map(serde_json::Value::as_str)
            .filter_map(crate::timestamp::parse_timestamp)
            .max())
    }

    fn upsert_batch(&self, documents: &[serde_json::Value]) -> Result<UpsertCounts, DbError> {
        let mut store = self.documents.write().map_err(|_| poisoned())?;
        let mut counts = UpsertCounts::default();
        let mut seen_in_batch: BTreeMap<&str, bool> = BTreeMap::new();

        for document in documents {
            let Some(key) = natural_key(document) else {
                counts.skipped += 1;
                continue;
            };

            // Existence is judged against the store as it was before the
            // batch, so a key repeated within one batch counts once.
            seen_in_batch
                .entry(key)
                .or_insert_with(|| store.contains_key(key));
            store.insert(key.to_string(), document.clone());
        }

        for existed in seen_in_batch.values() {
            if *existed {
                counts.replaced += 1;
            } else {
                counts.inserted += 1;
            }
        }

        Ok(counts)
    }

    fn load_all(&self) -> Result<Vec<serde_json::Value>, DbError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.values().cloned().collect())
    }

    fn count(&self) -> Result<u64, DbError> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.len() as u64)
    }
}

/// Boundary collection held in a vector.
#[derive(Default)]
pub struct MemoryBoundaryStore {
    boundaries: RwLock<Vec<NormalizedBoundary>>,
}

impl MemoryBoundaryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoundaryStore for MemoryBoundaryStore {
    fn replace_boundaries(&self, boundaries: &[NormalizedBoundary]) -> Result<u64, DbError> {
        let mut stored = self.boundaries.write().map_err(|_| poisoned())?;
        *stored = boundaries.to_vec();
        Ok(stored.len() as u64)
    }

    fn load_boundaries(&self) -> Result<Vec<NormalizedBoundary>, DbError> {
        Ok(self.boundaries.read().map_err(|_| poisoned())?.clone())
    }
}

/// Warehouse tables held in a map keyed by name.
#[derive(Default)]
pub struct MemoryWarehouse {
    tables: RwLock<BTreeMap<String, Table>>,
}

impl MemoryWarehouse {
    /// Creates an empty warehouse.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all stored tables.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the lock is poisoned.
    pub fn table_names(&self) -> Result<Vec<String>, DbError> {
        Ok(self
            .tables
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .cloned()
            .collect())
    }
}

impl Warehouse for MemoryWarehouse {
    fn replace_table(&self, table: &Table) -> Result<u64, DbError> {
        validate_identifier(&table.name)?;
        if let Some(row) = table.rows.iter().find(|r| r.len() != table.columns.len()) {
            return Err(DbError::Conversion {
                message: format!(
                    "row has {} cells but table {} has {} columns",
                    row.len(),
                    table.name,
                    table.columns.len()
                ),
            });
        }

        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        tables.insert(table.name.clone(), table.clone());
        Ok(table.rows.len() as u64)
    }

    fn read_table(&self, name: &str) -> Result<Option<Table>, DbError> {
        Ok(self
            .tables
            .read()
            .map_err(|_| poisoned())?
            .get(name)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::table::{Cell, Column};

    #[test]
    fn counts_repeated_keys_once() {
        let store = MemoryIncidentStore::new();
        store
            .upsert_batch(&[json!({"report_number": "A", "v": 0})])
            .unwrap();

        let counts = store
            .upsert_batch(&[
                json!({"report_number": "A", "v": 1}),
                json!({"report_number": "B", "v": 1}),
                json!({"report_number": "B", "v": 2}),
                json!({"v": 3}),
            ])
            .unwrap();

        assert_eq!(
            counts,
            UpsertCounts {
                inserted: 1,
                replaced: 1,
                skipped: 1,
            }
        );
        let all = store.load_all().unwrap();
        assert_eq!(all, vec![
            json!({"report_number": "A", "v": 1}),
            json!({"report_number": "B", "v": 2}),
        ]);
    }

    #[test]
    fn max_offense_date_ignores_unparseable_values() {
        let store = MemoryIncidentStore::new();
        store
            .upsert_batch(&[
                json!({"report_number": "A", "offense_date": "2025-02-01T00:00:00.000"}),
                json!({"report_number": "B", "offense_date": "zzz"}),
                json!({"report_number": "C"}),
            ])
            .unwrap();

        let max = store.max_offense_date().unwrap().unwrap();
        assert_eq!(max.to_string(), "2025-02-01 00:00:00");
    }

    #[test]
    fn warehouse_replaces_by_name() {
        let wh = MemoryWarehouse::new();
        let mut t = Table::new("t", vec![Column::text("a")]).unwrap();
        t.push_row(vec![Cell::Text("x".into())]).unwrap();

        assert_eq!(wh.replace_table(&t).unwrap(), 1);
        t.rows.clear();
        assert_eq!(wh.replace_table(&t).unwrap(), 0);

        assert!(wh.read_table("t").unwrap().unwrap().is_empty());
        assert!(wh.read_table("missing").unwrap().is_none());
        assert_eq!(wh.table_names().unwrap(), vec!["t".to_string()]);
    }
}
