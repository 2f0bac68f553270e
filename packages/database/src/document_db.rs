//! `DuckDB`-backed document store.
//!
//! Incident documents are kept as JSON text keyed by `report_number`, with
//! `offense_date` extracted into its own column for checkpoint queries.
//! The same file holds the neighborhood boundary collection.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::NaiveDateTime;
use crime_pipeline_incident_models::{IncidentColumn, natural_key};
use crime_pipeline_neighborhood_models::NormalizedBoundary;
use duckdb::Connection;

use crate::{BoundaryStore, DbError, IncidentStore, UpsertCounts, with_transaction};

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 1_000;

/// A document store backed by a single `DuckDB` connection.
pub struct DocumentDb {
    conn: Connection,
}

impl DocumentDb {
    /// Opens (or creates) the document store at `path` and ensures the
    /// schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        crate::paths::ensure_parent(path)?;

        let conn = Connection::open(path)?;
        conn.execute_batch("SET threads = 4; SET memory_limit = '512MB';")?;

        Self::with_connection(conn)
    }

    /// Opens a transient in-memory document store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Closes the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if `DuckDB` fails to close cleanly.
    pub fn close(self) -> Result<(), DbError> {
        self.conn.close().map_err(|(_, e)| DbError::DuckDb(e))
    }

    fn existing_keys(&self, keys: &[&str]) -> Result<BTreeSet<String>, DbError> {
        let mut existing = BTreeSet::new();

        for chunk in keys.chunks(CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql =
                format!("SELECT report_number FROM incidents WHERE report_number IN ({placeholders})");
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(duckdb::params_from_iter(chunk.iter().copied()))?;

            while let Some(row) = rows.next()? {
                existing.insert(row.get::<_, String>(0)?);
            }
        }

        Ok(existing)
    }
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS incidents (
            report_number TEXT NOT NULL PRIMARY KEY,
            offense_date TEXT,
            document TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS neighborhoods (
            position INTEGER NOT NULL,
            code TEXT NOT NULL,
            name TEXT NOT NULL,
            crs TEXT NOT NULL,
            boundary_geojson TEXT NOT NULL
        );",
    )?;

    Ok(())
}

fn insert_documents(
    conn: &Connection,
    documents: &[(&str, &serde_json::Value)],
) -> Result<(), DbError> {
    for chunk in documents.chunks(CHUNK_SIZE) {
        let mut sql = String::from("INSERT INTO incidents (report_number, offense_date, document) VALUES ");
        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?)");
        }
        sql.push_str(
            " ON CONFLICT (report_number) DO UPDATE SET
                offense_date = EXCLUDED.offense_date,
                document = EXCLUDED.document",
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for (key, document) in chunk {
            let offense_date = document
                .get(IncidentColumn::OffenseDate.as_ref())
                .and_then(serde_json::Value::as_str);

            stmt.raw_bind_parameter(param_idx, *key)?;
            stmt.raw_bind_parameter(param_idx + 1, offense_date)?;
            stmt.raw_bind_parameter(param_idx + 2, serde_json::to_string(document)?)?;

            param_idx += 3;
        }

        stmt.raw_execute()?;
    }

    Ok(())
}

impl IncidentStore for DocumentDb {
    fn max_offense_date(&self) -> Result<Option<NaiveDateTime>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT MAX(TRY_CAST(offense_date AS TIMESTAMP))::TEXT FROM incidents",
        )?;
        let result: Option<String> = stmt.query_row([], |row| row.get(0))?;

        Ok(result.and_then(|s| {
            let parsed = crate::timestamp::parse_timestamp(&s);
            if parsed.is_none() {
                log::warn!("Failed to parse max offense_date: {s:?}");
            }
            parsed
        }))
    }

    fn upsert_batch(&self, documents: &[serde_json::Value]) -> Result<UpsertCounts, DbError> {
        let mut counts = UpsertCounts::default();

        // Keep the last occurrence of each key within the batch
        let mut last_seen: BTreeMap<&str, usize> = BTreeMap::new();
        for (i, document) in documents.iter().enumerate() {
            match natural_key(document) {
                Some(key) => {
                    last_seen.insert(key, i);
                }
                None => counts.skipped += 1,
            }
        }

        if last_seen.is_empty() {
            return Ok(counts);
        }

        let keyed: Vec<(&str, &serde_json::Value)> = documents
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                natural_key(doc)
                    .filter(|key| last_seen.get(key) == Some(&i))
                    .map(|key| (key, doc))
            })
            .collect();

        let keys: Vec<&str> = keyed.iter().map(|(key, _)| *key).collect();
        let existing = self.existing_keys(&keys)?;

        with_transaction(&self.conn, |conn| insert_documents(conn, &keyed))?;

        for key in keys {
            if existing.contains(key) {
                counts.replaced += 1;
            } else {
                counts.inserted += 1;
            }
        }

        log::debug!(
            "Upserted batch of {}: {} inserted, {} replaced, {} skipped",
            documents.len(),
            counts.inserted,
            counts.replaced,
            counts.skipped,
        );

        Ok(counts)
    }

    fn load_all(&self) -> Result<Vec<serde_json::Value>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT document FROM incidents ORDER BY report_number")?;
        let mut rows = stmt.query([])?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            documents.push(serde_json::from_str(&text)?);
        }

        Ok(documents)
    }

    fn count(&self) -> Result<u64, DbError> {
        let mut stmt = self.conn.prepare("SELECT COUNT(*) FROM incidents")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("negative incident count {count}: {e}"),
        })
    }
}

impl BoundaryStore for DocumentDb {
    fn replace_boundaries(&self, boundaries: &[NormalizedBoundary]) -> Result<u64, DbError> {
        with_transaction(&self.conn, |conn| {
            conn.execute_batch("DELETE FROM neighborhoods")?;

            let mut stmt = conn.prepare(
                "INSERT INTO neighborhoods (position, code, name, crs, boundary_geojson)
                 VALUES (?, ?, ?, ?, ?)",
            )?;

            let mut written = 0u64;
            for (position, boundary) in boundaries.iter().enumerate() {
                let position = i64::try_from(position).map_err(|e| DbError::Conversion {
                    message: format!("boundary position out of range: {e}"),
                })?;
                stmt.execute(duckdb::params![
                    position,
                    boundary.code,
                    boundary.name,
                    boundary.crs,
                    boundary.geometry_json,
                ])?;
                written += 1;
            }

            Ok(written)
        })
    }

    fn load_boundaries(&self) -> Result<Vec<NormalizedBoundary>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT code, name, boundary_geojson, crs FROM neighborhoods ORDER BY position",
        )?;
        let mut rows = stmt.query([])?;

        let mut boundaries = Vec::new();
        while let Some(row) = rows.next()? {
            boundaries.push(NormalizedBoundary {
                code: row.get(0)?,
                name: row.get(1)?,
                geometry_json: row.get(2)?,
                crs: row.get(3)?,
            });
        }

        Ok(boundaries)
    }
}
