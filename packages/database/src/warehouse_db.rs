//! `DuckDB`-backed relational warehouse.
//!
//! Tables are written with full-replace semantics: the old table is
//! dropped and recreated inside one transaction, so readers either see the
//! previous version or the complete new one.

use std::path::Path;

use duckdb::Connection;
use duckdb::types::{ToSqlOutput, Value};

use crate::table::{Cell, Column, ColumnKind, Table, validate_identifier};
use crate::{DbError, Warehouse, with_transaction};

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 1_000;

impl duckdb::ToSql for Cell {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Text(s) => ToSqlOutput::Owned(Value::Text(s.clone())),
            Self::Double(v) => ToSqlOutput::Owned(Value::Double(*v)),
        })
    }
}

/// A warehouse backed by a single `DuckDB` connection.
pub struct WarehouseDb {
    conn: Connection,
}

impl WarehouseDb {
    /// Opens (or creates) the warehouse at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        crate::paths::ensure_parent(path)?;

        let conn = Connection::open(path)?;
        conn.execute_batch("SET threads = 4; SET memory_limit = '512MB';")?;

        Ok(Self { conn })
    }

    /// Opens a transient in-memory warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Closes the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if `DuckDB` fails to close cleanly.
    pub fn close(self) -> Result<(), DbError> {
        self.conn.close().map_err(|(_, e)| DbError::DuckDb(e))
    }

    fn columns_of(&self, name: &str) -> Result<Vec<Column>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT column_name, data_type FROM information_schema.columns
             WHERE table_schema = 'main' AND table_name = ?
             ORDER BY ordinal_position",
        )?;
        let mut rows = stmt.query([name])?;

        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            let column_name: String = row.get(0)?;
            let data_type: String = row.get(1)?;
            let kind = match data_type.as_str() {
                "DOUBLE" | "FLOAT" | "REAL" => ColumnKind::Double,
                _ => ColumnKind::Text,
            };
            columns.push(Column {
                name: column_name,
                kind,
            });
        }

        Ok(columns)
    }
}

fn create_table_sql(table: &Table) -> String {
    let columns = table
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.kind))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "DROP TABLE IF EXISTS {name}; CREATE TABLE {name} ({columns});",
        name = table.name
    )
}

fn insert_rows(conn: &Connection, table: &Table) -> Result<u64, DbError> {
    let width = table.columns.len();
    let column_list = table
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let row_placeholders = format!("({})", vec!["?"; width].join(", "));

    let mut written = 0u64;

    for chunk in table.rows.chunks(CHUNK_SIZE) {
        let mut sql = format!("INSERT INTO {} ({column_list}) VALUES ", table.name);
        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&row_placeholders);
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for row in chunk {
            if row.len() != width {
                return Err(DbError::Conversion {
                    message: format!(
                        "row has {} cells but table {} has {width} columns",
                        row.len(),
                        table.name
                    ),
                });
            }
            for cell in row {
                stmt.raw_bind_parameter(param_idx, cell)?;
                param_idx += 1;
            }
        }

        let rows = stmt.raw_execute()?;
        written += u64::try_from(rows).unwrap_or(0);
    }

    Ok(written)
}

impl Warehouse for WarehouseDb {
    fn replace_table(&self, table: &Table) -> Result<u64, DbError> {
        validate_identifier(&table.name)?;
        for column in &table.columns {
            validate_identifier(&column.name)?;
        }
        if table.columns.is_empty() {
            return Err(DbError::Conversion {
                message: format!("table {} has no columns", table.name),
            });
        }

        let written = with_transaction(&self.conn, |conn| {
            conn.execute_batch(&create_table_sql(table))?;
            insert_rows(conn, table)
        })?;

        log::info!("Replaced warehouse table {} ({written} rows)", table.name);

        Ok(written)
    }

    fn read_table(&self, name: &str) -> Result<Option<Table>, DbError> {
        validate_identifier(name)?;

        let columns = self.columns_of(name)?;
        if columns.is_empty() {
            return Ok(None);
        }

        let column_list = columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {column_list} FROM {name}"))?;
        let mut rows = stmt.query([])?;

        let mut table = Table::new(name, columns)?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(table.columns.len());
            for (i, column) in table.columns.iter().enumerate() {
                let cell = match column.kind {
                    ColumnKind::Text => row
                        .get::<_, Option<String>>(i)?
                        .map_or(Cell::Null, Cell::Text),
                    ColumnKind::Double => row
                        .get::<_, Option<f64>>(i)?
                        .map_or(Cell::Null, Cell::Double),
                };
                cells.push(cell);
            }
            table.rows.push(cells);
        }

        Ok(Some(table))
    }
}
