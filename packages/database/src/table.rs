//! Backend-neutral tabular data for warehouse writes.

use strum_macros::{AsRefStr, Display, EnumString};

use crate::DbError;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ColumnKind {
    /// Variable-length text.
    Text,
    /// 64-bit floating point.
    Double,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name (a plain SQL identifier).
    pub name: String,
    /// Storage type.
    pub kind: ColumnKind,
}

impl Column {
    /// Creates a text column.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
        }
    }

    /// Creates a double column.
    #[must_use]
    pub fn double(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Double,
        }
    }
}

/// One value of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Text value.
    Text(String),
    /// Floating point value.
    Double(f64),
}

impl Cell {
    /// Returns the text value, if this is a text cell.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the cell for a delimited text file (`Null` is empty).
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Double(v) => v.to_string(),
        }
    }

    const fn fits(&self, kind: ColumnKind) -> bool {
        matches!(
            (self, kind),
            (Self::Null, _) | (Self::Text(_), ColumnKind::Text) | (Self::Double(_), ColumnKind::Double)
        )
    }
}

/// A named table: schema plus rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name (a plain SQL identifier).
    pub name: String,
    /// Columns, in order.
    pub columns: Vec<Column>,
    /// Rows; every row has exactly one cell per column.
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Creates an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conversion`] if the table or a column name is not
    /// a plain identifier, or a column name repeats.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, DbError> {
        let name = name.into();
        validate_identifier(&name)?;
        for (i, column) in columns.iter().enumerate() {
            validate_identifier(&column.name)?;
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DbError::Conversion {
                    message: format!("duplicate column {:?} in table {name}", column.name),
                });
            }
        }

        Ok(Self {
            name,
            columns,
            rows: Vec::new(),
        })
    }

    /// Appends a row after checking its arity and cell types.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conversion`] if the row does not match the schema.
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), DbError> {
        if row.len() != self.columns.len() {
            return Err(DbError::Conversion {
                message: format!(
                    "row has {} cells but table {} has {} columns",
                    row.len(),
                    self.name,
                    self.columns.len()
                ),
            });
        }

        if let Some((cell, column)) = row
            .iter()
            .zip(&self.columns)
            .find(|(cell, column)| !cell.fits(column.kind))
        {
            return Err(DbError::Conversion {
                message: format!(
                    "cell {cell:?} does not fit {} column {}",
                    column.kind, column.name
                ),
            });
        }

        self.rows.push(row);
        Ok(())
    }

    /// Returns the index of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Ensures `name` can be interpolated into SQL as a bare identifier.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] unless `name` is non-empty, starts with
/// a letter or underscore, and contains only ASCII alphanumerics and
/// underscores.
pub fn validate_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(DbError::Conversion {
            message: format!("invalid identifier {name:?}"),
        })
    }
}
