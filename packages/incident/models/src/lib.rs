#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typed incident records shared across the crime pipeline.
//!
//! Raw API documents are heterogeneous: column names drift between schema
//! versions (`nibrs_offense_code` vs `offense_code`), numbers sometimes
//! arrive as strings, and any field may be missing. [`RawIncident`] is the
//! ingestion-boundary schema that absorbs all of that, with every field
//! modeled as optional text. [`CleanIncident`] is the finalized shape
//! produced by the cleaning pipeline and written to the warehouse.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Field holding the natural key of every incident document.
pub const NATURAL_KEY: &str = "report_number";

/// Bureau-specific token stripped from column names during normalization.
pub const BUREAU_PREFIX: &str = "nibrs";

/// Columns of the incident table, in output order.
///
/// The order is the column order of the warehouse table and the joined CSV
/// artifact consumed by the dashboard, so it must stay stable.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IncidentColumn {
    /// Natural key.
    ReportNumber,
    /// When the incident was reported.
    ReportDateTime,
    /// When the incident occurred.
    OffenseDate,
    /// Person / property / society grouping.
    CrimeAgainstCategory,
    /// Offense sub-category.
    OffenseSubCategory,
    /// Offense category.
    OffenseCategory,
    /// Numeric offense code (kept as text, e.g. `"23H"`).
    OffenseCode,
    /// Description of the offense code.
    OffenseCodeDescription,
    /// Police precinct.
    Precinct,
    /// Precinct sector.
    Sector,
    /// Patrol beat.
    Beat,
    /// Neighborhood name as reported by the bureau.
    Neighborhood,
    /// Longitude (WGS84).
    Longitude,
    /// Latitude (WGS84).
    Latitude,
}

impl IncidentColumn {
    /// Every column, in output order.
    pub const ALL: [Self; 14] = [
        Self::ReportNumber,
        Self::ReportDateTime,
        Self::OffenseDate,
        Self::CrimeAgainstCategory,
        Self::OffenseSubCategory,
        Self::OffenseCategory,
        Self::OffenseCode,
        Self::OffenseCodeDescription,
        Self::Precinct,
        Self::Sector,
        Self::Beat,
        Self::Neighborhood,
        Self::Longitude,
        Self::Latitude,
    ];

    /// Whether the column holds a floating point value once cleaned.
    #[must_use]
    pub const fn is_coordinate(self) -> bool {
        matches!(self, Self::Longitude | Self::Latitude)
    }
}

/// Normalizes a raw column name to the pipeline's naming convention.
///
/// Lowercases, strips the [`BUREAU_PREFIX`] token, replaces spaces with
/// underscores, collapses doubled underscores and trims underscores from
/// both ends. `"NIBRS_Offense_Code"` becomes `"offense_code"`.
#[must_use]
pub fn normalize_column_name(name: &str) -> String {
    let mut normalized = name
        .to_lowercase()
        .replace(BUREAU_PREFIX, "")
        .replace(' ', "_");

    while normalized.contains("__") {
        normalized = normalized.replace("__", "_");
    }

    normalized.trim_matches('_').to_string()
}

/// Returns the natural key of a raw document, if it has a usable one.
///
/// Documents whose key is missing, non-textual or empty cannot be upserted
/// safely and are expected to be dropped by the caller.
#[must_use]
pub fn natural_key(document: &serde_json::Value) -> Option<&str> {
    document
        .get(NATURAL_KEY)
        .and_then(serde_json::Value::as_str)
        .filter(|key| !key.trim().is_empty())
}

/// An incident as it arrives from the API or the document store.
///
/// Every field is optional; the cleaning pipeline decides which rows are
/// usable. Numeric and boolean JSON values are rendered to text so that
/// sentinel comparisons (`"-1.0"`, `"REDACTED"`) behave the same whatever
/// the upstream encoding was.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RawIncident {
    #[serde(default, deserialize_with = "lenient_text")]
    pub report_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub report_date_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub offense_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub crime_against_category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub offense_sub_category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub offense_category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub offense_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub offense_code_description: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub precinct: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sector: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub beat: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub neighborhood: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub longitude: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub latitude: Option<String>,
}

impl RawIncident {
    /// Parses a raw document, normalizing its column names first.
    ///
    /// Unknown columns are ignored. When two raw columns normalize to the
    /// same name, the one appearing later in the document wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object.
    pub fn from_document(document: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let serde_json::Value::Object(fields) = document else {
            return Err(<serde_json::Error as serde::de::Error>::custom(
                "expected a JSON object",
            ));
        };

        let normalized: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| (normalize_column_name(name), value.clone()))
            .collect();

        serde_json::from_value(serde_json::Value::Object(normalized))
    }

    /// Returns the raw text of a column.
    #[must_use]
    pub fn field(&self, column: IncidentColumn) -> Option<&str> {
        let value = match column {
            IncidentColumn::ReportNumber => &self.report_number,
            IncidentColumn::ReportDateTime => &self.report_date_time,
            IncidentColumn::OffenseDate => &self.offense_date,
            IncidentColumn::CrimeAgainstCategory => &self.crime_against_category,
            IncidentColumn::OffenseSubCategory => &self.offense_sub_category,
            IncidentColumn::OffenseCategory => &self.offense_category,
            IncidentColumn::OffenseCode => &self.offense_code,
            IncidentColumn::OffenseCodeDescription => &self.offense_code_description,
            IncidentColumn::Precinct => &self.precinct,
            IncidentColumn::Sector => &self.sector,
            IncidentColumn::Beat => &self.beat,
            IncidentColumn::Neighborhood => &self.neighborhood,
            IncidentColumn::Longitude => &self.longitude,
            IncidentColumn::Latitude => &self.latitude,
        };
        value.as_deref()
    }

    /// Returns the first column with no value, if any.
    #[must_use]
    pub fn first_missing(&self) -> Option<IncidentColumn> {
        IncidentColumn::ALL
            .into_iter()
            .find(|column| self.field(*column).is_none())
    }
}

/// A validated incident, ready for the warehouse and the spatial join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanIncident {
    pub report_number: String,
    pub report_date_time: String,
    /// Canonical ISO-8601 occurrence timestamp.
    pub offense_date: String,
    pub crime_against_category: String,
    pub offense_sub_category: String,
    pub offense_category: String,
    pub offense_code: String,
    pub offense_code_description: String,
    pub precinct: String,
    pub sector: String,
    pub beat: String,
    pub neighborhood: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl CleanIncident {
    /// Returns the text of a non-coordinate column.
    ///
    /// Coordinate columns return `None`; read [`Self::longitude`] and
    /// [`Self::latitude`] directly.
    #[must_use]
    pub fn text(&self, column: IncidentColumn) -> Option<&str> {
        Some(match column {
            IncidentColumn::ReportNumber => &self.report_number,
            IncidentColumn::ReportDateTime => &self.report_date_time,
            IncidentColumn::OffenseDate => &self.offense_date,
            IncidentColumn::CrimeAgainstCategory => &self.crime_against_category,
            IncidentColumn::OffenseSubCategory => &self.offense_sub_category,
            IncidentColumn::OffenseCategory => &self.offense_category,
            IncidentColumn::OffenseCode => &self.offense_code,
            IncidentColumn::OffenseCodeDescription => &self.offense_code_description,
            IncidentColumn::Precinct => &self.precinct,
            IncidentColumn::Sector => &self.sector,
            IncidentColumn::Beat => &self.beat,
            IncidentColumn::Neighborhood => &self.neighborhood,
            IncidentColumn::Longitude | IncidentColumn::Latitude => return None,
        })
    }
}

/// Accepts strings, numbers and booleans as text; `null` becomes `None`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bureau_prefixed_columns() {
        assert_eq!(
            normalize_column_name("NIBRS_Crime_Against_Category"),
            "crime_against_category"
        );
        assert_eq!(normalize_column_name("nibrs_offense_code"), "offense_code");
        assert_eq!(
            normalize_column_name("Offense Sub Category"),
            "offense_sub_category"
        );
        assert_eq!(normalize_column_name("_100__Block  Address_"), "100_block_address");
    }

    #[test]
    fn parses_document_with_drifting_schema() {
        let doc = serde_json::json!({
            "_id": "65f0c0ffee",
            "Report_Number": "2025-000123",
            "NIBRS_Crime_Against_Category": "PROPERTY",
            "nibrs_offense_code": "23H",
            "latitude": 47.61,
            "longitude": "-122.33",
        });

        let raw = RawIncident::from_document(&doc).unwrap();
        assert_eq!(raw.report_number.as_deref(), Some("2025-000123"));
        assert_eq!(raw.crime_against_category.as_deref(), Some("PROPERTY"));
        assert_eq!(raw.offense_code.as_deref(), Some("23H"));
        assert_eq!(raw.latitude.as_deref(), Some("47.61"));
        assert_eq!(raw.longitude.as_deref(), Some("-122.33"));
        assert_eq!(raw.precinct, None);
    }

    #[test]
    fn null_fields_are_missing() {
        let doc = serde_json::json!({"report_number": "1", "beat": null});
        let raw = RawIncident::from_document(&doc).unwrap();
        assert_eq!(raw.beat, None);
        assert_eq!(raw.first_missing(), Some(IncidentColumn::ReportDateTime));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(RawIncident::from_document(&serde_json::json!([1, 2])).is_err());
        assert!(RawIncident::from_document(&serde_json::json!(["A-1", "x"])).is_err());
        assert!(RawIncident::from_document(&serde_json::json!("A-1")).is_err());
        assert!(RawIncident::from_document(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn natural_key_requires_non_empty_text() {
        assert_eq!(
            natural_key(&serde_json::json!({"report_number": "A-1"})),
            Some("A-1")
        );
        assert_eq!(natural_key(&serde_json::json!({"report_number": " "})), None);
        assert_eq!(natural_key(&serde_json::json!({"report_number": 12})), None);
        assert_eq!(natural_key(&serde_json::json!({"offense_date": "x"})), None);
    }

    #[test]
    fn column_names_match_normalized_convention() {
        for column in IncidentColumn::ALL {
            assert_eq!(normalize_column_name(column.as_ref()), column.as_ref());
        }
        assert_eq!(IncidentColumn::OffenseDate.to_string(), "offense_date");
    }
}
