#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cleaning pipeline for raw incident documents.
//!
//! Turns the heterogeneous documents held in the document store into
//! [`CleanIncident`] rows. The stages run in a fixed order, each removing
//! the rows it rejects:
//!
//! 1. column names normalized, documents parsed into [`RawIncident`]
//! 2. exact duplicates removed (first occurrence kept)
//! 3. `-` markers in `crime_against_category` or `precinct`
//! 4. redacted latitude markers, then unparseable coordinates
//! 5. rows with any missing column
//! 6. `NOT_A_CRIME` rows
//! 7. `(0, 0)` coordinates
//! 8. invalid `offense_date` values
//!
//! Rows are dropped silently; [`CleanReport`] carries the aggregate
//! counts.

pub mod timestamp;

use std::collections::{BTreeMap, BTreeSet};

use crime_pipeline_incident_models::{CleanIncident, RawIncident};
use serde::{Deserialize, Serialize};

/// Marker used by the bureau for "no value".
const DASH_MARKER: &str = "-";

/// Latitude values that stand for a withheld location.
const REDACTED_LATITUDES: &[&str] = &["REDACTED", "-1.0"];

/// Category of rows that are not offenses.
const NOT_A_CRIME: &str = "NOT_A_CRIME";

/// Distribution key for rows with no category.
const MISSING_CATEGORY: &str = "(missing)";

/// Aggregate outcome of one cleaning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    /// Documents handed to the pipeline.
    pub rows_in: u64,
    /// Documents that were not JSON objects.
    pub malformed_documents: u64,
    /// Exact duplicate rows removed.
    pub duplicates_removed: u64,
    /// Rows with `-` as category or precinct.
    pub dropped_dash_markers: u64,
    /// Rows with a redacted latitude.
    pub dropped_redacted_latitude: u64,
    /// Rows whose coordinates are present but not finite numbers.
    pub dropped_unparseable_coordinates: u64,
    /// Rows missing at least one column.
    pub dropped_missing_values: u64,
    /// Rows categorized as not a crime.
    pub dropped_not_a_crime: u64,
    /// Rows located at `(0, 0)`.
    pub dropped_zero_coordinates: u64,
    /// Rows whose `offense_date` was valid or could be reformatted.
    pub valid_timestamps: u64,
    /// Rows dropped for an uninterpretable `offense_date`.
    pub invalid_timestamps: u64,
    /// Rows that survived every stage.
    pub rows_after_cleaning: u64,
    /// `crime_against_category` counts before marker removal.
    pub category_distribution_before: BTreeMap<String, u64>,
    /// `crime_against_category` counts of the surviving rows.
    pub category_distribution_after: BTreeMap<String, u64>,
}

/// Cleaned rows plus the report describing how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutput {
    pub rows: Vec<CleanIncident>,
    pub report: CleanReport,
}

/// A row whose coordinates have been parsed.
struct Located {
    raw: RawIncident,
    longitude: f64,
    latitude: f64,
}

/// Runs the full cleaning pipeline.
///
/// Deterministic: the same documents in the same order always yield the
/// same rows and report.
#[must_use]
pub fn clean_incidents(documents: &[serde_json::Value]) -> CleanOutput {
    let mut report = CleanReport {
        rows_in: documents.len() as u64,
        ..CleanReport::default()
    };

    let raws = parse_documents(documents, &mut report);
    let raws = remove_duplicates(raws, &mut report);

    report.category_distribution_before =
        distribution(raws.iter().map(|r| r.crime_against_category.as_deref()));

    let raws = drop_dash_markers(raws, &mut report);
    let raws = drop_redacted_latitudes(raws, &mut report);
    let raws = drop_unparseable_coordinates(raws, &mut report);
    let rows = drop_incomplete(raws, &mut report);
    let rows = drop_not_a_crime(rows, &mut report);
    let rows = drop_zero_coordinates(rows, &mut report);
    let rows = canonicalize_offense_dates(rows, &mut report);

    report.rows_after_cleaning = rows.len() as u64;
    report.category_distribution_after =
        distribution(rows.iter().map(|r| Some(r.crime_against_category.as_str())));

    log_report(&report);

    CleanOutput { rows, report }
}

fn parse_documents(documents: &[serde_json::Value], report: &mut CleanReport) -> Vec<RawIncident> {
    documents
        .iter()
        .filter_map(|doc| match RawIncident::from_document(doc) {
            Ok(raw) => Some(raw),
            Err(e) => {
                log::debug!("Skipping malformed document: {e}");
                report.malformed_documents += 1;
                None
            }
        })
        .collect()
}

fn remove_duplicates(raws: Vec<RawIncident>, report: &mut CleanReport) -> Vec<RawIncident> {
    let before = raws.len();
    let mut seen = BTreeSet::new();
    let unique: Vec<RawIncident> = raws.into_iter().filter(|r| seen.insert(r.clone())).collect();
    report.duplicates_removed = (before - unique.len()) as u64;
    unique
}

fn drop_dash_markers(raws: Vec<RawIncident>, report: &mut CleanReport) -> Vec<RawIncident> {
    retain_counted(raws, &mut report.dropped_dash_markers, |r| {
        r.crime_against_category.as_deref() != Some(DASH_MARKER)
            && r.precinct.as_deref() != Some(DASH_MARKER)
    })
}

fn drop_redacted_latitudes(raws: Vec<RawIncident>, report: &mut CleanReport) -> Vec<RawIncident> {
    retain_counted(raws, &mut report.dropped_redacted_latitude, |r| {
        r.latitude
            .as_deref()
            .is_none_or(|lat| !REDACTED_LATITUDES.contains(&lat))
    })
}

/// Drops rows whose coordinates are present but unusable. Missing
/// coordinates are left for the completeness check.
fn drop_unparseable_coordinates(
    raws: Vec<RawIncident>,
    report: &mut CleanReport,
) -> Vec<RawIncident> {
    retain_counted(raws, &mut report.dropped_unparseable_coordinates, |r| {
        [&r.longitude, &r.latitude]
            .into_iter()
            .flatten()
            .all(|value| parse_coordinate(value).is_some())
    })
}

fn drop_incomplete(raws: Vec<RawIncident>, report: &mut CleanReport) -> Vec<Located> {
    let before = raws.len();
    let rows: Vec<Located> = raws
        .into_iter()
        .filter(|r| r.first_missing().is_none())
        .filter_map(|raw| {
            let longitude = raw.longitude.as_deref().and_then(parse_coordinate)?;
            let latitude = raw.latitude.as_deref().and_then(parse_coordinate)?;
            Some(Located {
                raw,
                longitude,
                latitude,
            })
        })
        .collect();
    report.dropped_missing_values = (before - rows.len()) as u64;
    rows
}

fn drop_not_a_crime(rows: Vec<Located>, report: &mut CleanReport) -> Vec<Located> {
    retain_counted(rows, &mut report.dropped_not_a_crime, |row| {
        row.raw.crime_against_category.as_deref() != Some(NOT_A_CRIME)
    })
}

fn drop_zero_coordinates(rows: Vec<Located>, report: &mut CleanReport) -> Vec<Located> {
    retain_counted(rows, &mut report.dropped_zero_coordinates, |row| {
        !(row.longitude == 0.0 && row.latitude == 0.0)
    })
}

fn canonicalize_offense_dates(rows: Vec<Located>, report: &mut CleanReport) -> Vec<CleanIncident> {
    let mut clean = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(offense_date) = row
            .raw
            .offense_date
            .as_deref()
            .and_then(timestamp::canonicalize)
        else {
            report.invalid_timestamps += 1;
            continue;
        };
        report.valid_timestamps += 1;

        if let Some(incident) = finalize(row, offense_date) {
            clean.push(incident);
        }
    }

    clean
}

/// Builds the clean row. Every text column is known to be present.
fn finalize(row: Located, offense_date: String) -> Option<CleanIncident> {
    let raw = row.raw;
    Some(CleanIncident {
        report_number: raw.report_number?,
        report_date_time: raw.report_date_time?,
        offense_date,
        crime_against_category: raw.crime_against_category?,
        offense_sub_category: raw.offense_sub_category?,
        offense_category: raw.offense_category?,
        offense_code: raw.offense_code?,
        offense_code_description: raw.offense_code_description?,
        precinct: raw.precinct?,
        sector: raw.sector?,
        beat: raw.beat?,
        neighborhood: raw.neighborhood?,
        longitude: row.longitude,
        latitude: row.latitude,
    })
}

/// Parses a coordinate, rejecting non-finite values.
fn parse_coordinate(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn retain_counted<T>(rows: Vec<T>, dropped: &mut u64, keep: impl Fn(&T) -> bool) -> Vec<T> {
    let before = rows.len();
    let kept: Vec<T> = rows.into_iter().filter(|row| keep(row)).collect();
    *dropped += (before - kept.len()) as u64;
    kept
}

fn distribution<'a>(categories: impl Iterator<Item = Option<&'a str>>) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for category in categories {
        *counts
            .entry(category.unwrap_or(MISSING_CATEGORY).to_string())
            .or_insert(0) += 1;
    }
    counts
}

fn log_report(report: &CleanReport) {
    log::info!(
        "Cleaned {} documents into {} rows",
        report.rows_in,
        report.rows_after_cleaning
    );
    log::info!(
        "Dropped: {} malformed, {} duplicates, {} dash markers, {} redacted, \
         {} bad coordinates, {} incomplete, {} not a crime, {} at (0, 0)",
        report.malformed_documents,
        report.duplicates_removed,
        report.dropped_dash_markers,
        report.dropped_redacted_latitude,
        report.dropped_unparseable_coordinates,
        report.dropped_missing_values,
        report.dropped_not_a_crime,
        report.dropped_zero_coordinates,
    );
    log::info!(
        "Timestamps: {} valid, {} invalid",
        report.valid_timestamps,
        report.invalid_timestamps
    );
    log::info!(
        "Category distribution before: {:?}",
        report.category_distribution_before
    );
    log::info!(
        "Category distribution after: {:?}",
        report.category_distribution_after
    );
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn doc(key: &str) -> Value {
        json!({
            "report_number": key,
            "report_date_time": "2025-03-01T10:20:00.000",
            "offense_date": "2025-03-01 10:15:30",
            "nibrs_crime_against_category": "PROPERTY",
            "offense_sub_category": "LARCENY-THEFT",
            "offense_category": "LARCENY-THEFT",
            "nibrs_offense_code": "23H",
            "nibrs_offense_code_description": "All Other Larceny",
            "precinct": "East",
            "sector": "C",
            "beat": "C2",
            "neighborhood": "CAPITOL HILL",
            "longitude": "-122.32",
            "latitude": "47.62",
        })
    }

    fn with(mut document: Value, field: &str, value: Value) -> Value {
        document[field] = value;
        document
    }

    #[test]
    fn three_record_example() {
        let documents = vec![
            with(doc("A"), "latitude", json!("REDACTED")),
            with(doc("B"), "nibrs_crime_against_category", json!("-")),
            doc("C"),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.rows.len(), 1);
        let row = &output.rows[0];
        assert_eq!(row.report_number, "C");
        assert_eq!(row.offense_date, "2025-03-01T10:15:30.000");
        assert_eq!(row.crime_against_category, "PROPERTY");
        assert_eq!(row.offense_code, "23H");
        assert!((row.longitude - -122.32).abs() < f64::EPSILON);

        let report = &output.report;
        assert_eq!(report.rows_in, 3);
        assert_eq!(report.dropped_dash_markers, 1);
        assert_eq!(report.dropped_redacted_latitude, 1);
        assert_eq!(report.rows_after_cleaning, 1);
        assert_eq!(report.category_distribution_before["PROPERTY"], 2);
        assert_eq!(report.category_distribution_before["-"], 1);
        assert_eq!(report.category_distribution_after["PROPERTY"], 1);
        assert!(!report.category_distribution_after.contains_key("-"));
    }

    #[test]
    fn drops_not_a_crime() {
        let documents = vec![
            doc("A"),
            with(doc("B"), "nibrs_crime_against_category", json!("NOT_A_CRIME")),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.report.dropped_not_a_crime, 1);
        assert_eq!(output.report.category_distribution_before["NOT_A_CRIME"], 1);
        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0].report_number, "A");
    }

    #[test]
    fn removes_exact_duplicates_only() {
        let documents = vec![
            doc("A"),
            doc("A"),
            with(doc("A"), "beat", json!("C3")),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.report.duplicates_removed, 1);
        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.rows[0].beat, "C2");
        assert_eq!(output.rows[1].beat, "C3");
    }

    #[test]
    fn drops_dash_markers() {
        let documents = vec![
            with(doc("A"), "nibrs_crime_against_category", json!("-")),
            with(doc("B"), "precinct", json!("-")),
            doc("C"),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.report.dropped_dash_markers, 2);
        assert_eq!(output.report.category_distribution_before["-"], 1);
        assert_eq!(output.rows.len(), 1);
    }

    #[test]
    fn coordinate_filter() {
        let documents = vec![
            with(doc("A"), "latitude", json!("-1.0")),
            with(doc("B"), "longitude", json!("not a number")),
            with(doc("C"), "latitude", json!("NaN")),
            with(with(doc("D"), "latitude", json!("0.0")), "longitude", json!(0)),
            with(doc("E"), "latitude", json!(0.0)),
            with(doc("F"), "latitude", json!(47.6)),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.report.dropped_redacted_latitude, 1);
        assert_eq!(output.report.dropped_unparseable_coordinates, 2);
        assert_eq!(output.report.dropped_zero_coordinates, 1);
        let keys: Vec<&str> = output.rows.iter().map(|r| r.report_number.as_str()).collect();
        assert_eq!(keys, vec!["E", "F"]);
        for row in &output.rows {
            assert!(row.latitude.is_finite() && row.longitude.is_finite());
            assert!(!(row.latitude == 0.0 && row.longitude == 0.0));
        }
    }

    #[test]
    fn drops_rows_with_missing_values() {
        let mut missing_beat = doc("A");
        missing_beat.as_object_mut().unwrap().remove("beat");
        let documents = vec![
            missing_beat,
            with(doc("B"), "sector", Value::Null),
            with(doc("C"), "latitude", Value::Null),
            doc("D"),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.report.dropped_missing_values, 3);
        assert_eq!(output.rows.len(), 1);
    }

    #[test]
    fn counts_timestamp_validity() {
        let documents = vec![
            with(doc("A"), "offense_date", json!("2025-03-01T10:15:30.000")),
            with(doc("B"), "offense_date", json!("2025-03-01 10:15:30")),
            with(doc("C"), "offense_date", json!("not-a-date")),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.report.valid_timestamps, 2);
        assert_eq!(output.report.invalid_timestamps, 1);
        assert_eq!(output.rows[0].offense_date, "2025-03-01T10:15:30.000");
        assert_eq!(output.rows[1].offense_date, "2025-03-01T10:15:30.000");
    }

    #[test]
    fn drops_impossible_calendar_dates() {
        let documents = vec![
            with(doc("A"), "offense_date", json!("2025-02-30T10:15:30.000")),
            doc("B"),
        ];

        let output = clean_incidents(&documents);

        assert_eq!(output.report.valid_timestamps, 1);
        assert_eq!(output.report.invalid_timestamps, 1);
        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0].report_number, "B");
    }

    #[test]
    fn counts_malformed_documents() {
        let output = clean_incidents(&[json!("just a string"), json!([1, 2]), doc("A")]);

        assert_eq!(output.report.malformed_documents, 2);
        assert_eq!(output.rows.len(), 1);
    }

    #[test]
    fn cleaning_is_deterministic() {
        let documents = vec![
            doc("A"),
            with(doc("B"), "precinct", json!("-")),
            with(doc("C"), "offense_date", json!("bad")),
            doc("D"),
        ];

        assert_eq!(clean_incidents(&documents), clean_incidents(&documents));
    }

    #[test]
    fn clean_rows_satisfy_invariants() {
        let documents = vec![
            doc("A"),
            with(doc("B"), "nibrs_crime_against_category", json!("NOT_A_CRIME")),
            with(doc("C"), "precinct", json!("-")),
        ];

        for row in clean_incidents(&documents).rows {
            assert_ne!(row.crime_against_category, "-");
            assert_ne!(row.crime_against_category, "NOT_A_CRIME");
            assert_ne!(row.precinct, "-");
            assert!(
                chrono::NaiveDateTime::parse_from_str(&row.offense_date, "%Y-%m-%dT%H:%M:%S%.f")
                    .is_ok()
            );
        }
    }
}
