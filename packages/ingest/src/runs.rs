//! The pipeline's runs: daily (ingest + clean) and weekly (boundaries +
//! join), plus each of their steps on its own.
//!
//! Every run takes its stores as arguments and returns a serializable
//! report. Nothing here opens or closes a store.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use crime_pipeline_clean::{CleanReport, clean_incidents};
use crime_pipeline_database::{BoundaryStore, IncidentStore, Warehouse};
use crime_pipeline_ingest_models::{BoundaryConfig, IngestOutcome, OutputConfig, PipelineConfig};
use crime_pipeline_neighborhood::ingest::ingest_boundary_file;
use crime_pipeline_neighborhood_models::WGS84;
use crime_pipeline_source::PageSource;
use crime_pipeline_source::pacing::Pacer;
use crime_pipeline_source::progress::ProgressCallback;
use crime_pipeline_spatial::NeighborhoodIndex;
use crime_pipeline_spatial::join::join_incidents;
use serde::Serialize;

use crate::checkpoint::{Clock, FetchPlan, resolve_plan};
use crate::export::write_csv;
use crate::fetch::run_ingest;
use crate::tables::{clean_table, incidents_from_table, joined_table};
use crate::{IngestError, JoinError};

/// Outcome of cleaning the document store into the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanStepReport {
    /// Warehouse table that was replaced.
    pub table: String,
    /// Rows written to it.
    pub rows_written: u64,
    pub clean: CleanReport,
}

/// Outcome of a daily run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyReport {
    pub ingest: IngestOutcome,
    pub clean: CleanStepReport,
}

/// Outcome of loading the boundary reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundaryLoadReport {
    pub path: PathBuf,
    /// Neighborhoods now in the store.
    pub stored: u64,
    /// Features left out during normalization.
    pub skipped: u64,
    pub declared_crs: Option<String>,
}

/// Outcome of the spatial join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinReport {
    /// Joined rows written (every cleaned incident).
    pub rows: u64,
    /// Rows that fell inside some neighborhood.
    pub matched: u64,
    /// Neighborhoods in the spatial index.
    pub neighborhoods: u64,
    /// Stored boundaries left out of the index because their geometry
    /// did not parse.
    pub skipped_boundaries: u64,
    /// Coordinate reference system of the output.
    pub crs: String,
    pub table: String,
    pub csv_path: PathBuf,
}

/// Outcome of a weekly run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyReport {
    pub boundaries: BoundaryLoadReport,
    pub join: JoinReport,
}

/// The next fetch an ingestion would perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckpointReport {
    UpToDate {
        last_ingested: NaiveDate,
    },
    Pending {
        start: NaiveDate,
        end: NaiveDate,
        days: u64,
    },
}

/// Describes the next fetch without performing it.
///
/// # Errors
///
/// Returns [`IngestError::Database`] if the checkpoint query fails.
pub fn run_checkpoint(
    config: &PipelineConfig,
    store: &dyn IncidentStore,
    clock: &dyn Clock,
) -> Result<CheckpointReport, IngestError> {
    Ok(match resolve_plan(store, clock, config.ingest.epoch)? {
        FetchPlan::UpToDate { last_ingested } => CheckpointReport::UpToDate { last_ingested },
        FetchPlan::Fetch(window) => CheckpointReport::Pending {
            start: window.start,
            end: window.end,
            days: window.len_days(),
        },
    })
}

/// Loads every stored document, cleans it and replaces the clean table.
///
/// # Errors
///
/// Returns [`IngestError`] if reading the store or writing the warehouse
/// fails.
pub fn run_clean(
    output: &OutputConfig,
    store: &dyn IncidentStore,
    warehouse: &dyn Warehouse,
) -> Result<CleanStepReport, IngestError> {
    let documents = store.load_all()?;
    log::info!("Cleaning {} stored documents", documents.len());

    let cleaned = clean_incidents(&documents);
    let table = clean_table(&output.clean_table, &cleaned.rows)?;
    let rows_written = warehouse.replace_table(&table)?;

    Ok(CleanStepReport {
        table: output.clean_table.clone(),
        rows_written,
        clean: cleaned.report,
    })
}

/// Daily run: incremental ingest followed by a full clean.
///
/// The clean step runs even when ingestion finds nothing new.
///
/// # Errors
///
/// Returns [`IngestError`] from whichever step failed. A failed fetch
/// skips the clean step.
pub async fn run_daily(
    config: &PipelineConfig,
    source: &dyn PageSource,
    pacer: &dyn Pacer,
    clock: &dyn Clock,
    store: &dyn IncidentStore,
    warehouse: &dyn Warehouse,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<DailyReport, IngestError> {
    log::info!("Daily run: ingest");
    let ingest = run_ingest(source, pacer, clock, &config.ingest, store, progress).await?;

    log::info!("Daily run: clean");
    let clean = run_clean(&config.output, store, warehouse)?;

    log::info!(
        "Daily run complete: {} rows in {}",
        clean.rows_written,
        clean.table
    );

    Ok(DailyReport { ingest, clean })
}

/// Replaces the stored boundary collection with the reference file.
///
/// # Errors
///
/// Returns [`IngestError::Neighborhood`] if the file cannot be loaded or
/// the store write fails.
pub fn run_boundaries(
    boundaries: &BoundaryConfig,
    store: &dyn BoundaryStore,
) -> Result<BoundaryLoadReport, IngestError> {
    let summary = ingest_boundary_file(store, &boundaries.path, &boundaries.fields)?;

    Ok(BoundaryLoadReport {
        path: boundaries.path.clone(),
        stored: summary.stored,
        skipped: summary.skipped,
        declared_crs: summary.declared_crs,
    })
}

/// Joins the clean table against the stored boundaries and writes the
/// joined table and the CSV artifact.
///
/// # Errors
///
/// Returns [`JoinError::MissingReferenceData`] if no usable boundary is
/// stored, [`JoinError::MissingTable`] if the clean table does not exist,
/// and other [`IngestError`]s for storage or file failures.
pub fn run_join(
    output: &OutputConfig,
    store: &dyn BoundaryStore,
    warehouse: &dyn Warehouse,
) -> Result<JoinReport, IngestError> {
    let boundaries = store.load_boundaries()?;
    if boundaries.is_empty() {
        return Err(JoinError::MissingReferenceData {
            what: "neighborhood boundaries".to_string(),
        }
        .into());
    }

    let index = NeighborhoodIndex::build(&boundaries);
    if index.is_empty() {
        return Err(JoinError::MissingReferenceData {
            what: format!(
                "usable neighborhood geometry ({} stored, none parsed)",
                boundaries.len()
            ),
        }
        .into());
    }

    let clean = warehouse
        .read_table(&output.clean_table)?
        .ok_or_else(|| JoinError::MissingTable {
            table: output.clean_table.clone(),
        })?;
    let incidents = incidents_from_table(&clean)?;

    let joined = join_incidents(&index, incidents);
    let table = joined_table(&output.joined_table, &joined.rows)?;
    let rows = warehouse.replace_table(&table)?;
    write_csv(&output.csv_path, &table)?;

    log::info!(
        "Join complete: {rows} rows, {} matched, written to {} and {}",
        joined.matched,
        output.joined_table,
        output.csv_path.display()
    );

    Ok(JoinReport {
        rows,
        matched: joined.matched,
        neighborhoods: index.len() as u64,
        skipped_boundaries: index.skipped() as u64,
        crs: WGS84.to_string(),
        table: output.joined_table.clone(),
        csv_path: output.csv_path.clone(),
    })
}

/// Weekly run: reload boundaries, then join.
///
/// # Errors
///
/// Returns [`IngestError`] from whichever step failed. A failed boundary
/// load skips the join.
pub fn run_weekly(
    config: &PipelineConfig,
    store: &dyn BoundaryStore,
    warehouse: &dyn Warehouse,
) -> Result<WeeklyReport, IngestError> {
    log::info!("Weekly run: boundaries");
    let boundaries = run_boundaries(&config.boundaries, store)?;

    log::info!("Weekly run: join");
    let join = run_join(&config.output, store, warehouse)?;

    Ok(WeeklyReport { boundaries, join })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crime_pipeline_database::memory::{
        MemoryBoundaryStore, MemoryIncidentStore, MemoryWarehouse,
    };
    use crime_pipeline_database::table::Cell;
    use crime_pipeline_neighborhood_models::NormalizedBoundary;
    use crime_pipeline_source::pacing::PacingPolicy;
    use crime_pipeline_source::progress::null_progress;
    use crime_pipeline_source::testing::{RecordingPacer, ScriptedSource};
    use serde_json::{Value, json};

    use super::*;
    use crate::checkpoint::FixedClock;
    use crate::tables::NEIGHBORHOOD_CODE;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "crime_pipeline_runs_{}_{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.ingest.epoch = date("2025-03-01");
        config.ingest.pacing = PacingPolicy::None;
        config.boundaries.path = dir.join("neighborhoods.geojson");
        config.output.csv_path = dir.join("generated").join("joined.csv");
        config
    }

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

    const CAPITOL_HILL: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","properties":{"NEIGHBO":"CAP","CRA_NAM":"Capitol Hill"},
         "geometry":{"type":"Polygon","coordinates":[[[-122.33,47.61],[-122.30,47.61],[-122.30,47.64],[-122.33,47.64],[-122.33,47.61]]]}}
    ]}"#;

    #[tokio::test]
    async fn daily_then_weekly_end_to_end() {
        let dir = scratch_dir("e2e");
        let config = config(&dir);
        std::fs::write(&config.boundaries.path, CAPITOL_HILL).unwrap();

        let source = ScriptedSource::new();
        source.push_day(
            date("2025-03-01"),
            vec![vec![
                with(doc("A"), "latitude", json!("REDACTED")),
                with(doc("B"), "nibrs_crime_against_category", json!("-")),
                doc("C"),
            ]],
        );
        let documents = MemoryIncidentStore::new();
        let boundaries = MemoryBoundaryStore::new();
        let warehouse = MemoryWarehouse::new();

        let daily = run_daily(
            &config,
            &source,
            &RecordingPacer::default(),
            &FixedClock(date("2025-03-01")),
            &documents,
            &warehouse,
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(daily.clean.rows_written, 1);
        assert_eq!(daily.clean.clean.rows_in, 3);
        assert_eq!(daily.clean.clean.category_distribution_before["PROPERTY"], 2);
        assert_eq!(daily.clean.clean.category_distribution_before["-"], 1);
        assert_eq!(daily.clean.clean.category_distribution_after["PROPERTY"], 1);

        let weekly = run_weekly(&config, &boundaries, &warehouse).unwrap();
        let written = std::fs::read_to_string(&config.output.csv_path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(weekly.boundaries.stored, 1);
        assert_eq!(weekly.join.rows, 1);
        assert_eq!(weekly.join.matched, 1);
        assert_eq!(weekly.join.skipped_boundaries, 0);
        assert_eq!(weekly.join.crs, "EPSG:4326");
        assert_eq!(weekly.join.table, config.output.joined_table);

        let joined = warehouse
            .read_table(&config.output.joined_table)
            .unwrap()
            .unwrap();
        let code = joined.column_index(NEIGHBORHOOD_CODE).unwrap();
        assert_eq!(joined.rows[0][code], Cell::Text("CAP".to_string()));

        assert_eq!(written.lines().count(), 2);
        assert!(written.lines().next().unwrap().ends_with("neighborhood_code,neighborhood_name"));
        assert!(written.contains("Capitol Hill"));
    }

    #[tokio::test]
    async fn daily_cleans_even_when_up_to_date() {
        let config = config(Path::new("unused"));
        let documents = MemoryIncidentStore::new();
        documents.upsert_batch(&[doc("A")]).unwrap();
        let warehouse = MemoryWarehouse::new();
        let source = ScriptedSource::new();

        let daily = run_daily(
            &config,
            &source,
            &RecordingPacer::default(),
            &FixedClock(date("2025-03-01")),
            &documents,
            &warehouse,
            &null_progress(),
        )
        .await
        .unwrap();

        assert_eq!(
            daily.ingest,
            IngestOutcome::UpToDate {
                last_ingested: date("2025-03-01")
            }
        );
        assert!(source.requests().is_empty());
        assert_eq!(daily.clean.rows_written, 1);
        assert_eq!(
            warehouse.table_names().unwrap(),
            vec![config.output.clean_table.clone()]
        );
    }

    #[tokio::test]
    async fn failed_fetch_skips_clean() {
        let config = config(Path::new("unused"));
        let source = ScriptedSource::new();
        source.fail_at(date("2025-03-01"), 0);
        let warehouse = MemoryWarehouse::new();

        let result = run_daily(
            &config,
            &source,
            &RecordingPacer::default(),
            &FixedClock(date("2025-03-01")),
            &MemoryIncidentStore::new(),
            &warehouse,
            &null_progress(),
        )
        .await;

        assert!(matches!(result, Err(IngestError::Source(_))));
        assert!(warehouse.table_names().unwrap().is_empty());
    }

    #[test]
    fn join_without_boundaries_is_missing_reference_data() {
        let config = config(Path::new("unused"));

        let err = run_join(
            &config.output,
            &MemoryBoundaryStore::new(),
            &MemoryWarehouse::new(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Join(JoinError::MissingReferenceData { .. })
        ));
    }

    #[test]
    fn join_without_clean_table_fails() {
        let dir = scratch_dir("no_clean");
        let config = config(&dir);
        std::fs::write(&config.boundaries.path, CAPITOL_HILL).unwrap();
        let boundaries = MemoryBoundaryStore::new();
        run_boundaries(&config.boundaries, &boundaries).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        let err = run_join(&config.output, &boundaries, &MemoryWarehouse::new()).unwrap_err();

        assert!(matches!(
            err,
            IngestError::Join(JoinError::MissingTable { table }) if table == config.output.clean_table
        ));
    }

    #[test]
    fn join_reports_unparseable_stored_geometry() {
        let dir = scratch_dir("skipped_geometry");
        let config = config(&dir);
        let documents = MemoryIncidentStore::new();
        documents.upsert_batch(&[doc("A")]).unwrap();
        let warehouse = MemoryWarehouse::new();
        run_clean(&config.output, &documents, &warehouse).unwrap();

        std::fs::write(&config.boundaries.path, CAPITOL_HILL).unwrap();
        let boundaries = MemoryBoundaryStore::new();
        run_boundaries(&config.boundaries, &boundaries).unwrap();
        let mut stored = boundaries.load_boundaries().unwrap();
        stored.push(NormalizedBoundary {
            code: "BAD".to_string(),
            name: "Broken".to_string(),
            geometry_json: "not geojson".to_string(),
            crs: WGS84.to_string(),
        });
        boundaries.replace_boundaries(&stored).unwrap();

        let report = run_join(&config.output, &boundaries, &warehouse).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(report.neighborhoods, 1);
        assert_eq!(report.skipped_boundaries, 1);
        assert_eq!(report.rows, 1);
        assert_eq!(report.matched, 1);
    }

    #[test]
    fn failed_boundary_load_keeps_previous_collection() {
        let dir = scratch_dir("bad_boundaries");
        let config = config(&dir);
        let boundaries = MemoryBoundaryStore::new();

        std::fs::write(&config.boundaries.path, CAPITOL_HILL).unwrap();
        run_boundaries(&config.boundaries, &boundaries).unwrap();

        std::fs::write(
            &config.boundaries.path,
            r#"{"type":"FeatureCollection","crs":{"type":"name","properties":{"name":"EPSG:2926"}},"features":[]}"#,
        )
        .unwrap();
        let result = run_weekly(&config, &boundaries, &MemoryWarehouse::new());
        std::fs::remove_dir_all(&dir).ok();

        assert!(matches!(result, Err(IngestError::Neighborhood(_))));
        assert_eq!(boundaries.load_boundaries().unwrap().len(), 1);
    }

    #[test]
    fn checkpoint_reports_pending_window() {
        let config = config(Path::new("unused"));

        let report = run_checkpoint(
            &config,
            &MemoryIncidentStore::new(),
            &FixedClock(date("2025-03-03")),
        )
        .unwrap();

        assert_eq!(
            report,
            CheckpointReport::Pending {
                start: date("2025-03-01"),
                end: date("2025-03-03"),
                days: 3,
            }
        );
    }
}
