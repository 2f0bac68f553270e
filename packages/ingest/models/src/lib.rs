#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline configuration and ingestion result types.
//!
//! Every configuration field has a default, so an empty TOML file (or no
//! file at all) yields a working Seattle configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use crime_pipeline_neighborhood_models::BoundaryFieldMapping;
use crime_pipeline_source::pacing::PacingPolicy;
use crime_pipeline_source::socrata::{SEATTLE_API_URL, SocrataConfig};
use serde::{Deserialize, Serialize};

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub ingest: IngestConfig,
    pub storage: StorageConfig,
    pub boundaries: BoundaryConfig,
    pub output: OutputConfig,
}

/// The remote incident API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Socrata resource URL.
    pub url: String,
    /// Occurrence timestamp column used for day windows.
    pub date_column: String,
    /// Optional Socrata application token.
    pub app_token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Name used in log messages.
    pub label: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: SEATTLE_API_URL.to_string(),
            date_column: "offense_date".to_string(),
            app_token: None,
            timeout_secs: 60,
            label: "Seattle".to_string(),
        }
    }
}

impl ApiConfig {
    /// Builds the page source configuration.
    #[must_use]
    pub fn socrata(&self) -> SocrataConfig {
        SocrataConfig {
            api_url: self.url.clone(),
            date_column: self.date_column.clone(),
            app_token: self.app_token.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            label: self.label.clone(),
        }
    }
}

/// Incremental ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Records per page request.
    pub page_size: u64,
    /// First day fetched when the document store is empty.
    pub epoch: NaiveDate,
    /// Delay between page requests of the same day.
    pub pacing: PacingPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_size: 1_000,
            epoch: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            pacing: PacingPolicy::default(),
        }
    }
}

/// Locations of the two stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Document store `DuckDB` file.
    pub document_db: PathBuf,
    /// Warehouse `DuckDB` file.
    pub warehouse_db: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            document_db: PathBuf::from("data/documents.duckdb"),
            warehouse_db: PathBuf::from("data/warehouse.duckdb"),
        }
    }
}

/// The neighborhood boundary reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// `GeoJSON` `FeatureCollection` on disk.
    pub path: PathBuf,
    /// Which feature properties hold code and name.
    pub fields: BoundaryFieldMapping,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/neighborhoods.geojson"),
            fields: BoundaryFieldMapping::default(),
        }
    }
}

/// Names of the produced tables and artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Warehouse table holding the cleaned incidents.
    pub clean_table: String,
    /// Warehouse table holding the joined incidents.
    pub joined_table: String,
    /// Comma-delimited artifact of the joined incidents.
    pub csv_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            clean_table: "clean_seattle_crime_data".to_string(),
            joined_table: "crime_neighborhood_joined".to_string(),
            csv_path: PathBuf::from(
                "data/generated/CrimeData_Geojson_Neighbor_Spatial_Join.csv",
            ),
        }
    }
}

/// Result of one incremental ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The store already holds everything up to today.
    UpToDate {
        /// Day of the latest stored incident.
        last_ingested: NaiveDate,
    },
    /// New days were fetched and upserted.
    Completed {
        /// First fetched day.
        start: NaiveDate,
        /// Last fetched day.
        end: NaiveDate,
        /// Records returned by the API.
        fetched: u64,
        /// Documents newly created in the store.
        inserted: u64,
        /// Existing documents replaced.
        replaced: u64,
        /// Records dropped for lacking a `report_number`.
        dropped_without_key: u64,
        /// Page requests issued, including terminating empty pages.
        pages: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_seattle_pipeline() {
        let config = PipelineConfig::default();

        assert_eq!(config.api.url, SEATTLE_API_URL);
        assert_eq!(config.ingest.page_size, 1_000);
        assert_eq!(config.ingest.epoch.to_string(), "2025-01-01");
        assert_eq!(config.ingest.pacing, PacingPolicy::Fixed { delay_ms: 1_000 });
        assert_eq!(config.output.joined_table, "crime_neighborhood_joined");
        assert_eq!(config.boundaries.fields.code, "NEIGHBO");
    }

    #[test]
    fn socrata_config_carries_token_and_timeout() {
        let api = ApiConfig {
            app_token: Some("secret".to_string()),
            timeout_secs: 5,
            ..ApiConfig::default()
        };
        let socrata = api.socrata();

        assert_eq!(socrata.app_token.as_deref(), Some("secret"));
        assert_eq!(socrata.timeout, Duration::from_secs(5));
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = IngestOutcome::UpToDate {
            last_ingested: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        };
        let value = serde_json::to_value(&outcome).unwrap();

        assert_eq!(value["status"], "up_to_date");
        assert_eq!(value["last_ingested"], "2025-03-01");
    }
}
