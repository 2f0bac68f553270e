#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Neighborhood boundary types.
//!
//! Defines how boundary features are read from the reference `GeoJSON`
//! file and the normalized boundary type stored in the document store and
//! consumed by the spatial join.

use serde::{Deserialize, Serialize};

/// The only coordinate reference system boundaries are stored in.
pub const WGS84: &str = "EPSG:4326";

/// Which feature properties carry the neighborhood code and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryFieldMapping {
    /// Property holding the internal name code (e.g., `"NEIGHBO"`).
    #[serde(default = "default_code_property")]
    pub code: String,
    /// Property holding the display name (e.g., `"CRA_NAM"`).
    #[serde(default = "default_name_property")]
    pub name: String,
}

impl Default for BoundaryFieldMapping {
    fn default() -> Self {
        Self {
            code: default_code_property(),
            name: default_name_property(),
        }
    }
}

fn default_code_property() -> String {
    "NEIGHBO".to_string()
}

fn default_name_property() -> String {
    "CRA_NAM".to_string()
}

/// A neighborhood boundary, ready for storage and spatial lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedBoundary {
    /// Internal name code.
    pub code: String,
    /// Human-readable neighborhood name.
    pub name: String,
    /// `Polygon` or `MultiPolygon` geometry as `GeoJSON` text.
    pub geometry_json: String,
    /// Coordinate reference system of the geometry (always [`WGS84`]).
    pub crs: String,
}
