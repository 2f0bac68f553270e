//! Normalizes `GeoJSON` features into [`NormalizedBoundary`] values.
//!
//! Uses a [`BoundaryFieldMapping`] to pick the neighborhood code and name
//! out of each feature's properties, regardless of how the publishing
//! portal names them.

use crime_pipeline_neighborhood_models::{BoundaryFieldMapping, NormalizedBoundary, WGS84};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};

use crate::NeighborhoodError;

/// Boundaries normalized from one feature collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCollection {
    /// Usable boundaries, in file order.
    pub boundaries: Vec<NormalizedBoundary>,
    /// Features skipped for a missing code, name or polygon geometry.
    pub skipped: u64,
    /// CRS declared by the file, if any.
    pub declared_crs: Option<String>,
}

/// Parses `GeoJSON` text and normalizes its features.
///
/// # Errors
///
/// * [`NeighborhoodError::GeoJson`] if the text is not valid `GeoJSON`
/// * [`NeighborhoodError::Conversion`] if it is not a `FeatureCollection`
/// * [`NeighborhoodError::UnsupportedCrs`] if it declares a non-WGS84 CRS
pub fn normalize_geojson(
    text: &str,
    fields: &BoundaryFieldMapping,
) -> Result<NormalizedCollection, NeighborhoodError> {
    let GeoJson::FeatureCollection(collection) = text.parse::<GeoJson>()? else {
        return Err(NeighborhoodError::Conversion {
            message: "boundary file must be a GeoJSON FeatureCollection".to_string(),
        });
    };

    normalize_collection(&collection, fields)
}

/// Normalizes an already-parsed feature collection.
///
/// # Errors
///
/// Returns [`NeighborhoodError::UnsupportedCrs`] if the collection
/// declares a CRS other than WGS84.
pub fn normalize_collection(
    collection: &FeatureCollection,
    fields: &BoundaryFieldMapping,
) -> Result<NormalizedCollection, NeighborhoodError> {
    let declared_crs = declared_crs(collection);
    if let Some(crs) = &declared_crs
        && !is_wgs84(crs)
    {
        return Err(NeighborhoodError::UnsupportedCrs { crs: crs.clone() });
    }

    let mut boundaries = Vec::with_capacity(collection.features.len());
    let mut skipped = 0u64;

    for feature in &collection.features {
        if let Some(boundary) = normalize_feature(feature, fields) {
            boundaries.push(boundary);
        } else {
            skipped += 1;
        }
    }

    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} of {} boundary features without {}/{} or polygon geometry",
            collection.features.len(),
            fields.code,
            fields.name,
        );
    }

    Ok(NormalizedCollection {
        boundaries,
        skipped,
        declared_crs,
    })
}

/// Normalizes a single feature.
fn normalize_feature(feature: &Feature, fields: &BoundaryFieldMapping) -> Option<NormalizedBoundary> {
    let props = feature.properties.as_ref()?;
    let code = property_text(props, &fields.code)?;
    let name = property_text(props, &fields.name)?;

    let geometry = feature.geometry.as_ref()?;
    if !matches!(
        geometry.value,
        geojson::Value::Polygon(_) | geojson::Value::MultiPolygon(_)
    ) {
        return None;
    }

    Some(NormalizedBoundary {
        code,
        name,
        geometry_json: serde_json::to_string(geometry).ok()?,
        crs: WGS84.to_string(),
    })
}

/// Reads a property as trimmed, non-empty text. Numeric codes are
/// rendered as text.
fn property_text(props: &JsonObject, key: &str) -> Option<String> {
    let text = match props.get(key)? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

/// Returns the CRS name from a legacy `crs` member, if present.
fn declared_crs(collection: &FeatureCollection) -> Option<String> {
    collection
        .foreign_members
        .as_ref()?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

/// Whether a CRS name refers to WGS84 longitude/latitude.
///
/// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326` and the `CRS84`
/// URNs.
fn is_wgs84(name: &str) -> bool {
    let upper = name.trim().to_ascii_uppercase();
    upper == WGS84 || upper.ends_with("EPSG::4326") || upper.ends_with("CRS84")
}
