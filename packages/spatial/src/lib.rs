#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for neighborhood attribution.
//!
//! Builds an R-tree over neighborhood polygon envelopes and answers
//! point-in-polygon lookups. [`join`] applies it to cleaned incidents.

pub mod join;

use crime_pipeline_neighborhood_models::NormalizedBoundary;
use geo::{Contains, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};

/// A boundary polygon stored in the R-tree with its metadata.
struct BoundaryEntry {
    /// Position in the source collection; lower wins on overlap.
    position: usize,
    code: String,
    name: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// The neighborhood a point falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborhoodMatch<'a> {
    /// Internal name code.
    pub code: &'a str,
    /// Display name.
    pub name: &'a str,
}

/// Pre-built spatial index over neighborhood polygons.
///
/// Constructed once per join run.
pub struct NeighborhoodIndex {
    tree: RTree<BoundaryEntry>,
    skipped: usize,
}

impl NeighborhoodIndex {
    /// Parses each boundary's geometry and bulk-loads the R-tree.
    ///
    /// Boundaries whose geometry does not parse as a `Polygon` or
    /// `MultiPolygon` are logged and left out.
    #[must_use]
    pub fn build(boundaries: &[NormalizedBoundary]) -> Self {
        let mut entries = Vec::with_capacity(boundaries.len());
        let mut skipped = 0;

        for (position, boundary) in boundaries.iter().enumerate() {
            let Some(polygon) = parse_geojson_to_multipolygon(&boundary.geometry_json) else {
                log::warn!("Failed to parse GeoJSON for neighborhood {}", boundary.code);
                skipped += 1;
                continue;
            };

            entries.push(BoundaryEntry {
                position,
                code: boundary.code.clone(),
                name: boundary.name.clone(),
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        let tree = RTree::bulk_load(entries);
        log::info!("Loaded {} neighborhoods into spatial index", tree.size());

        Self { tree, skipped }
    }

    /// Number of indexed neighborhoods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no neighborhood was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Boundaries left out because their geometry did not parse.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Looks up the neighborhood containing a point.
    ///
    /// When polygons overlap, the one earliest in the source collection
    /// wins. Points exactly on a boundary edge are not contained.
    #[must_use]
    pub fn lookup(&self, lng: f64, lat: f64) -> Option<NeighborhoodMatch<'_>> {
        let point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .min_by_key(|entry| entry.position)
            .map(|entry| NeighborhoodMatch {
                code: &entry.code,
                name: &entry.name,
            })
    }
}

/// Parse a `GeoJSON` string into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn parse_geojson_to_multipolygon(geojson_str: &str) -> Option<MultiPolygon<f64>> {
    let geojson: GeoJson = geojson_str.parse().ok()?;
    if let GeoJson::Geometry(geom) = geojson {
        let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
        match geo_geom {
            geo::Geometry::MultiPolygon(mp) => Some(mp),
            geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
            _ => None,
        }
    } else {
        None
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// An axis-aligned square boundary.
    pub fn square(code: &str, min: (f64, f64), max: (f64, f64)) -> NormalizedBoundary {
        let (x0, y0) = min;
        let (x1, y1) = max;
        NormalizedBoundary {
            code: code.to_string(),
            name: format!("{code} name"),
            geometry_json: serde_json::json!({
                "type": "Polygon",
                "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]],
            })
            .to_string(),
            crs: "EPSG:4326".to_string(),
        }
    }

    #[test]
    fn finds_containing_neighborhood() {
        let index = NeighborhoodIndex::build(&[
            square("WEST", (-122.5, 47.5), (-122.3, 47.7)),
            square("EAST", (-122.3, 47.5), (-122.1, 47.7)),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(-122.4, 47.6).unwrap().code, "WEST");
        assert_eq!(index.lookup(-122.2, 47.6).unwrap().name, "EAST name");
        assert!(index.lookup(-121.0, 47.6).is_none());
    }

    #[test]
    fn earliest_boundary_wins_on_overlap() {
        let index = NeighborhoodIndex::build(&[
            square("FIRST", (0.0, 0.0), (2.0, 2.0)),
            square("SECOND", (1.0, 1.0), (3.0, 3.0)),
        ]);

        assert_eq!(index.lookup(1.5, 1.5).unwrap().code, "FIRST");
        assert_eq!(index.lookup(2.5, 2.5).unwrap().code, "SECOND");
    }

    #[test]
    fn accepts_multipolygons() {
        let boundary = NormalizedBoundary {
            code: "ISLANDS".to_string(),
            name: "Islands".to_string(),
            geometry_json: r#"{"type":"MultiPolygon","coordinates":[
                [[[0,0],[1,0],[1,1],[0,1],[0,0]]],
                [[[5,5],[6,5],[6,6],[5,6],[5,5]]]
            ]}"#
            .to_string(),
            crs: "EPSG:4326".to_string(),
        };
        let index = NeighborhoodIndex::build(&[boundary]);

        assert!(index.lookup(0.5, 0.5).is_some());
        assert!(index.lookup(5.5, 5.5).is_some());
        assert!(index.lookup(3.0, 3.0).is_none());
    }

    #[test]
    fn skips_unparseable_geometry() {
        let mut broken = square("BROKEN", (0.0, 0.0), (1.0, 1.0));
        broken.geometry_json = r#"{"type":"Point","coordinates":[0,0]}"#.to_string();

        let index = NeighborhoodIndex::build(&[broken]);

        assert!(index.is_empty());
        assert_eq!(index.skipped(), 1);
    }
}
