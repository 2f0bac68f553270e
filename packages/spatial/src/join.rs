//! Point-in-polygon left join of incidents against neighborhoods.

use crime_pipeline_incident_models::CleanIncident;

use crate::NeighborhoodIndex;

/// A cleaned incident with the neighborhood its coordinates fall in.
///
/// Incidents outside every polygon keep `None` for both neighborhood
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedIncident {
    pub incident: CleanIncident,
    pub neighborhood_code: Option<String>,
    pub neighborhood_name: Option<String>,
}

/// Result of joining a set of incidents.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutput {
    /// Every input incident, in input order.
    pub rows: Vec<JoinedIncident>,
    /// How many incidents fell inside some neighborhood.
    pub matched: u64,
}

/// Attaches a neighborhood to every incident.
///
/// Incidents are never dropped.
#[must_use]
pub fn join_incidents(index: &NeighborhoodIndex, incidents: Vec<CleanIncident>) -> JoinOutput {
    let mut matched = 0u64;

    let rows: Vec<JoinedIncident> = incidents
        .into_iter()
        .map(|incident| {
            let found = index.lookup(incident.longitude, incident.latitude);
            if found.is_some() {
                matched += 1;
            }
            JoinedIncident {
                neighborhood_code: found.map(|m| m.code.to_string()),
                neighborhood_name: found.map(|m| m.name.to_string()),
                incident,
            }
        })
        .collect();

    log::info!(
        "Joined {} incidents against {} neighborhoods ({matched} matched)",
        rows.len(),
        index.len()
    );

    JoinOutput { rows, matched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::square;

    fn incident(key: &str, lng: f64, lat: f64) -> CleanIncident {
        CleanIncident {
            report_number: key.to_string(),
            report_date_time: "2025-03-01T10:20:00.000".to_string(),
            offense_date: "2025-03-01T10:15:30.000".to_string(),
            crime_against_category: "PROPERTY".to_string(),
            offense_sub_category: "LARCENY-THEFT".to_string(),
            offense_category: "LARCENY-THEFT".to_string(),
            offense_code: "23H".to_string(),
            offense_code_description: "All Other Larceny".to_string(),
            precinct: "E".to_string(),
            sector: "C".to_string(),
            beat: "C2".to_string(),
            neighborhood: "CAPITOL HILL".to_string(),
            longitude: lng,
            latitude: lat,
        }
    }

    #[test]
    fn keeps_unmatched_incidents_with_nulls() {
        let index = NeighborhoodIndex::build(&[square("CAP", (-122.33, 47.61), (-122.30, 47.64))]);

        let output = join_incidents(
            &index,
            vec![
                incident("A", -122.32, 47.62),
                incident("B", -122.50, 47.50),
            ],
        );

        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.matched, 1);
        assert_eq!(output.rows[0].neighborhood_code.as_deref(), Some("CAP"));
        assert_eq!(output.rows[0].neighborhood_name.as_deref(), Some("CAP name"));
        assert_eq!(output.rows[1].incident.report_number, "B");
        assert_eq!(output.rows[1].neighborhood_code, None);
        assert_eq!(output.rows[1].neighborhood_name, None);
    }
}
