/*!
 * Mission configuration: the transect definitions and the people to notify.
 *
 * Transects are read from a JSON file keyed by area id:
 *
 * ```json
 * { "SAMBA_02": { "names": ["B2", "B4"], "lon": [15.9833, 16.3514], "lat": [55.25, 55.5707] } }
 * ```
 *
 * The `names` array is optional. The order of the areas in the file is kept, it matters when a
 * track fits more than one transect (see [classify](crate::classify())).
 */
use crate::{error::ConfigError, geometry::Coord, GliderWatchResult};
use serde::Deserialize;
use std::path::Path;

/// A named reference line a vehicle is expected to fly along.
#[derive(Debug, Clone, PartialEq)]
pub struct TransectDefinition {
    area_id: String,
    waypoints: Vec<Coord>,
    names: Vec<String>,
}

impl TransectDefinition {
    pub fn new<S: Into<String>>(area_id: S, waypoints: Vec<Coord>) -> Result<Self, ConfigError> {
        let area_id = area_id.into();

        if waypoints.len() < 2 {
            return Err(ConfigError {
                msg: format!("transect {} needs at least 2 waypoints", area_id),
            });
        }

        if let Some(bad) = waypoints.iter().find(|wp| {
            !(wp.lon.is_finite() && wp.lat.is_finite())
                || wp.lat.abs() > 90.0
                || wp.lon.abs() > 180.0
        }) {
            return Err(ConfigError {
                msg: format!("transect {} has an invalid waypoint {:?}", area_id, bad),
            });
        }

        Ok(TransectDefinition {
            area_id,
            waypoints,
            names: vec![],
        })
    }

    /// Attach the waypoint names used by the pilots, one per waypoint.
    pub fn with_names(mut self, names: Vec<String>) -> Result<Self, ConfigError> {
        if !names.is_empty() && names.len() != self.waypoints.len() {
            return Err(ConfigError {
                msg: format!(
                    "transect {} has {} waypoints but {} names",
                    self.area_id,
                    self.waypoints.len(),
                    names.len()
                ),
            });
        }

        self.names = names;
        Ok(self)
    }

    pub fn area_id(&self) -> &str {
        &self.area_id
    }

    pub fn waypoints(&self) -> &[Coord] {
        &self.waypoints
    }

    pub fn waypoint_names(&self) -> &[String] {
        &self.names
    }
}

#[derive(Debug, Deserialize)]
struct WaypointTable {
    lon: Vec<f64>,
    lat: Vec<f64>,
    #[serde(default)]
    names: Vec<String>,
}

/// Parse transect definitions from JSON text, keeping the order they appear in.
pub fn parse_transects(json: &str) -> GliderWatchResult<Vec<TransectDefinition>> {
    let areas: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

    let mut transects = Vec::with_capacity(areas.len());
    for (area_id, value) in areas {
        let WaypointTable { lon, lat, names } = serde_json::from_value(value)?;

        if lon.len() != lat.len() {
            return Err(Box::new(ConfigError {
                msg: format!(
                    "transect {} has {} longitudes but {} latitudes",
                    area_id,
                    lon.len(),
                    lat.len()
                ),
            }));
        }

        let waypoints = lon
            .into_iter()
            .zip(lat)
            .map(|(lon, lat)| Coord { lon, lat })
            .collect();

        transects.push(TransectDefinition::new(area_id, waypoints)?.with_names(names)?);
    }

    if transects.is_empty() {
        return Err(Box::new(ConfigError {
            msg: "no transects defined".to_owned(),
        }));
    }

    Ok(transects)
}

/// Load the transect definitions from a JSON file.
pub fn load_transects<P: AsRef<Path>>(path: P) -> GliderWatchResult<Vec<TransectDefinition>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("unable to read {}: {}", path.display(), err))?;

    parse_transects(&text)
}

/// Load a recipient list, one address per line. Blank lines and `#` comments are skipped.
pub fn load_recipients<P: AsRef<Path>>(path: P) -> GliderWatchResult<Vec<String>> {
    let text = std::fs::read_to_string(path.as_ref())?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_transects_keeps_file_order() {
        let json = r#"{
            "SAMBA_05": { "names": ["A1", "A2"], "lon": [19.6948, 19.3669], "lat": [60.0003, 60.1165] },
            "SAMBA_02": { "lon": [15.9833, 16.3514], "lat": [55.2500, 55.5707] },
            "SAMBA_03": { "lon": [19.9293, 19.9617, 19.7847], "lat": [58.1474, 58.2551, 58.5162] }
        }"#;

        let transects = parse_transects(json).unwrap();
        let ids: Vec<&str> = transects.iter().map(|t| t.area_id()).collect();
        assert_eq!(ids, ["SAMBA_05", "SAMBA_02", "SAMBA_03"]);

        assert_eq!(transects[0].waypoint_names(), ["A1", "A2"]);
        assert!(transects[1].waypoint_names().is_empty());
        assert_eq!(transects[2].waypoints().len(), 3);
        assert_eq!(transects[2].waypoints()[1], Coord::new(19.9617, 58.2551));
    }

    #[test]
    fn test_parse_transects_rejects_bad_tables() {
        // Mismatched lengths.
        assert!(parse_transects(r#"{"A": {"lon": [1.0, 2.0], "lat": [1.0]}}"#).is_err());
        // Too short.
        assert!(parse_transects(r#"{"A": {"lon": [1.0], "lat": [1.0]}}"#).is_err());
        // Out of range.
        assert!(parse_transects(r#"{"A": {"lon": [1.0, 2.0], "lat": [91.0, 1.0]}}"#).is_err());
        // Wrong number of names.
        assert!(
            parse_transects(r#"{"A": {"names": ["x"], "lon": [1.0, 2.0], "lat": [1.0, 2.0]}}"#)
                .is_err()
        );
        // Nothing at all.
        assert!(parse_transects("{}").is_err());
        assert!(parse_transects("[]").is_err());
    }

    #[test]
    fn test_load_recipients() {
        let path = std::env::temp_dir().join(format!(
            "gliderwatch-recipients-{}.txt",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "# pilots\nops@example.org\n\n  alarms@example.slack.com  \n",
        )
        .unwrap();

        let recipients = load_recipients(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(recipients, ["ops@example.org", "alarms@example.slack.com"]);
    }
}
