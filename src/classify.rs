/*!
 * Decide which transect a glider is flying.
 *
 * The assignment is coarse. Each reference line is buffered by a wide margin and a
 * track belongs to a transect if any of its fixes falls inside that buffer.
 */
use crate::{
    config::TransectDefinition,
    geometry::{great_circle_distance, Corridor, Projection},
    position::TrackPoint,
};
use geo::Point;

/// The outcome of matching a track against the configured transects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Classification<'a> {
    Assigned(&'a TransectDefinition),
    Unclassified,
}

impl<'a> Classification<'a> {
    pub fn transect(self) -> Option<&'a TransectDefinition> {
        match self {
            Classification::Assigned(transect) => Some(transect),
            Classification::Unclassified => None,
        }
    }
}

/**
 * Find the transect a set of fixes belongs to.
 *
 * Transects are tested in configuration order. When the fixes fall in the buffer of more than one
 * transect the last one tested wins, the configuration listed last is taken to be the most recent.
 * That choice is logged since it says nothing about which corridor the glider is really flying.
 *
 * #Arguments
 * points - the fixes to classify, usually a whole track.
 * transects - every configured transect.
 * margin - the buffer around each reference line in meters.
 * projection - the metric projection used for the containment test.
 */
pub fn classify<'a, P: Projection + ?Sized>(
    points: &[TrackPoint],
    transects: &'a [TransectDefinition],
    margin: f64,
    projection: &P,
) -> Classification<'a> {
    let projected: Vec<Point<f64>> = points
        .iter()
        .map(|pnt| projection.project(pnt.coord()))
        .collect();

    let matches: Vec<&TransectDefinition> = transects
        .iter()
        .filter(|transect| {
            let corridor = Corridor::new(projection, transect.waypoints(), margin);
            projected.iter().any(|pnt| corridor.contains(pnt))
        })
        .collect();

    if matches.len() > 1 {
        let ids: Vec<&str> = matches.iter().map(|t| t.area_id()).collect();
        log::warn!(
            "track fits {} transects {:?}, using the last configured: {}",
            matches.len(),
            ids,
            ids[ids.len() - 1]
        );
    }

    match matches.last() {
        Some(&transect) => Classification::Assigned(transect),
        None => Classification::Unclassified,
    }
}

/// The waypoint closest to the newest fix, with its distance in kilometers.
///
/// Only used to give context when a track could not be classified.
pub fn closest_waypoint<'a>(
    points: &[TrackPoint],
    transects: &'a [TransectDefinition],
) -> Option<(&'a str, f64)> {
    let last = points.last()?;

    transects
        .iter()
        .flat_map(|transect| {
            transect.waypoints().iter().map(move |wp| {
                let dist = great_circle_distance(last.coord(), *wp);
                (transect.area_id(), dist)
            })
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{Coord, TransverseMercator};
    use chrono::{TimeZone, Utc};

    fn point(lon: f64, lat: f64) -> TrackPoint {
        TrackPoint {
            vehicle_id: "SEA063_M45".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2023, 2, 3, 12, 0, 0).unwrap(),
            lon,
            lat,
            cycle_id: 1,
        }
    }

    fn transects() -> Vec<TransectDefinition> {
        vec![
            TransectDefinition::new(
                "SAMBA_02",
                vec![Coord::new(15.9833, 55.2500), Coord::new(16.3514, 55.5707)],
            )
            .unwrap(),
            TransectDefinition::new(
                "SAMBA_05",
                vec![Coord::new(19.6948, 60.0003), Coord::new(19.3669, 60.1165)],
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_classify_single_match() {
        let proj = TransverseMercator::SWEREF99_TM;
        let transects = transects();

        // Near the middle of SAMBA_02, plus one far away fix that matches nothing.
        let points = vec![point(16.17, 55.41), point(5.0, 50.0)];
        let class = classify(&points, &transects, 5000.0, &proj);
        assert_eq!(class.transect().map(|t| t.area_id()), Some("SAMBA_02"));
    }

    #[test]
    fn test_classify_no_match() {
        let proj = TransverseMercator::SWEREF99_TM;
        let transects = transects();

        let points = vec![point(12.0, 57.0)];
        assert_eq!(
            classify(&points, &transects, 5000.0, &proj),
            Classification::Unclassified
        );
        assert_eq!(
            classify(&[], &transects, 5000.0, &proj),
            Classification::Unclassified
        );
    }

    #[test]
    fn test_classify_last_configured_wins() {
        let proj = TransverseMercator::SWEREF99_TM;
        let mut transects = transects();
        transects.push(
            TransectDefinition::new(
                "SAMBA_02_EXTENDED",
                vec![Coord::new(15.9833, 55.2500), Coord::new(16.5, 55.7)],
            )
            .unwrap(),
        );

        let points = vec![point(15.9833, 55.2500)];
        let class = classify(&points, &transects, 5000.0, &proj);
        assert_eq!(
            class.transect().map(|t| t.area_id()),
            Some("SAMBA_02_EXTENDED")
        );

        transects.swap(0, 2);
        let class = classify(&points, &transects, 5000.0, &proj);
        assert_eq!(class.transect().map(|t| t.area_id()), Some("SAMBA_02"));
    }

    #[test]
    fn test_closest_waypoint() {
        let transects = transects();
        let points = vec![point(12.0, 57.0), point(19.5, 60.0)];

        let (area, dist) = closest_waypoint(&points, &transects).unwrap();
        assert_eq!(area, "SAMBA_05");
        assert!(dist > 0.0 && dist < 20.0);

        assert!(closest_waypoint(&[], &transects).is_none());
    }
}
