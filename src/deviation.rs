/*!
 * Find the dive cycles that left the transect corridor.
 *
 * Only the recent part of a track matters. The fixes within a trailing time window are averaged
 * per dive cycle and each cycle's centroid is tested against the reference line buffered by the
 * alert margin.
 */
use crate::{
    config::TransectDefinition,
    geometry::{Coord, Corridor, Projection},
    position::{Track, TrackPoint},
};
use chrono::{DateTime, Duration, Utc};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
};

/// The centroid of all the fixes of one dive cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSummary {
    pub cycle_id: u32,
    pub mean_lon: f64,
    pub mean_lat: f64,
    /// The number of fixes averaged.
    pub count: usize,
}

impl CycleSummary {
    pub fn centroid(&self) -> Coord {
        Coord {
            lon: self.mean_lon,
            lat: self.mean_lat,
        }
    }
}

/// Average the fixes of each dive cycle, the result is ordered by cycle id.
pub fn summarize_cycles<'a, I>(points: I) -> Vec<CycleSummary>
where
    I: IntoIterator<Item = &'a TrackPoint>,
{
    let mut sums: BTreeMap<u32, (f64, f64, usize)> = BTreeMap::new();

    for pnt in points {
        let entry = sums.entry(pnt.cycle_id).or_insert((0.0, 0.0, 0));
        entry.0 += pnt.lon;
        entry.1 += pnt.lat;
        entry.2 += 1;
    }

    sums.into_iter()
        .map(|(cycle_id, (lon, lat, count))| CycleSummary {
            cycle_id,
            mean_lon: lon / count as f64,
            mean_lat: lat / count as f64,
            count,
        })
        .collect()
}

/// How a vehicle's recent dive cycles sit relative to its transect corridor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviationResult {
    pub area_id: String,
    /// Cycles whose centroid is outside the corridor.
    pub off_track_cycle_ids: BTreeSet<u32>,
    /// Distance outside the corridor in whole meters, for the off track cycles.
    pub distances: BTreeMap<u32, u64>,
    /// The newest usable cycle in the window, `None` if there was none.
    pub latest_cycle_id: Option<u32>,
}

impl DeviationResult {
    /// Only a vehicle still outside the corridor on its latest dive is worth an alert. Earlier
    /// excursions it has already recovered from are ignored.
    pub fn is_alert_worthy(&self) -> bool {
        match self.latest_cycle_id {
            Some(latest) => self.off_track_cycle_ids.contains(&latest),
            None => false,
        }
    }

    pub fn is_on_track(&self) -> bool {
        self.off_track_cycle_ids.is_empty()
    }

    /// The largest off track cycle id, if any.
    pub fn max_off_track_cycle(&self) -> Option<u32> {
        self.off_track_cycle_ids.iter().next_back().copied()
    }
}

impl Display for DeviationResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}: ", self.area_id)?;
        match self.latest_cycle_id {
            Some(latest) => write!(f, "latest dive {}", latest)?,
            None => write!(f, "no recent dives")?,
        }
        write!(f, ", {} dives off track", self.off_track_cycle_ids.len())
    }
}

/**
 * Check the recent dive cycles of a track against its transect corridor.
 *
 * #Arguments
 * track - the vehicle's track.
 * transect - the transect the track was assigned to.
 * alert_margin - the corridor half-width in meters.
 * window - only fixes newer than `now - window` are considered.
 * now - the evaluation time.
 * projection - the metric projection used for all distances.
 */
pub fn detect_deviation<P: Projection + ?Sized>(
    track: &Track,
    transect: &TransectDefinition,
    alert_margin: f64,
    window: Duration,
    now: DateTime<Utc>,
    projection: &P,
) -> DeviationResult {
    let cutoff = now - window;

    let cycles = summarize_cycles(track.points().iter().filter(|pnt| pnt.timestamp > cutoff));
    let corridor = Corridor::new(projection, transect.waypoints(), alert_margin);

    let mut off_track_cycle_ids = BTreeSet::new();
    let mut distances = BTreeMap::new();
    let mut latest_cycle_id = None;

    for cycle in &cycles {
        let centroid = projection.project(cycle.centroid());

        // Far outside the projection's zone the projected values are not usable.
        if !(centroid.x().is_finite() && centroid.y().is_finite()) {
            log::warn!(
                target: track.vehicle_id(),
                "dive {} at {:?} can not be projected, ignored",
                cycle.cycle_id,
                cycle.centroid()
            );
            continue;
        }

        latest_cycle_id = latest_cycle_id.max(Some(cycle.cycle_id));

        if corridor.contains(&centroid) {
            continue;
        }

        off_track_cycle_ids.insert(cycle.cycle_id);
        let dist = corridor.distance_outside(&centroid);
        if dist != 0.0 {
            distances.insert(cycle.cycle_id, dist.round() as u64);
        }
    }

    DeviationResult {
        area_id: transect.area_id().to_owned(),
        off_track_cycle_ids,
        distances,
        latest_cycle_id,
    }
}
