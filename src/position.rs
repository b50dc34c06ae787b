/*!
 * Turn raw position reports into tracks.
 *
 * Gliders report positions as packed degrees, `ddmm.mmm`: whole degrees in the digits above the
 * hundreds place and decimal minutes below it. Everything downstream works in decimal degrees.
 */
use crate::{command_log::RawPositionReport, geometry::Coord};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Convert a packed-degree value (`ddmm.mmm`) to decimal degrees.
///
/// Negative values are converted on their magnitude and negated.
pub fn dd_coord(packed: f64) -> f64 {
    let magnitude = packed.abs();
    let degrees = (magnitude / 100.0).floor();
    let minutes = magnitude - 100.0 * degrees;

    (degrees + minutes / 60.0).copysign(packed)
}

/**
 * A coordinate in packed-degree form as read from the vehicle.
 *
 * There is no way to build one from a decimal-degree value. Text that can not be a
 * packed coordinate (a minute part of 60 or more) is rejected.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedDegrees(f64);

impl PackedDegrees {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let value: f64 = text.parse().ok()?;
        if !value.is_finite() || value.abs() % 100.0 >= 60.0 {
            return None;
        }

        Some(PackedDegrees(value))
    }

    pub fn packed(self) -> f64 {
        self.0
    }

    pub fn to_decimal(self) -> f64 {
        dd_coord(self.0)
    }
}

/// Parse the day-first timestamps written by the command console, they are in UTC.
pub fn parse_day_first(text: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 4] = [
        "%d/%m/%Y %H:%M:%S%.f",
        "%d/%m/%Y %H:%M",
        "%d-%m-%Y %H:%M:%S%.f",
        "%d.%m.%Y %H:%M:%S%.f",
    ];

    let text = text.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// A single position fix of a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub vehicle_id: String,
    pub timestamp: DateTime<Utc>,
    pub lon: f64,
    pub lat: f64,
    pub cycle_id: u32,
}

impl TrackPoint {
    /// Normalize one raw report, `None` if any of the fields is missing, malformed, or out of range.
    pub fn from_report(vehicle_id: &str, report: &RawPositionReport) -> Option<Self> {
        let timestamp = parse_day_first(&report.date_time)?;
        let cycle_id: u32 = report.cycle.trim().parse().ok()?;
        let lat = PackedDegrees::parse(&report.lat)?.to_decimal();
        let lon = PackedDegrees::parse(&report.lon)?.to_decimal();

        if lat.abs() > 90.0 || lon.abs() > 180.0 {
            return None;
        }

        Some(TrackPoint {
            vehicle_id: vehicle_id.to_owned(),
            timestamp,
            lon,
            lat,
            cycle_id,
        })
    }

    pub fn coord(&self) -> Coord {
        Coord {
            lon: self.lon,
            lat: self.lat,
        }
    }
}

/// All the position fixes of a vehicle's current mission, oldest first.
#[derive(Debug, Clone)]
pub struct Track {
    vehicle_id: String,
    points: Vec<TrackPoint>,
}

impl Track {
    /// Build a track, the points are sorted by time.
    pub fn new<S: Into<String>>(vehicle_id: S, mut points: Vec<TrackPoint>) -> Self {
        points.sort_by_key(|pnt| pnt.timestamp);

        Track {
            vehicle_id: vehicle_id.into(),
            points,
        }
    }

    /// Normalize a batch of raw reports, dropping the ones without a usable position.
    pub fn from_reports<'a, I>(vehicle_id: &str, reports: I) -> Self
    where
        I: IntoIterator<Item = &'a RawPositionReport>,
    {
        let mut dropped = 0;
        let points: Vec<TrackPoint> = reports
            .into_iter()
            .filter_map(|report| {
                let pnt = TrackPoint::from_report(vehicle_id, report);
                if pnt.is_none() {
                    dropped += 1;
                }
                pnt
            })
            .collect();

        if dropped > 0 {
            log::debug!(target: vehicle_id, "dropped {} reports without a position", dropped);
        }

        Self::new(vehicle_id, points)
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// The time of the newest fix.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|pnt| pnt.timestamp)
    }
}
