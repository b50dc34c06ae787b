/*!
 * One monitoring run over every active mission.
 *
 * For each vehicle: check the alarm cooldown, load and normalize its track, classify it, look for
 * deviations. Every vehicle that is off track on its latest dive goes into a single message that
 * is sent to all recipients. Vehicles are only marked as alarmed if that message reached at least
 * one recipient.
 */
use crate::{
    alarm_database::AlarmState,
    alert::{compose_message, dispatch, DispatchReport, Notifier, VehicleAlert},
    classify::{classify, closest_waypoint, Classification},
    config::TransectDefinition,
    deviation::{detect_deviation, DeviationResult},
    geometry::{Projection, TransverseMercator},
    position::Track,
    GliderWatchResult,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use static_assertions::const_assert;
use std::path::Path;
use strum::IntoStaticStr;

/// Buffer around a transect used to decide which transect a glider is on, in meters.
pub const DEFAULT_CLASSIFICATION_MARGIN_M: f64 = 5000.0;
/// Corridor half-width a glider has to stay within, in meters.
pub const DEFAULT_ALERT_MARGIN_M: f64 = 1500.0;
/// Only dives this recent are checked.
pub const DEFAULT_WINDOW_HOURS: i64 = 8;
/// Minimum time between two alarms for the same vehicle.
pub const DEFAULT_COOLDOWN_HOURS: i64 = 24;
/// A mission is active if its log has an entry this recent.
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;
pub const DEFAULT_SUBJECT: &str = "Glider-transect-alert";

const_assert!(DEFAULT_ALERT_MARGIN_M < DEFAULT_CLASSIFICATION_MARGIN_M);
const_assert!(DEFAULT_WINDOW_HOURS <= DEFAULT_COOLDOWN_HOURS);

/// The knobs of a monitoring run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub classification_margin: f64,
    pub alert_margin: f64,
    pub window: Duration,
    pub cooldown: Duration,
    pub recipients: Vec<String>,
    pub subject: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            classification_margin: DEFAULT_CLASSIFICATION_MARGIN_M,
            alert_margin: DEFAULT_ALERT_MARGIN_M,
            window: Duration::hours(DEFAULT_WINDOW_HOURS),
            cooldown: Duration::hours(DEFAULT_COOLDOWN_HOURS),
            recipients: vec![],
            subject: DEFAULT_SUBJECT.to_owned(),
        }
    }
}

/// Something that can produce the track of one vehicle.
pub trait TrackSource {
    fn vehicle_id(&self) -> &str;
    fn load_track(&self) -> GliderWatchResult<Track>;
}

impl TrackSource for Track {
    fn vehicle_id(&self) -> &str {
        Track::vehicle_id(self)
    }

    fn load_track(&self) -> GliderWatchResult<Track> {
        Ok(self.clone())
    }
}

/// What happened to one vehicle during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleOutcome {
    /// Alarmed recently, not evaluated.
    Suppressed { last_alarm: DateTime<Utc> },
    /// The log had no usable position reports.
    NoPositions,
    /// The track is not near any configured transect. Carries the closest waypoint's area and
    /// distance in kilometers.
    Unclassified { closest: Option<(String, f64)> },
    Evaluated(DeviationResult),
    /// Something went wrong with this vehicle, the rest of the run carried on.
    Failed(String),
}

/// A flat label for a [VehicleOutcome].
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum VehicleStatus {
    Suppressed,
    NoPositions,
    Unclassified,
    NoRecentCycles,
    OnTrack,
    Recovered,
    OffTrack,
    Failed,
}

impl VehicleOutcome {
    pub fn status(&self) -> VehicleStatus {
        match self {
            VehicleOutcome::Suppressed { .. } => VehicleStatus::Suppressed,
            VehicleOutcome::NoPositions => VehicleStatus::NoPositions,
            VehicleOutcome::Unclassified { .. } => VehicleStatus::Unclassified,
            VehicleOutcome::Failed(_) => VehicleStatus::Failed,
            VehicleOutcome::Evaluated(res) => {
                if res.latest_cycle_id.is_none() {
                    VehicleStatus::NoRecentCycles
                } else if res.is_alert_worthy() {
                    VehicleStatus::OffTrack
                } else if res.is_on_track() {
                    VehicleStatus::OnTrack
                } else {
                    VehicleStatus::Recovered
                }
            }
        }
    }

    pub fn deviation(&self) -> Option<&DeviationResult> {
        match self {
            VehicleOutcome::Evaluated(res) => Some(res),
            _ => None,
        }
    }
}

/// Everything a run did.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<(String, VehicleOutcome)>,
    pub alerts: Vec<VehicleAlert>,
    pub message: Option<String>,
    /// `None` if there was nothing to send.
    pub dispatch: Option<DispatchReport>,
    /// Vehicles whose alarm record was updated.
    pub recorded: Vec<String>,
}

impl RunSummary {
    pub fn outcome(&self, vehicle_id: &str) -> Option<&VehicleOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == vehicle_id)
            .map(|(_, outcome)| outcome)
    }

    /// True if the message failed to reach at least one recipient.
    pub fn dispatch_failed(&self) -> bool {
        self.dispatch
            .as_ref()
            .map(|report| !report.all_delivered())
            .unwrap_or(false)
    }

    /// Write one row per vehicle to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> GliderWatchResult<()> {
        #[derive(Serialize)]
        struct Row<'a> {
            vehicle: &'a str,
            status: &'static str,
            area: Option<&'a str>,
            cycles_off: String,
            distances: String,
        }

        let mut wtr = csv::Writer::from_path(path.as_ref())?;
        for (vehicle, outcome) in &self.outcomes {
            let dev = outcome.deviation();

            let cycles_off = dev
                .map(|d| {
                    let ids: Vec<String> =
                        d.off_track_cycle_ids.iter().map(|c| c.to_string()).collect();
                    ids.join(" ")
                })
                .unwrap_or_default();

            let distances = dev
                .map(|d| {
                    let dists: Vec<String> =
                        d.distances.values().map(|m| m.to_string()).collect();
                    dists.join(" ")
                })
                .unwrap_or_default();

            wtr.serialize(Row {
                vehicle,
                status: outcome.status().into(),
                area: dev.map(|d| d.area_id.as_str()),
                cycles_off,
                distances,
            })?;
        }
        wtr.flush()?;

        Ok(())
    }
}

/// Runs the pipeline with its configuration and collaborators.
pub struct Monitor {
    config: MonitorConfig,
    transects: Vec<TransectDefinition>,
    projection: Box<dyn Projection>,
    notifier: Box<dyn Notifier>,
}

impl Monitor {
    /// A monitor working in SWEREF 99 TM.
    pub fn new(
        config: MonitorConfig,
        transects: Vec<TransectDefinition>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Monitor {
            config,
            transects,
            projection: Box::new(TransverseMercator::SWEREF99_TM),
            notifier,
        }
    }

    pub fn with_projection(mut self, projection: Box<dyn Projection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run the pipeline for one vehicle, without sending anything or touching the alarm state.
    pub fn evaluate<S: TrackSource + ?Sized>(
        &self,
        source: &S,
        state: &AlarmState,
        now: DateTime<Utc>,
    ) -> VehicleOutcome {
        let vehicle_id = source.vehicle_id();

        if state.in_cooldown(vehicle_id, now, self.config.cooldown) {
            if let Some(last_alarm) = state.get_last_alarm(vehicle_id) {
                return VehicleOutcome::Suppressed { last_alarm };
            }
        }

        let track = match source.load_track() {
            Ok(track) => track,
            Err(err) => return VehicleOutcome::Failed(err.to_string()),
        };

        if track.is_empty() {
            return VehicleOutcome::NoPositions;
        }

        let transect = match classify(
            track.points(),
            &self.transects,
            self.config.classification_margin,
            self.projection.as_ref(),
        ) {
            Classification::Assigned(transect) => transect,
            Classification::Unclassified => {
                let closest = closest_waypoint(track.points(), &self.transects)
                    .map(|(area, km)| (area.to_owned(), km));
                return VehicleOutcome::Unclassified { closest };
            }
        };

        VehicleOutcome::Evaluated(detect_deviation(
            &track,
            transect,
            self.config.alert_margin,
            self.config.window,
            now,
            self.projection.as_ref(),
        ))
    }

    /**
     * Evaluate every vehicle, send the alert, and record the alarms in `state`.
     *
     * Saving `state` is left to the caller.
     */
    pub fn run<S: TrackSource>(
        &self,
        sources: &[S],
        state: &mut AlarmState,
        now: DateTime<Utc>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for source in sources {
            let vehicle_id = source.vehicle_id().to_owned();
            let outcome = self.evaluate(source, state, now);
            log_outcome(&vehicle_id, &outcome);

            if let VehicleOutcome::Evaluated(ref res) = outcome {
                if res.is_alert_worthy() {
                    summary.alerts.push(VehicleAlert {
                        vehicle_id: vehicle_id.clone(),
                        result: res.clone(),
                    });
                }
            }

            summary.outcomes.push((vehicle_id, outcome));
        }

        summary.message = compose_message(&summary.alerts);

        if let Some(ref message) = summary.message {
            if self.config.recipients.is_empty() {
                log::warn!("{} vehicles off track but no recipients", summary.alerts.len());
            }

            let report = dispatch(
                self.notifier.as_ref(),
                message,
                &self.config.subject,
                &self.config.recipients,
            );

            if report.any_delivered() {
                for alert in &summary.alerts {
                    state.record_alarm(alert.vehicle_id.clone(), now);
                    summary.recorded.push(alert.vehicle_id.clone());
                }
            } else {
                log::error!("alert reached nobody, alarm records left unchanged");
            }

            summary.dispatch = Some(report);
        }

        summary
    }
}

fn log_outcome(vehicle_id: &str, outcome: &VehicleOutcome) {
    match outcome {
        VehicleOutcome::Suppressed { last_alarm } => {
            log::info!(target: vehicle_id, "skipped, last alarm at {}", last_alarm)
        }
        VehicleOutcome::NoPositions => {
            log::info!(target: vehicle_id, "skipped, no position reports")
        }
        VehicleOutcome::Unclassified { closest: Some((area, km)) } => log::warn!(
            target: vehicle_id,
            "skipped, not near any transect, closest is {} at {:.1} km",
            area,
            km
        ),
        VehicleOutcome::Unclassified { closest: None } => {
            log::warn!(target: vehicle_id, "skipped, not near any transect")
        }
        VehicleOutcome::Failed(err) => {
            log::warn!(target: vehicle_id, "skipped, failed: {}", err)
        }
        VehicleOutcome::Evaluated(res) => {
            let status: &'static str = outcome.status().into();
            log::info!(target: vehicle_id, "{} ({})", status, res)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{geometry::Coord, position::TrackPoint};
    use chrono::TimeZone;

    struct BrokenLog;

    impl TrackSource for BrokenLog {
        fn vehicle_id(&self) -> &str {
            "SEA000_M1"
        }

        fn load_track(&self) -> GliderWatchResult<Track> {
            Err("permission denied".into())
        }
    }

    struct Silent;

    impl Notifier for Silent {
        fn send(&self, _: &str, _: &str, _: &str) -> GliderWatchResult<()> {
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 2, 3, 12, 0, 0).unwrap()
    }

    fn monitor() -> Monitor {
        let transects = vec![TransectDefinition::new(
            "SAMBA_02",
            vec![Coord::new(15.9833, 55.2500), Coord::new(16.3514, 55.5707)],
        )
        .unwrap()];

        Monitor::new(MonitorConfig::default(), transects, Box::new(Silent))
    }

    fn track(vehicle_id: &str, lon: f64, lat: f64) -> Track {
        Track::new(
            vehicle_id,
            vec![TrackPoint {
                vehicle_id: vehicle_id.to_owned(),
                timestamp: now() - Duration::hours(1),
                lon,
                lat,
                cycle_id: 3,
            }],
        )
    }

    #[test]
    fn test_statuses() {
        let monitor = monitor();
        let state = AlarmState::new();

        assert_eq!(
            monitor.evaluate(&BrokenLog, &state, now()).status(),
            VehicleStatus::Failed
        );
        assert_eq!(
            monitor
                .evaluate(&Track::new("SEA001_M1", vec![]), &state, now())
                .status(),
            VehicleStatus::NoPositions
        );
        assert_eq!(
            monitor
                .evaluate(&track("SEA002_M1", 12.0, 57.0), &state, now())
                .status(),
            VehicleStatus::Unclassified
        );
        assert_eq!(
            monitor
                .evaluate(&track("SEA003_M1", 16.17, 55.41), &state, now())
                .status(),
            VehicleStatus::OnTrack
        );
        // About 4 km from the line, inside the classification buffer but off track.
        assert_eq!(
            monitor
                .evaluate(&track("SEA004_M1", 16.22, 55.39), &state, now())
                .status(),
            VehicleStatus::OffTrack
        );
    }

    #[test]
    fn test_failure_does_not_stop_the_run() {
        let monitor = monitor();
        let mut state = AlarmState::new();

        let summary = monitor.run(&[BrokenLog], &mut state, now());
        assert_eq!(summary.outcomes.len(), 1);
        assert!(summary.message.is_none());
        assert!(summary.dispatch.is_none());
        assert!(!summary.dispatch_failed());
        assert!(state.is_empty());
    }

    #[test]
    fn test_no_recipients_records_nothing() {
        let monitor = monitor();
        let mut state = AlarmState::new();

        let summary = monitor.run(&[track("SEA004_M1", 16.22, 55.39)], &mut state, now());
        assert_eq!(summary.alerts.len(), 1);
        assert!(summary.message.is_some());
        assert!(summary.recorded.is_empty());
        assert!(state.is_empty());
    }

    #[test]
    fn test_status_names() {
        let name: &'static str = VehicleStatus::NoRecentCycles.into();
        assert_eq!(name, "no_recent_cycles");
        let name: &'static str = VehicleStatus::OffTrack.into();
        assert_eq!(name, "off_track");
    }
}
