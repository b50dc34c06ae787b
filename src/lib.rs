//! Watch glider missions and warn operators when a vehicle wanders off its transect.
//!
//! Each run reads the command console logs of the active missions, works out which transect a
//! glider is flying, checks the most recent dive cycles against a corridor around that transect,
//! and sends one message listing every glider that is off track right now. An alarm database
//! remembers who was already reported so the same glider is not reported again until its cooldown
//! expires.

pub use alarm_database::{AlarmDatabase, AlarmState};
pub use alert::{
    compose_message, dispatch, format_vehicle_alert, DispatchReport, LogNotifier, Notifier,
    ShellMailer, VehicleAlert,
};
pub use classify::{classify, closest_waypoint, Classification};
pub use command_log::{CommandLog, RawPositionReport};
pub use config::{load_recipients, load_transects, parse_transects, TransectDefinition};
pub use deviation::{detect_deviation, summarize_cycles, CycleSummary, DeviationResult};
pub use error::{ConfigError, DispatchError};
pub use geometry::{great_circle_distance, Coord, Corridor, Projection, TransverseMercator};
pub use mission::{find_active_missions, vehicle_id_from_log_name, ActiveMission};
pub use monitor::{
    Monitor, MonitorConfig, RunSummary, TrackSource, VehicleOutcome, VehicleStatus,
    DEFAULT_ALERT_MARGIN_M, DEFAULT_CLASSIFICATION_MARGIN_M, DEFAULT_COOLDOWN_HOURS,
    DEFAULT_FRESHNESS_HOURS, DEFAULT_SUBJECT, DEFAULT_WINDOW_HOURS,
};
pub use position::{dd_coord, parse_day_first, PackedDegrees, Track, TrackPoint};

/// Result type used throughout the crate.
pub type GliderWatchResult<T> = Result<T, Box<dyn std::error::Error>>;

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod alarm_database;
mod alert;
mod classify;
mod command_log;
mod config;
mod deviation;
mod error;
mod geometry;
mod mission;
mod monitor;
mod position;
