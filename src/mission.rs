/*!
 * Find the missions that are currently running.
 *
 * The data share holds one directory per glider, each with one directory per mission. The
 * command console log of a mission is in its `G-Logs` directory:
 *
 * ```text
 * <root>/SEA063/000045/G-Logs/sea063.45.com.raw.log
 * ```
 *
 * Only the latest mission of each glider is looked at, and only if its log has something recent
 * in it.
 */
use crate::{
    command_log::{CommandLog, RawPositionReport},
    monitor::TrackSource,
    position::Track,
    GliderWatchResult,
};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const LOG_DIR: &str = "G-Logs";
const LOG_SUFFIX: &str = ".com.raw.log";

/// A mission with recent activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveMission {
    pub vehicle_id: String,
    pub log_path: PathBuf,
    /// The newest entry in the log when the mission was found.
    pub last_entry: DateTime<Utc>,
    /// Position reports read along with `last_entry`, normalized only when the track is loaded.
    reports: Vec<RawPositionReport>,
}

impl TrackSource for ActiveMission {
    fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    fn load_track(&self) -> GliderWatchResult<Track> {
        Ok(Track::from_reports(&self.vehicle_id, &self.reports))
    }
}

/// Build a vehicle id like `SEA063_M45` from a log file name like `sea063.45.com.raw.log`.
pub fn vehicle_id_from_log_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(LOG_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }

    match stem.split_once('.') {
        Some((glider, mission)) if !glider.is_empty() && !mission.is_empty() => {
            Some(format!("{}_M{}", glider.to_uppercase(), mission))
        }
        _ => Some(stem.to_uppercase()),
    }
}

/// The immediate children of `dir`, sorted by name.
fn children(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|res| res.ok())
}

/// The log of the most recent mission of one glider, if there is one.
fn latest_mission_log(glider_dir: &Path) -> Option<PathBuf> {
    let latest_mission = children(glider_dir)
        .filter(|entry| entry.file_type().is_dir())
        .last()?;

    children(&latest_mission.path().join(LOG_DIR))
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name().to_string_lossy().ends_with(LOG_SUFFIX))
        .map(|entry| entry.into_path())
}

/**
 * Look through the data share for missions with a log entry newer than `now - freshness`.
 *
 * Gliders without a log in their latest mission are skipped quietly, the logs show up a while
 * after a mission starts. Logs that can not be read are skipped with a warning. Each log is read
 * once, the position reports of an active mission are kept for [TrackSource::load_track].
 */
pub fn find_active_missions<P: AsRef<Path>>(
    root: P,
    now: DateTime<Utc>,
    freshness: Duration,
) -> GliderWatchResult<Vec<ActiveMission>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(format!("data directory {} does not exist", root.display()).into());
    }

    let cutoff = now - freshness;
    let mut active = vec![];

    for glider in children(root).filter(|entry| entry.file_type().is_dir()) {
        let log_path = match latest_mission_log(glider.path()) {
            Some(path) => path,
            None => {
                log::debug!("no command log for {}", glider.path().display());
                continue;
            }
        };

        let file_name = log_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let vehicle_id = match vehicle_id_from_log_name(&file_name) {
            Some(id) => id,
            None => continue,
        };

        let log = match CommandLog::open(&log_path) {
            Ok(log) => log,
            Err(err) => {
                log::warn!("unable to read {}: {}", log_path.display(), err);
                continue;
            }
        };

        match log.latest_entry() {
            Some(last_entry) if last_entry > cutoff => {
                log::debug!("{} active, last entry {}", vehicle_id, last_entry);
                active.push(ActiveMission {
                    vehicle_id,
                    log_path,
                    last_entry,
                    reports: log.position_reports(),
                });
            }
            _ => log::debug!("{} has no recent log entries", vehicle_id),
        }
    }

    Ok(active)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::position::parse_day_first;

    #[test]
    fn test_log_read_once() {
        let root = std::env::temp_dir().join(format!("gliderwatch-mission-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&root);

        let logs = root.join("SEA063").join("000045").join(LOG_DIR);
        std::fs::create_dir_all(&logs).unwrap();
        let log_path = logs.join("sea063.45.com.raw.log");
        std::fs::write(
            &log_path,
            "DATE_TIME;LOG_MSG\n\
             03/02/2023 14:05:09;$SEAMRS,x,y,12,a,b,c,d,5748.192,1119.806*5A\n\
             03/02/2023 15:05:09;$SEAMSG,hello\n",
        )
        .unwrap();

        let now = parse_day_first("03/02/2023 16:00:00").unwrap();
        let missions = find_active_missions(&root, now, Duration::hours(24)).unwrap();
        assert_eq!(missions.len(), 1);
        assert_eq!(missions[0].vehicle_id, "SEA063_M45");
        assert_eq!(missions[0].log_path, log_path);
        assert_eq!(
            Some(missions[0].last_entry),
            parse_day_first("03/02/2023 15:05:09")
        );

        // The track comes from what discovery already read.
        std::fs::remove_dir_all(&root).unwrap();
        let track = missions[0].load_track().unwrap();
        assert_eq!(track.len(), 1);
        assert_eq!(track.points()[0].cycle_id, 12);

        // Too old for the freshness window.
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(&log_path, "DATE_TIME;LOG_MSG\n01/02/2023 14:05:09;$SEAMSG,hi\n").unwrap();
        assert!(find_active_missions(&root, now, Duration::hours(24))
            .unwrap()
            .is_empty());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_vehicle_id_from_log_name() {
        assert_eq!(
            vehicle_id_from_log_name("sea063.45.com.raw.log").as_deref(),
            Some("SEA063_M45")
        );
        assert_eq!(
            vehicle_id_from_log_name("sea069.12.com.raw.log").as_deref(),
            Some("SEA069_M12")
        );
        assert_eq!(
            vehicle_id_from_log_name("sea069.com.raw.log").as_deref(),
            Some("SEA069")
        );
        assert!(vehicle_id_from_log_name("sea063.45.gli.sub.12").is_none());
        assert!(vehicle_id_from_log_name(".com.raw.log").is_none());
    }
}
