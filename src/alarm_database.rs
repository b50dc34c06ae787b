/*!
 * Remember when each vehicle was last reported.
 *
 * The whole table is read once at the start of a run into an [AlarmState], changed in memory, and
 * written back once at the end. Writing replaces the table inside a single transaction, so another
 * connection reading the file sees either the old table or the new one.
 */
use crate::GliderWatchResult;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OpenFlags};
use rustc_hash::FxHashMap as HashMap;
use std::path::Path;

/// The time of the last alarm for every vehicle that has ever been reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmState {
    last_alarms: HashMap<String, DateTime<Utc>>,
}

impl AlarmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_last_alarm(&self, vehicle_id: &str) -> Option<DateTime<Utc>> {
        self.last_alarms.get(vehicle_id).copied()
    }

    /// Record an alarm, replacing any earlier one for the same vehicle.
    pub fn record_alarm<S: Into<String>>(&mut self, vehicle_id: S, timestamp: DateTime<Utc>) {
        self.last_alarms.insert(vehicle_id.into(), timestamp);
    }

    /// Forget a vehicle, returns the time of its last alarm if there was one.
    pub fn clear(&mut self, vehicle_id: &str) -> Option<DateTime<Utc>> {
        self.last_alarms.remove(vehicle_id)
    }

    /// True if the vehicle was reported less than `cooldown` before `now`.
    pub fn in_cooldown(&self, vehicle_id: &str, now: DateTime<Utc>, cooldown: Duration) -> bool {
        match self.get_last_alarm(vehicle_id) {
            Some(last) => now - last < cooldown,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.last_alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_alarms.is_empty()
    }

    /// Every record, sorted by vehicle id.
    pub fn records(&self) -> Vec<(&str, DateTime<Utc>)> {
        let mut records: Vec<(&str, DateTime<Utc>)> = self
            .last_alarms
            .iter()
            .map(|(id, ts)| (id.as_str(), *ts))
            .collect();
        records.sort_unstable_by(|a, b| a.0.cmp(b.0));
        records
    }
}

/// A connection to the file holding the alarm records.
pub struct AlarmDatabase {
    conn: Connection,
}

impl AlarmDatabase {
    /// Open the database, creating the file and table if they don't exist yet.
    pub fn connect<P: AsRef<Path>>(path: P) -> GliderWatchResult<Self> {
        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // Only one run should ever have the file open for writing.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("alarm_database/create_alarm_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(AlarmDatabase { conn })
    }

    /// Read every record. A row that can't be understood is an error, not something to skip.
    pub fn load(&self) -> GliderWatchResult<AlarmState> {
        const QUERY: &str = include_str!("alarm_database/query_alarms.sql");
        let mut stmt = self.conn.prepare(QUERY)?;

        let rows = stmt.query_and_then([], |row| -> GliderWatchResult<(String, DateTime<Utc>)> {
            let vehicle_id: String = row.get(0)?;
            let last_alarm: String = row.get(1)?;

            let last_alarm = DateTime::parse_from_rfc3339(&last_alarm)
                .map_err(|err| {
                    format!(
                        "invalid alarm time for {}: '{}' ({})",
                        vehicle_id, last_alarm, err
                    )
                })?
                .with_timezone(&Utc);

            Ok((vehicle_id, last_alarm))
        })?;

        let mut state = AlarmState::new();
        for row in rows {
            let (vehicle_id, last_alarm) = row?;
            state.record_alarm(vehicle_id, last_alarm);
        }

        Ok(state)
    }

    /// Replace the stored records with `state`.
    pub fn save(&mut self, state: &AlarmState) -> GliderWatchResult<()> {
        const CLEAR_QUERY: &str = include_str!("alarm_database/clear_alarms.sql");
        const ADD_QUERY: &str = include_str!("alarm_database/add_alarm.sql");

        let tx = self.conn.transaction()?;
        tx.execute(CLEAR_QUERY, [])?;
        {
            let mut stmt = tx.prepare(ADD_QUERY)?;
            for (vehicle_id, last_alarm) in state.records() {
                let last_alarm = last_alarm.to_rfc3339_opts(SecondsFormat::AutoSi, true);
                stmt.execute(params![vehicle_id, last_alarm])?;
            }
        }
        tx.commit()?;

        Ok(())
    }
}
