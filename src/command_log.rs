/*!
 * Read the command console log recovered from a glider.
 *
 * The log is a `;` separated table with a header. Only two columns matter here: `DATE_TIME`, a
 * day-first timestamp, and `LOG_MSG`, the raw NMEA-like sentence sent by the vehicle. Position
 * reports are the `$SEAMRS` sentences.
 */
use crate::{position::parse_day_first, GliderWatchResult};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::{io::Read, path::Path};

const POSITION_SENTENCE: &str = "$SEAMRS";
const CYCLE_FIELD: usize = 3;
const LAT_FIELD: usize = 8;
const LON_FIELD: usize = 9;

/// The fields of one position report, still as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPositionReport {
    pub date_time: String,
    pub cycle: String,
    pub lat: String,
    pub lon: String,
}

#[derive(Debug, Deserialize)]
struct LogRow {
    #[serde(rename = "DATE_TIME")]
    date_time: String,
    #[serde(rename = "LOG_MSG", default)]
    log_msg: String,
}

/// The rows of a command console log.
#[derive(Debug, Default)]
pub struct CommandLog {
    rows: Vec<LogRow>,
}

impl CommandLog {
    pub fn open<P: AsRef<Path>>(path: P) -> GliderWatchResult<Self> {
        let f = std::fs::File::open(path.as_ref())?;
        Self::from_reader(f)
    }

    pub fn from_reader<R: Read>(rdr: R) -> GliderWatchResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(rdr);

        // Make sure the columns we need are there at all before going row by row.
        let headers = rdr.headers()?;
        if !headers.iter().any(|h| h == "DATE_TIME") {
            return Err("command log has no DATE_TIME column".into());
        }

        let rows = rdr
            .deserialize::<LogRow>()
            .filter_map(|res| res.ok())
            .collect();

        Ok(CommandLog { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The newest timestamp of any row, regardless of the kind of message.
    pub fn latest_entry(&self) -> Option<DateTime<Utc>> {
        self.rows
            .iter()
            .filter_map(|row| parse_day_first(&row.date_time))
            .max()
    }

    /// Pull the position reports out of the log, in file order.
    pub fn position_reports(&self) -> Vec<RawPositionReport> {
        self.rows
            .iter()
            .filter_map(|row| {
                let fields: Vec<&str> = row.log_msg.split(',').collect();
                if fields.first().map(|f| f.trim()) != Some(POSITION_SENTENCE) {
                    return None;
                }

                let field = |i: usize| -> String {
                    fields
                        .get(i)
                        .and_then(|f| f.split('*').next())
                        .unwrap_or("")
                        .trim()
                        .to_owned()
                };

                Some(RawPositionReport {
                    date_time: row.date_time.clone(),
                    cycle: field(CYCLE_FIELD),
                    lat: field(LAT_FIELD),
                    lon: field(LON_FIELD),
                })
            })
            .collect()
    }
}
