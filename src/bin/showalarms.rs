use chrono::{Duration, Utc};
use clap::Parser;
use gliderwatch::{AlarmDatabase, GliderWatchResult, DEFAULT_COOLDOWN_HOURS};
use log::{info, warn};
use simple_logger::SimpleLogger;
use std::path::PathBuf;

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Show the alarm records kept by gliderwatch.
///
/// Lists when each glider was last reported and whether it is still in its cooldown. A record can
/// be cleared so the glider is checked again on the next run.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "showalarms")]
#[clap(author, version, about)]
struct ShowAlarmsOptions {
    /// The path to the alarm database file.
    ///
    /// If this is not specified, then the program will check for it in the "GLIDER_ALARM_DB"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "GLIDER_ALARM_DB")]
    alarm_db: PathBuf,

    /// Remove the record for this vehicle, e.g. SEA063_M45.
    #[clap(long)]
    clear: Option<String>,

    /// The cooldown used to flag recent alarms, in hours.
    #[clap(long)]
    #[clap(default_value_t=DEFAULT_COOLDOWN_HOURS)]
    cooldown_hours: i64,
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> GliderWatchResult<()> {
    SimpleLogger::new().init()?;

    let opts = ShowAlarmsOptions::parse();

    let mut db = AlarmDatabase::connect(&opts.alarm_db)?;
    let mut state = db.load()?;

    if let Some(ref vehicle_id) = opts.clear {
        match state.clear(vehicle_id) {
            Some(last) => {
                db.save(&state)?;
                info!("Cleared {}, last alarm was {}", vehicle_id, last);
            }
            None => warn!("No record for {}", vehicle_id),
        }
    }

    let now = Utc::now();
    let cooldown = Duration::hours(opts.cooldown_hours);

    println!("{:<12} {:<26} {}", "Vehicle", "Last Alarm", "Status");
    for (vehicle_id, last) in state.records() {
        let status = if state.in_cooldown(vehicle_id, now, cooldown) {
            "cooldown"
        } else {
            "expired"
        };
        println!("{:<12} {:<26} {}", vehicle_id, last.to_rfc3339(), status);
    }

    if state.is_empty() {
        println!("No alarms recorded.");
    }

    Ok(())
}
