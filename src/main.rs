use chrono::{Duration, Utc};
use clap::Parser;
use gliderwatch::{
    find_active_missions, load_recipients, load_transects, AlarmDatabase, GliderWatchResult,
    LogNotifier, Monitor, MonitorConfig, Notifier, ShellMailer,
};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Check active glider missions and alert if a glider is off its transect.
///
/// This program is meant to be run periodically. It finds the latest mission of every glider on
/// the data share, checks the recent dives against the configured transects, and sends one
/// message listing every glider that is off track on its latest dive. A glider is reported at most
/// once per cooldown period.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "gliderwatch")]
#[clap(author, version, about)]
struct GliderWatchOptionsInit {
    /// The directory with one sub-directory per glider.
    ///
    /// If this is not specified, then the program will check for it in the "GLIDER_DATA"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "GLIDER_DATA")]
    data_dir: PathBuf,

    /// The JSON file with the transect waypoints.
    #[clap(short, long)]
    #[clap(env = "GLIDER_WAYPOINTS")]
    waypoints: PathBuf,

    /// The path to the alarm database file. It is created if it doesn't exist.
    #[clap(short, long)]
    #[clap(env = "GLIDER_ALARM_DB")]
    alarm_db: PathBuf,

    /// Somebody to notify, may be given more than once.
    #[clap(short, long)]
    recipient: Vec<String>,

    /// A file with more recipients, one per line.
    #[clap(long)]
    #[clap(env = "GLIDER_RECIPIENTS")]
    recipients_file: Option<PathBuf>,

    /// The script used to send messages, called as `script <message> <subject> <recipient>`.
    #[clap(short, long)]
    #[clap(env = "GLIDER_MAIL_SCRIPT")]
    mail_script: Option<PathBuf>,

    /// Half-width of the corridor around a transect in meters.
    #[clap(long, parse(try_from_str=parse_meters))]
    #[clap(default_value_t=gliderwatch::DEFAULT_ALERT_MARGIN_M)]
    alert_margin: f64,

    /// Buffer used to decide which transect a glider is on in meters.
    #[clap(long, parse(try_from_str=parse_meters))]
    #[clap(default_value_t=gliderwatch::DEFAULT_CLASSIFICATION_MARGIN_M)]
    classification_margin: f64,

    /// Only dives this many hours old or newer are checked.
    #[clap(long, parse(try_from_str=parse_hours))]
    #[clap(default_value_t=gliderwatch::DEFAULT_WINDOW_HOURS)]
    window_hours: i64,

    /// Hours before the same glider can be reported again.
    #[clap(long, parse(try_from_str=parse_hours))]
    #[clap(default_value_t=gliderwatch::DEFAULT_COOLDOWN_HOURS)]
    cooldown_hours: i64,

    /// A mission is active if its log has an entry this many hours old or newer.
    #[clap(long, parse(try_from_str=parse_hours))]
    #[clap(default_value_t=gliderwatch::DEFAULT_FRESHNESS_HOURS)]
    freshness_hours: i64,

    /// Write a table with the result for every glider to this CSV file.
    #[clap(long)]
    summary_csv: Option<PathBuf>,

    /// Log the message instead of sending it and leave the alarm database alone.
    #[clap(long)]
    dry_run: bool,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

fn parse_meters(text: &str) -> Result<f64, String> {
    let meters: f64 = text.parse().map_err(|_| format!("not a number: {}", text))?;
    if !meters.is_finite() || meters <= 0.0 {
        return Err(format!("must be a positive distance: {}", text));
    }
    Ok(meters)
}

fn parse_hours(text: &str) -> Result<i64, String> {
    let hours: i64 = text.parse().map_err(|_| format!("not a whole number: {}", text))?;
    if hours <= 0 {
        return Err(format!("must be a positive number of hours: {}", text));
    }
    Ok(hours)
}

#[derive(Debug)]
struct GliderWatchOptionsChecked {
    data_dir: PathBuf,
    waypoints: PathBuf,
    alarm_db: PathBuf,
    /// `None` for a dry run.
    mail_script: Option<PathBuf>,
    freshness: Duration,
    summary_csv: Option<PathBuf>,
    config: MonitorConfig,
    verbose: bool,
}

impl Display for GliderWatchOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "        Data: {}", self.data_dir.display())?;
        writeln!(f, "   Waypoints: {}", self.waypoints.display())?;
        writeln!(f, "    Alarm DB: {}", self.alarm_db.display())?;
        match self.mail_script {
            Some(ref script) => writeln!(f, " Mail Script: {}", script.display())?,
            None => writeln!(f, " Mail Script: none, dry run")?,
        }
        writeln!(f, "  Recipients: {}", self.config.recipients.join(", "))?;
        writeln!(f, "    Corridor: {:.0} m", self.config.alert_margin)?;
        writeln!(f, "Assign Range: {:.0} m", self.config.classification_margin)?;
        writeln!(f, "      Window: {} hours", self.config.window.num_hours())?;
        writeln!(f, "    Cooldown: {} hours", self.config.cooldown.num_hours())?;
        writeln!(f, "   Freshness: {} hours", self.freshness.num_hours())?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables.
fn parse_args() -> GliderWatchResult<GliderWatchOptionsChecked> {
    let GliderWatchOptionsInit {
        data_dir,
        waypoints,
        alarm_db,
        mut recipient,
        recipients_file,
        mail_script,
        alert_margin,
        classification_margin,
        window_hours,
        cooldown_hours,
        freshness_hours,
        summary_csv,
        dry_run,
        verbose,
    } = GliderWatchOptionsInit::parse();

    if let Some(path) = recipients_file {
        recipient.extend(load_recipients(&path)?);
    }

    let mail_script = if dry_run {
        None
    } else {
        Some(mail_script.ok_or("a mail script is required unless this is a dry run")?)
    };

    if recipient.is_empty() {
        return Err("no recipients given".into());
    }

    let config = MonitorConfig {
        classification_margin,
        alert_margin,
        window: Duration::hours(window_hours),
        cooldown: Duration::hours(cooldown_hours),
        recipients: recipient,
        ..MonitorConfig::default()
    };

    Ok(GliderWatchOptionsChecked {
        data_dir,
        waypoints,
        alarm_db,
        mail_script,
        freshness: Duration::hours(freshness_hours),
        summary_csv,
        config,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> GliderWatchResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    if opts.config.alert_margin >= opts.config.classification_margin {
        warn!(
            "the corridor ({} m) is not narrower than the assignment range ({} m)",
            opts.config.alert_margin, opts.config.classification_margin
        );
    }

    let now = Utc::now();
    info!("Starting glider transect check at {}", now);

    let transects = load_transects(&opts.waypoints)?;
    info!("Loaded {} transects", transects.len());

    // Everything after this depends on knowing who was already reported, so no fallback here.
    let mut alarm_db = AlarmDatabase::connect(&opts.alarm_db)?;
    let mut alarm_state = alarm_db.load()?;

    let missions = find_active_missions(&opts.data_dir, now, opts.freshness)?;
    info!("Found {} active missions", missions.len());

    let notifier: Box<dyn Notifier> = match opts.mail_script {
        Some(ref script) => Box::new(ShellMailer::new(script)),
        None => Box::new(LogNotifier),
    };

    let monitor = Monitor::new(opts.config.clone(), transects, notifier);
    let summary = monitor.run(&missions, &mut alarm_state, now);

    if opts.mail_script.is_some() {
        alarm_db.save(&alarm_state)?;
    }

    if let Some(ref path) = opts.summary_csv {
        summary.write_csv(path)?;
    }

    match summary.message {
        Some(_) => info!(
            "End of check, {} gliders off track, alert sent to {} of {} recipients",
            summary.alerts.len(),
            summary
                .dispatch
                .as_ref()
                .map(|report| report.delivered.len())
                .unwrap_or(0),
            opts.config.recipients.len()
        ),
        None => info!("End of check, no gliders off track"),
    }

    if let Some(ref report) = summary.dispatch {
        if !report.all_delivered() {
            let failed: Vec<&str> = report.failed.iter().map(|f| f.recipient.as_str()).collect();
            return Err(format!("alert could not be sent to: {}", failed.join(", ")).into());
        }
    }

    Ok(())
}
