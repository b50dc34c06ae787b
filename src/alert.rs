/*!
 * Write the alert message and hand it to the operators.
 *
 * Formatting is pure. Sending goes through a [Notifier] so the message can be checked without
 * mailing anyone.
 */
use crate::{deviation::DeviationResult, error::DispatchError, GliderWatchResult};
use std::{
    fmt::Write,
    path::{Path, PathBuf},
    process::Command,
};

/// A vehicle that is off track right now.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleAlert {
    pub vehicle_id: String,
    pub result: DeviationResult,
}

/// One line describing an off track vehicle, its off track dives, and how far out each one was.
pub fn format_vehicle_alert(vehicle_id: &str, result: &DeviationResult) -> String {
    let mut msg = format!(
        "The glider {} is off the transect {}",
        vehicle_id, result.area_id
    );

    if let Some(latest) = result.latest_cycle_id {
        let _ = write!(&mut msg, " (latest dive {})", latest);
    }

    let dives: Vec<String> = result
        .off_track_cycle_ids
        .iter()
        .map(|cycle| match result.distances.get(cycle) {
            Some(dist) => format!("dive {} at {} m", cycle, dist),
            None => format!("dive {}", cycle),
        })
        .collect();

    let _ = write!(&mut msg, ": {}", dives.join(", "));

    msg
}

/// The whole message for a run, `None` if nobody is off track.
pub fn compose_message(alerts: &[VehicleAlert]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }

    let lines: Vec<String> = alerts
        .iter()
        .map(|alert| format_vehicle_alert(&alert.vehicle_id, &alert.result))
        .collect();

    Some(lines.join("\n"))
}

/// Something that can deliver a message to a recipient.
pub trait Notifier {
    fn send(&self, message: &str, subject: &str, recipient: &str) -> GliderWatchResult<()>;
}

/// Deliver messages through the operators' mail script.
///
/// The script is called as `<shell> <script> <message> <subject> <recipient>`, the same way the
/// pilots call it by hand. Mail and Slack channel addresses both go through it.
#[derive(Debug, Clone)]
pub struct ShellMailer {
    shell: PathBuf,
    script: PathBuf,
}

impl ShellMailer {
    pub fn new<P: AsRef<Path>>(script: P) -> Self {
        ShellMailer {
            shell: PathBuf::from("/usr/bin/bash"),
            script: script.as_ref().to_path_buf(),
        }
    }

    pub fn with_shell<P: AsRef<Path>>(mut self, shell: P) -> Self {
        self.shell = shell.as_ref().to_path_buf();
        self
    }
}

impl Notifier for ShellMailer {
    fn send(&self, message: &str, subject: &str, recipient: &str) -> GliderWatchResult<()> {
        let status = Command::new(&self.shell)
            .arg(&self.script)
            .arg(message)
            .arg(subject)
            .arg(recipient)
            .status()
            .map_err(|err| DispatchError {
                recipient: recipient.to_owned(),
                msg: format!("unable to run {}: {}", self.script.display(), err),
            })?;

        if !status.success() {
            return Err(Box::new(DispatchError {
                recipient: recipient.to_owned(),
                msg: format!("{} exited with {}", self.script.display(), status),
            }));
        }

        Ok(())
    }
}

/// Only log the message, nothing leaves the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, message: &str, subject: &str, recipient: &str) -> GliderWatchResult<()> {
        log::info!("[not sent] to: {} subject: {}\n{}", recipient, subject, message);
        Ok(())
    }
}

/// Which recipients got the message.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<DispatchError>,
}

impl DispatchReport {
    /// Did the message reach anyone at all?
    pub fn any_delivered(&self) -> bool {
        !self.delivered.is_empty()
    }

    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send `message` to every recipient in order.
///
/// A failure is logged and the remaining recipients are still tried. Nothing is retried.
pub fn dispatch<N: Notifier + ?Sized>(
    notifier: &N,
    message: &str,
    subject: &str,
    recipients: &[String],
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for recipient in recipients {
        match notifier.send(message, subject, recipient) {
            Ok(()) => {
                log::info!("alert sent to {}", recipient);
                report.delivered.push(recipient.clone());
            }
            Err(err) => {
                log::error!("alert NOT sent to {}: {}", recipient, err);
                report.failed.push(DispatchError {
                    recipient: recipient.clone(),
                    msg: err.to_string(),
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        cell::RefCell,
        collections::{BTreeMap, BTreeSet},
    };

    fn result() -> DeviationResult {
        DeviationResult {
            area_id: "SAMBA_01".to_owned(),
            off_track_cycle_ids: BTreeSet::from([11, 12]),
            distances: BTreeMap::from([(11, 250), (12, 1730)]),
            latest_cycle_id: Some(12),
        }
    }

    struct Flaky {
        down: &'static str,
        sent: RefCell<Vec<String>>,
    }

    impl Notifier for Flaky {
        fn send(&self, _message: &str, _subject: &str, recipient: &str) -> GliderWatchResult<()> {
            if recipient == self.down {
                return Err("connection refused".into());
            }
            self.sent.borrow_mut().push(recipient.to_owned());
            Ok(())
        }
    }

    #[test]
    fn test_format_vehicle_alert() {
        assert_eq!(
            format_vehicle_alert("SEA063_M45", &result()),
            "The glider SEA063_M45 is off the transect SAMBA_01 (latest dive 12): \
             dive 11 at 250 m, dive 12 at 1730 m"
        );

        let mut res = result();
        res.distances.remove(&11);
        assert!(format_vehicle_alert("SEA063_M45", &res).contains(": dive 11, dive 12 at 1730 m"));
    }

    #[test]
    fn test_compose_message() {
        assert!(compose_message(&[]).is_none());

        let alerts = vec![
            VehicleAlert {
                vehicle_id: "SEA063_M45".to_owned(),
                result: result(),
            },
            VehicleAlert {
                vehicle_id: "SEA069_M12".to_owned(),
                result: result(),
            },
        ];

        let msg = compose_message(&alerts).unwrap();
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("The glider SEA063_M45 "));
        assert!(lines[1].starts_with("The glider SEA069_M12 "));
    }

    #[test]
    fn test_dispatch_keeps_going_after_failure() {
        let notifier = Flaky {
            down: "a@example.org",
            sent: RefCell::new(vec![]),
        };
        let recipients = vec!["a@example.org".to_owned(), "b@example.org".to_owned()];

        let report = dispatch(&notifier, "msg", "subject", &recipients);
        assert!(report.any_delivered());
        assert!(!report.all_delivered());
        assert_eq!(report.delivered, ["b@example.org"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].recipient, "a@example.org");
        assert_eq!(*notifier.sent.borrow(), ["b@example.org"]);

        let report = dispatch(&notifier, "msg", "subject", &recipients[..1]);
        assert!(!report.any_delivered());
    }

    #[test]
    fn test_shell_mailer_reports_missing_script() {
        let mailer = ShellMailer::new("/nonexistent/send_mail.sh")
            .with_shell("/nonexistent/shell/for/gliderwatch");
        assert!(mailer.send("msg", "subject", "a@example.org").is_err());
    }
}
