use crate::config::Settings;
use crate::device::DeviceClient;
use crate::error::{AppError, Result};
use crate::history::{HistoryStore, HistoryWindow};
use crate::measurement::Measurement;
use crate::metrics;
use crate::report;
use crate::snmp::{SnmpTransport, UdpTransport};
use crate::verdict::{self, Status, Thresholds, Verdict};
use chrono::Utc;
use tracing::{debug, error, info, warn};

/// Result of a check run that reached the device.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub verdict: Verdict,
    pub measurement: Measurement,
    /// Whether the measurement joined the history window.
    pub appended: bool,
    /// Window length after this run.
    pub history_len: usize,
}

/// What the plugin prints and how it exits.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    pub line: String,
}

pub struct Check<T> {
    client: DeviceClient<T>,
    store: HistoryStore,
    thresholds: Thresholds,
    interval: usize,
}

impl<T: SnmpTransport> Check<T> {
    pub fn new(
        client: DeviceClient<T>,
        store: HistoryStore,
        thresholds: Thresholds,
        interval: usize,
    ) -> Self {
        Self {
            client,
            store,
            thresholds,
            interval,
        }
    }

    /// Poll the device and judge the reading against the stored history.
    ///
    /// A failed poll returns before the state file is touched. State file
    /// problems never fail the run: an unreadable history counts as empty and
    /// a failed write drops this run's update.
    pub fn run(&mut self) -> Result<CheckResult> {
        let raw = self.client.fetch()?;
        let measurement = metrics::derive(&raw, Utc::now());

        let mut window = self.store.load().unwrap_or_else(|e| {
            warn!(error = %e, "history will not be available for this run");
            HistoryWindow::new()
        });
        let average = window.average();
        let verdict = verdict::evaluate(&measurement, average.as_ref(), &self.thresholds);

        // Alerting readings stay out of the baseline.
        let appended = verdict.status == Status::Ok;
        if appended {
            window.append(measurement.clone(), self.interval);
        }
        if let Err(e) = self.store.store(&window) {
            warn!(error = %e, "history update not saved");
        }

        info!(
            status = %verdict.status,
            samples = average.as_ref().map(|a| a.samples).unwrap_or(0),
            appended,
            "check complete"
        );
        Ok(CheckResult {
            verdict,
            measurement,
            appended,
            history_len: window.len(),
        })
    }
}

/// Connect to the device described by `settings` and run the check.
pub fn run_check(settings: &Settings) -> Result<CheckResult> {
    let transport = UdpTransport::connect(&settings.session)?;
    let client = DeviceClient::new(transport, settings.schema.clone())?;
    let store = HistoryStore::new(&settings.statefile);
    Check::new(client, store, settings.thresholds, settings.interval).run()
}

/// Map a run result to plugin output.
///
/// Connectivity failures become UNKNOWN naming the address. Other errors
/// become a terse UNKNOWN, or are handed back to the caller in debug mode.
pub fn conclude(result: Result<CheckResult>, address: &str, debug_mode: bool) -> Result<Outcome> {
    match result {
        Ok(done) => Ok(Outcome {
            status: done.verdict.status,
            line: report::render(&done.verdict, &done.measurement),
        }),
        Err(e) if e.is_connectivity() => {
            debug!(address, error = %e, "device unreachable");
            Ok(unknown(format!("Couldn't connect to {}!", address)))
        }
        Err(e) if debug_mode => Err(e),
        Err(e) => {
            error!(error = %e, "check failed");
            Ok(unknown("Check failed"))
        }
    }
}

fn unknown(message: impl Into<String>) -> Outcome {
    let verdict = Verdict::unknown(message);
    Outcome {
        status: verdict.status,
        line: report::status_line(&verdict),
    }
}

/// Run the check for `settings` and produce the plugin outcome.
pub fn execute(settings: &Settings) -> std::result::Result<Outcome, AppError> {
    conclude(run_check(settings), settings.address(), settings.debug)
}
