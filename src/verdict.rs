use crate::error::{AppError, Result};
use crate::history::RollingAverage;
use crate::measurement::{Measurement, Metric, CHANNEL_COUNT};
use std::fmt;

pub const DEFAULT_WARN_THRESHOLD: f64 = 0.05;
pub const DEFAULT_CRIT_THRESHOLD: f64 = 0.25;

/// Average current (A) below which a channel has no usable baseline.
pub const MIN_BASELINE_CURRENT: f64 = 0.1;

/// Monitoring plugin state, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    pub fn exit_code(self) -> u8 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Relative deviation allowed from the average current, as fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warn: f64,
    pub crit: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn: DEFAULT_WARN_THRESHOLD,
            crit: DEFAULT_CRIT_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("warning", self.warn), ("critical", self.crit)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Config(format!(
                    "{} threshold must be a non-negative fraction, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: Status,
    pub message: Option<String>,
}

impl Verdict {
    pub fn ok() -> Self {
        Self {
            status: Status::Ok,
            message: None,
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: Status::Unknown,
            message: Some(message.into()),
        }
    }
}

/// True when `value` is on or beyond `avg * (1 - fraction)` or `avg * (1 + fraction)`.
fn breaches(value: f64, avg: f64, fraction: f64) -> bool {
    value <= avg * (1.0 - fraction) || value >= avg * (1.0 + fraction)
}

/// Compare per-channel current against its average.
///
/// Without an average (first run) the result is OK. Channels whose average
/// current is at or below [`MIN_BASELINE_CURRENT`] carry no usable baseline and are
/// skipped. The first channel breaching a threshold decides the verdict.
pub fn evaluate(
    current: &Measurement,
    average: Option<&RollingAverage>,
    thresholds: &Thresholds,
) -> Verdict {
    let Some(average) = average else {
        return Verdict::ok();
    };
    for channel in 0..CHANNEL_COUNT {
        let avg = average.value(channel, Metric::Current);
        if avg <= MIN_BASELINE_CURRENT {
            continue;
        }
        let now = current.channels[channel].value(Metric::Current);
        let status = if breaches(now, avg, thresholds.crit) {
            Status::Critical
        } else if breaches(now, avg, thresholds.warn) {
            Status::Warning
        } else {
            continue;
        };
        return Verdict {
            status,
            message: Some(format!(
                "Channel {} current is {:.2} but average is {:.2}",
                channel, now, avg
            )),
        };
    }
    Verdict::ok()
}
