use crate::measurement::{Measurement, Metric};
use crate::verdict::Verdict;

/// Performance data for every channel and metric, space separated.
pub fn perf_data(measurement: &Measurement) -> String {
    let mut entries = Vec::with_capacity(measurement.channels.len() * Metric::ALL.len());
    for (index, channel) in measurement.channels.iter().enumerate() {
        for metric in Metric::ALL {
            entries.push(format!(
                "'channel {} {}'={}{}",
                index,
                metric.label(),
                channel.get(metric),
                metric.unit()
            ));
        }
    }
    entries.join(" ")
}

/// Status line without performance data.
pub fn status_line(verdict: &Verdict) -> String {
    match &verdict.message {
        Some(message) => format!("{} - {}", verdict.status, message),
        None => verdict.status.to_string(),
    }
}

/// Full plugin output for a completed check:
/// `<STATUS>[ - <message>] | <perf data>`.
pub fn render(verdict: &Verdict, measurement: &Measurement) -> String {
    format!("{} | {}", status_line(verdict), perf_data(measurement))
}
