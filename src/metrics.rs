use crate::measurement::{ChannelSnapshot, Measurement, Metric, RawMeasurement, Sample};
use chrono::{DateTime, Utc};

/// Readings at or below this are treated as zero for power factor purposes.
pub const NEAR_ZERO: f64 = 0.1;

/// Power factor reported when there is not enough load to compute one.
pub const NOMINAL_POWER_FACTOR: i64 = 100;

/// Power factor in percent: active / complex power * 100.
///
/// When either input is at or below [`NEAR_ZERO`] the ratio is unstable,
/// so the result is exactly [`NOMINAL_POWER_FACTOR`].
pub fn power_factor(active: f64, complex: f64) -> Sample {
    if complex <= NEAR_ZERO || active <= NEAR_ZERO {
        Sample::Int(NOMINAL_POWER_FACTOR)
    } else {
        Sample::Float(active / complex * 100.0)
    }
}

/// Complete a raw poll with derived metrics for every channel.
pub fn derive(raw: &RawMeasurement, taken_at: DateTime<Utc>) -> Measurement {
    let channels = raw.channels.map(|readings| {
        let active = readings.get(Metric::ActivePower).unwrap_or_default();
        let complex = readings.get(Metric::ComplexPower).unwrap_or_default();
        ChannelSnapshot::from_readings(&readings, power_factor(active, complex))
    });
    Measurement {
        taken_at,
        temperature: raw.temperature,
        channels,
    }
}
