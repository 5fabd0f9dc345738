//! Device client for E3METER IPM power strips.
//!
//! Reads the strip temperature and seven electrical quantities for each
//! of the three channels, one scalar GET per value, and scales them to
//! their natural units. Any failed read aborts the whole poll.

use crate::error::{AppError, Result};
use crate::measurement::{ChannelReadings, Metric, RawMeasurement, CHANNEL_COUNT};
use crate::snmp::{error_status_name, GetResponse, Oid, SnmpTransport};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Enterprise subtree of the NETTRACK-E3METER-SNMP-MIB IPM objects.
const E3METER_IPM: &str = "1.3.6.1.4.1.21695.1.10.7";

/// A single scalar object: instance index and divisor applied to the raw value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarSpec {
    pub oid: Oid,
    #[serde(default)]
    pub index: u32,
    pub divisor: f64,
}

/// One per-channel quantity column. The channel number is the instance index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySpec {
    pub metric: Metric,
    pub oid: Oid,
    pub divisor: f64,
}

/// Object identifiers and unit scales of the polled device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSchema {
    pub temperature: ScalarSpec,
    pub quantities: Vec<QuantitySpec>,
}

impl Default for DeviceSchema {
    fn default() -> Self {
        // (metric, column under e3IpmTable, divisor)
        let columns = [
            (Metric::ActivePower, "2.1.5", 1.0),   // e3IpmPowerP
            (Metric::ReactivePower, "2.1.6", 1.0), // e3IpmPowerQ
            (Metric::ComplexPower, "2.1.7", 1.0),  // e3IpmPowerS
            (Metric::Voltage, "2.1.8", 1000.0),    // e3IpmUrms
            (Metric::Current, "2.1.9", 1000.0),    // e3IpmIrms
            (Metric::Frequency, "2.1.10", 1000.0), // e3IpmFrequency
            (Metric::Energy, "2.1.3", 1.0),        // e3IpmEnergyP
        ];
        Self {
            temperature: ScalarSpec {
                oid: ipm_oid("3.1.4"), // e3IpmSensorTemperatureCelsius
                index: 0,
                divisor: 10.0,
            },
            quantities: columns
                .iter()
                .map(|(metric, column, divisor)| QuantitySpec {
                    metric: *metric,
                    oid: ipm_oid(column),
                    divisor: *divisor,
                })
                .collect(),
        }
    }
}

fn ipm_oid(column: &str) -> Oid {
    let arcs = E3METER_IPM
        .split('.')
        .chain(column.split('.'))
        .filter_map(|arc| arc.parse().ok())
        .collect();
    Oid::new(arcs)
}

impl DeviceSchema {
    /// Every fetched quantity must appear exactly once with a usable divisor.
    pub fn validate(&self) -> Result<()> {
        check_divisor("temperature", self.temperature.divisor)?;
        for metric in Metric::QUANTITIES {
            let count = self
                .quantities
                .iter()
                .filter(|q| q.metric == metric)
                .count();
            if count != 1 {
                return Err(AppError::Config(format!(
                    "schema must define '{}' exactly once (found {})",
                    metric, count
                )));
            }
        }
        for q in &self.quantities {
            if q.metric.is_derived() {
                return Err(AppError::Config(format!(
                    "'{}' is derived and cannot be polled",
                    q.metric
                )));
            }
            check_divisor(q.metric.label(), q.divisor)?;
        }
        Ok(())
    }
}

fn check_divisor(name: &str, divisor: f64) -> Result<()> {
    if !divisor.is_finite() || divisor == 0.0 {
        return Err(AppError::Config(format!(
            "divisor for '{}' must be finite and non-zero, got {}",
            name, divisor
        )));
    }
    Ok(())
}

pub struct DeviceClient<T> {
    transport: T,
    schema: DeviceSchema,
}

impl<T: SnmpTransport> DeviceClient<T> {
    pub fn new(transport: T, schema: DeviceSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self { transport, schema })
    }

    /// Poll temperature and all channel quantities.
    #[instrument(skip(self))]
    pub fn fetch(&mut self) -> Result<RawMeasurement> {
        let temp = self.schema.temperature.clone();
        let temperature = self.read_scalar(&temp.oid.child(temp.index))? / temp.divisor;

        let mut values = [[None; 7]; CHANNEL_COUNT];
        let quantities = self.schema.quantities.clone();
        for q in &quantities {
            let slot = quantity_slot(q.metric)?;
            for (channel, channel_values) in values.iter_mut().enumerate() {
                let raw = self.read_scalar(&q.oid.child(channel as u32))?;
                channel_values[slot] = Some(raw / q.divisor);
            }
        }

        let mut channels = [ChannelReadings::new([0.0; 7]); CHANNEL_COUNT];
        for (channel, (out, filled)) in channels.iter_mut().zip(values).enumerate() {
            *out = ChannelReadings::new(complete(channel, filled)?);
        }

        debug!(temperature, "device poll complete");
        Ok(RawMeasurement {
            temperature,
            channels,
        })
    }

    fn read_scalar(&mut self, oid: &Oid) -> Result<f64> {
        let response = self.transport.get(oid)?;
        let value = interpret(oid, response)?;
        debug!(oid = %oid, value, "read scalar");
        Ok(value)
    }
}

fn quantity_slot(metric: Metric) -> Result<usize> {
    Metric::QUANTITIES
        .iter()
        .position(|m| *m == metric)
        .ok_or_else(|| AppError::Config(format!("'{}' is not a polled quantity", metric)))
}

fn complete(channel: usize, filled: [Option<f64>; 7]) -> Result<[f64; 7]> {
    let mut out = [0.0; 7];
    for ((slot, value), metric) in out.iter_mut().zip(filled).zip(Metric::QUANTITIES) {
        *slot = value.ok_or_else(|| {
            AppError::Decode(format!("channel {} is missing '{}'", channel, metric))
        })?;
    }
    Ok(out)
}

/// Turn a GET response into a number. Error status and empty responses
/// are connectivity failures; a non-numeric value is a decode failure.
fn interpret(requested: &Oid, response: GetResponse) -> Result<f64> {
    if response.error_status != 0 {
        let at = response
            .error_index
            .checked_sub(1)
            .and_then(|i| response.varbinds.get(i as usize))
            .map(|(oid, _)| oid.to_string())
            .unwrap_or_else(|| "?".into());
        return Err(AppError::Connectivity(format!(
            "{} at {}",
            error_status_name(response.error_status),
            at
        )));
    }
    let (_, value) = response.varbinds.into_iter().next().ok_or_else(|| {
        AppError::Connectivity(format!("empty response for {}", requested))
    })?;
    value.as_f64().map_err(|e| match e {
        AppError::Decode(msg) => AppError::Decode(format!("{} at {}", msg, requested)),
        other => other,
    })
}
