//! Measurement types shared by the device client, history and report.
//!
//! A [`Measurement`] always holds exactly [`CHANNEL_COUNT`] fully
//! populated [`ChannelSnapshot`]s. There is no partially filled variant:
//! the device client either produces a complete snapshot or fails.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of phases monitored on the power strip.
pub const CHANNEL_COUNT: usize = 3;

/// Every value reported per channel, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ActivePower,
    ReactivePower,
    ComplexPower,
    Voltage,
    Current,
    Frequency,
    Energy,
    PowerFactor,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::ActivePower,
        Metric::ReactivePower,
        Metric::ComplexPower,
        Metric::Voltage,
        Metric::Current,
        Metric::Frequency,
        Metric::Energy,
        Metric::PowerFactor,
    ];

    /// Metrics read from the device. Power factor is derived.
    pub const QUANTITIES: [Metric; 7] = [
        Metric::ActivePower,
        Metric::ReactivePower,
        Metric::ComplexPower,
        Metric::Voltage,
        Metric::Current,
        Metric::Frequency,
        Metric::Energy,
    ];

    /// Performance data label.
    pub fn label(self) -> &'static str {
        match self {
            Metric::ActivePower => "active power",
            Metric::ReactivePower => "reactive power",
            Metric::ComplexPower => "complex power",
            Metric::Voltage => "voltage",
            Metric::Current => "current",
            Metric::Frequency => "frequency",
            Metric::Energy => "total power consumption",
            Metric::PowerFactor => "power factor",
        }
    }

    /// Unit of measurement appended to the performance data value.
    pub fn unit(self) -> &'static str {
        match self {
            Metric::PowerFactor => "%",
            _ => "",
        }
    }

    pub fn is_derived(self) -> bool {
        self == Metric::PowerFactor
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single numeric value. Integers render without decimals, floats
/// with two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sample {
    Int(i64),
    Float(f64),
}

impl Sample {
    pub fn as_f64(self) -> f64 {
        match self {
            Sample::Int(v) => v as f64,
            Sample::Float(v) => v,
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Int(v) => write!(f, "{}", v),
            Sample::Float(v) => write!(f, "{:.2}", v),
        }
    }
}

/// Scaled device quantities for one channel, before derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReadings {
    values: [f64; 7],
}

impl ChannelReadings {
    /// Build from values ordered like [`Metric::QUANTITIES`].
    pub fn new(values: [f64; 7]) -> Self {
        Self { values }
    }

    /// Value of a fetched quantity. Returns `None` for derived metrics.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        if metric.is_derived() {
            None
        } else {
            Some(self.values[metric.index()])
        }
    }
}

/// All metrics of one phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub active_power: Sample,
    pub reactive_power: Sample,
    pub complex_power: Sample,
    pub voltage: Sample,
    pub current: Sample,
    pub frequency: Sample,
    pub energy: Sample,
    pub power_factor: Sample,
}

impl ChannelSnapshot {
    pub fn from_readings(readings: &ChannelReadings, power_factor: Sample) -> Self {
        let q = |m: Metric| Sample::Float(readings.values[m.index()]);
        Self {
            active_power: q(Metric::ActivePower),
            reactive_power: q(Metric::ReactivePower),
            complex_power: q(Metric::ComplexPower),
            voltage: q(Metric::Voltage),
            current: q(Metric::Current),
            frequency: q(Metric::Frequency),
            energy: q(Metric::Energy),
            power_factor,
        }
    }

    /// Snapshot with every metric set to the same float value.
    pub fn uniform(value: f64) -> Self {
        let v = Sample::Float(value);
        Self {
            active_power: v,
            reactive_power: v,
            complex_power: v,
            voltage: v,
            current: v,
            frequency: v,
            energy: v,
            power_factor: v,
        }
    }

    pub fn get(&self, metric: Metric) -> Sample {
        match metric {
            Metric::ActivePower => self.active_power,
            Metric::ReactivePower => self.reactive_power,
            Metric::ComplexPower => self.complex_power,
            Metric::Voltage => self.voltage,
            Metric::Current => self.current,
            Metric::Frequency => self.frequency,
            Metric::Energy => self.energy,
            Metric::PowerFactor => self.power_factor,
        }
    }

    pub fn set(&mut self, metric: Metric, value: Sample) {
        let slot = match metric {
            Metric::ActivePower => &mut self.active_power,
            Metric::ReactivePower => &mut self.reactive_power,
            Metric::ComplexPower => &mut self.complex_power,
            Metric::Voltage => &mut self.voltage,
            Metric::Current => &mut self.current,
            Metric::Frequency => &mut self.frequency,
            Metric::Energy => &mut self.energy,
            Metric::PowerFactor => &mut self.power_factor,
        };
        *slot = value;
    }

    pub fn value(&self, metric: Metric) -> f64 {
        self.get(metric).as_f64()
    }
}

/// Raw device poll result: temperature plus per-channel quantities.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurement {
    pub temperature: f64,
    pub channels: [ChannelReadings; CHANNEL_COUNT],
}

/// A complete measurement of the power strip at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub taken_at: DateTime<Utc>,
    /// Device temperature in degrees Celsius.
    pub temperature: f64,
    pub channels: [ChannelSnapshot; CHANNEL_COUNT],
}
