//! SNMP check for three-phase E3METER IPM power strips.
//!
//! Polls per-channel electrical readings, compares the channel currents
//! against a rolling average kept in a state file and reports an
//! Icinga/Nagios plugin status line with performance data.

pub mod check;
pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod history;
pub mod measurement;
pub mod metrics;
pub mod report;
pub mod snmp;
pub mod verdict;

pub use check::{Check, CheckResult, Outcome};
pub use config::{Config, Settings};
pub use error::{AppError, Result};
pub use verdict::{Status, Verdict};
