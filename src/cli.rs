//! Command line surface of the check.

use crate::config::{Config, Settings, DEFAULT_STATEFILE};
use crate::history::DEFAULT_INTERVAL;
use crate::verdict::{Thresholds, DEFAULT_CRIT_THRESHOLD, DEFAULT_WARN_THRESHOLD};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "check_power")]
#[command(about = "Icinga check for three-phase E3METER IPS power strips")]
#[command(version)]
pub struct Cli {
    /// Address (IP or hostname) of the power strip
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// Where the measurement history is kept between runs
    #[arg(short = 's', long = "statefile", default_value = DEFAULT_STATEFILE)]
    pub statefile: PathBuf,

    /// Warning threshold: allowed relative deviation of the current (0.05 = 5%)
    #[arg(short = 'w', default_value_t = DEFAULT_WARN_THRESHOLD)]
    pub warn_thresh: f64,

    /// Critical threshold: allowed relative deviation of the current (0.25 = 25%)
    #[arg(short = 'c', default_value_t = DEFAULT_CRIT_THRESHOLD)]
    pub crit_thresh: f64,

    /// Number of past measurements the average is built from
    #[arg(short = 'i', default_value_t = DEFAULT_INTERVAL)]
    pub interval: usize,

    /// Print diagnostics to stderr and surface internal errors
    #[arg(long)]
    pub debug: bool,

    /// YAML file with SNMP settings and object identifiers
    #[arg(long, env = "CHECK_POWER_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings, anyhow::Error> {
        let config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::from_env()?,
        };
        let thresholds = Thresholds {
            warn: self.warn_thresh,
            crit: self.crit_thresh,
        };
        thresholds.validate()?;
        Ok(Settings {
            session: config.session(&self.address),
            schema: config.schema,
            statefile: self.statefile,
            thresholds,
            interval: self.interval,
            debug: self.debug,
        })
    }
}
