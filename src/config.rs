use crate::device::DeviceSchema;
use crate::error::{AppError, Result};
use crate::snmp::{SessionConfig, DEFAULT_COMMUNITY, DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
use crate::verdict::Thresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;

pub const DEFAULT_STATEFILE: &str = "/tmp/pwrstrstate";

/// Optional YAML configuration: SNMP session settings and the vendor schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub snmp: SnmpConfig,
    #[serde(default)]
    pub schema: DeviceSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnmpConfig {
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after a timed out request
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.into()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}
fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            community: default_community(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    /// Afterwards, if SNMP_COMMUNITY env is set, override `snmp.community`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let expanded = expand_env_placeholders(&raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults plus environment overrides, for runs without a file.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(community) = std::env::var("SNMP_COMMUNITY") {
            self.snmp.community = community;
        }
    }

    fn validate(&self) -> Result<()> {
        let problem = if self.snmp.community.is_empty() {
            "snmp.community cannot be empty"
        } else if self.snmp.port == 0 {
            "snmp.port cannot be 0"
        } else if self.snmp.timeout_secs == 0 {
            "snmp.timeout_secs must be at least 1"
        } else {
            return self.schema.validate();
        };
        Err(AppError::Config(problem.into()))
    }

    pub fn session(&self, address: &str) -> SessionConfig {
        SessionConfig {
            address: address.to_string(),
            port: self.snmp.port,
            community: self.snmp.community.clone(),
            timeout: Duration::from_secs(self.snmp.timeout_secs),
            retries: self.snmp.retries,
        }
    }
}

/// Everything one check run needs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub session: SessionConfig,
    pub schema: DeviceSchema,
    pub statefile: PathBuf,
    pub thresholds: Thresholds,
    /// History window size; the window keeps `interval + 1` entries.
    pub interval: usize,
    pub debug: bool,
}

impl Settings {
    pub fn address(&self) -> &str {
        &self.session.address
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" becomes a literal "$".
fn expand_env_placeholders(input: &str) -> anyhow::Result<String> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next();
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until `end`, consuming the delimiter.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn expands_both_placeholder_forms() {
        std::env::set_var("CHECK_POWER_TEST_COMMUNITY", "s3cret");
        let out = expand_env_placeholders("a: $(CHECK_POWER_TEST_COMMUNITY)\nb: ${CHECK_POWER_TEST_COMMUNITY}")
            .unwrap();
        assert_eq!(out, "a: s3cret\nb: s3cret");
        std::env::remove_var("CHECK_POWER_TEST_COMMUNITY");
    }

    #[test]
    fn keeps_lone_and_escaped_dollars() {
        assert_eq!(expand_env_placeholders("cost: $5 $$x").unwrap(), "cost: $5 $x");
    }

    #[test]
    #[serial]
    fn missing_variable_is_error() {
        std::env::remove_var("CHECK_POWER_TEST_ABSENT");
        assert!(expand_env_placeholders("x: ${CHECK_POWER_TEST_ABSENT}").is_err());
        assert!(expand_env_placeholders("x: ${UNTERMINATED").is_err());
    }

    #[test]
    #[serial]
    fn load_errors_keep_their_source() {
        let dir = tempfile::tempdir().unwrap();

        let err = Config::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, AppError::Io(_)));

        let bad_yaml = dir.path().join("bad.yaml");
        fs::write(&bad_yaml, "snmp: [unclosed").unwrap();
        assert!(matches!(Config::load(&bad_yaml).unwrap_err(), AppError::Yaml(_)));

        let zero_port = dir.path().join("port.yaml");
        fs::write(&zero_port, "snmp:\n  port: 0\n").unwrap();
        assert!(matches!(Config::load(&zero_port).unwrap_err(), AppError::Config(_)));
    }

    #[test]
    #[serial]
    fn placeholder_failure_is_reported_as_is() {
        std::env::remove_var("CHECK_POWER_TEST_ABSENT");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("placeholder.yaml");
        fs::write(&path, "snmp:\n  community: ${CHECK_POWER_TEST_ABSENT}\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, AppError::Other(_)));
        assert!(err.to_string().contains("CHECK_POWER_TEST_ABSENT"));
    }

    #[test]
    fn session_from_config() {
        let cfg = Config::default();
        let session = cfg.session("pdu-1.example.net");
        assert_eq!(session.address, "pdu-1.example.net");
        assert_eq!(session.port, 161);
        assert_eq!(session.community, "public");
        assert_eq!(session.timeout, Duration::from_secs(5));
        assert_eq!(session.retries, 1);
    }
}
