//! SNMP protocol boundary.
//!
//! [`SnmpTransport`] is the seam between the check and the network: one
//! blocking GET per call, answered with an owned [`GetResponse`]. The
//! production implementation [`UdpTransport`] wraps `snmp::SyncSession`
//! and bounds every exchange with a timeout plus a retry budget.

use crate::error::{AppError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PORT: u16 = 161;
pub const DEFAULT_COMMUNITY: &str = "public";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_RETRIES: u32 = 1;

/// Dotted-decimal object identifier, e.g. `1.3.6.1.2.1.1.3.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn new(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Instance OID: this OID with `index` appended.
    pub fn child(&self, index: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(index);
        Oid(arcs)
    }
}

impl FromStr for Oid {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(AppError::Config("empty OID".into()));
        }
        let arcs = trimmed
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| AppError::Config(format!("invalid OID '{}'", s)))
            })
            .collect::<Result<Vec<u32>>>()?;
        if arcs.len() < 2 {
            return Err(AppError::Config(format!(
                "OID '{}' needs at least two arcs",
                s
            )));
        }
        Ok(Oid(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl Serialize for Oid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Oid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Value carried by a variable binding, decoded from its ASN.1 tag.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Integer(i64),
    Unsigned(u64),
    /// Anything non-numeric; holds a description for diagnostics.
    Unsupported(String),
}

impl RawValue {
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            RawValue::Integer(v) => Ok(*v as f64),
            RawValue::Unsigned(v) => Ok(*v as f64),
            RawValue::Unsupported(desc) => {
                Err(AppError::Decode(format!("non-numeric value {}", desc)))
            }
        }
    }
}

/// Owned GET response PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResponse {
    pub error_status: u32,
    /// 1-based index of the faulting variable binding, 0 if none.
    pub error_index: u32,
    pub varbinds: Vec<(Oid, RawValue)>,
}

impl GetResponse {
    /// Successful response with a single binding.
    pub fn value(oid: Oid, value: RawValue) -> Self {
        Self {
            error_status: 0,
            error_index: 0,
            varbinds: vec![(oid, value)],
        }
    }
}

/// Name of an SNMP error-status code (RFC 3416).
pub fn error_status_name(status: u32) -> &'static str {
    match status {
        0 => "noError",
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        6 => "noAccess",
        7 => "wrongType",
        8 => "wrongLength",
        9 => "wrongEncoding",
        10 => "wrongValue",
        11 => "noCreation",
        12 => "inconsistentValue",
        13 => "resourceUnavailable",
        14 => "commitFailed",
        15 => "undoFailed",
        16 => "authorizationError",
        17 => "notWritable",
        18 => "inconsistentName",
        _ => "unknownError",
    }
}

/// Blocking SNMP GET. An `Err` is an error indication: the exchange
/// itself failed (timeout, socket error, malformed reply).
#[cfg_attr(test, mockall::automock)]
pub trait SnmpTransport {
    fn get(&mut self, oid: &Oid) -> Result<GetResponse>;
}

impl<T: SnmpTransport + ?Sized> SnmpTransport for &mut T {
    fn get(&mut self, oid: &Oid) -> Result<GetResponse> {
        (**self).get(oid)
    }
}

/// Connection settings for one device.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub address: String,
    pub port: u16,
    pub community: String,
    /// Per-attempt receive timeout.
    pub timeout: Duration,
    /// Additional attempts after the first one fails.
    pub retries: u32,
}

impl SessionConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_PORT,
            community: DEFAULT_COMMUNITY.into(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }
}

/// SNMPv2c session over UDP.
pub struct UdpTransport {
    session: ::snmp::SyncSession,
    retries: u32,
}

impl UdpTransport {
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let session = ::snmp::SyncSession::new(
            (config.address.as_str(), config.port),
            config.community.as_bytes(),
            Some(config.timeout),
            std::process::id() as i32,
        )
        .map_err(|e| {
            AppError::Connectivity(format!(
                "cannot open session to {}:{}: {}",
                config.address, config.port, e
            ))
        })?;
        debug!(
            address = %config.address,
            port = config.port,
            timeout_ms = config.timeout.as_millis() as u64,
            retries = config.retries,
            "opened SNMP session"
        );
        Ok(Self {
            session,
            retries: config.retries,
        })
    }

    fn get_once(&mut self, oid: &Oid) -> Result<GetResponse> {
        let pdu = self
            .session
            .get(oid.arcs())
            .map_err(|e| AppError::Connectivity(format!("{:?} while reading {}", e, oid)))?;
        let error_status = pdu.error_status;
        let error_index = pdu.error_index;
        let varbinds = pdu
            .varbinds
            .map(|(name, value)| {
                let name = name.to_string().parse().unwrap_or_else(|_| oid.clone());
                (name, decode_value(&value))
            })
            .collect();
        Ok(GetResponse {
            error_status,
            error_index,
            varbinds,
        })
    }
}

impl SnmpTransport for UdpTransport {
    fn get(&mut self, oid: &Oid) -> Result<GetResponse> {
        let retries = self.retries;
        with_retries(retries, || self.get_once(oid))
    }
}

fn decode_value(value: &::snmp::Value<'_>) -> RawValue {
    match value {
        ::snmp::Value::Integer(v) => RawValue::Integer(*v),
        ::snmp::Value::Counter32(v) | ::snmp::Value::Unsigned32(v) | ::snmp::Value::Timeticks(v) => {
            RawValue::Unsigned(u64::from(*v))
        }
        ::snmp::Value::Counter64(v) => RawValue::Unsigned(*v),
        other => RawValue::Unsupported(format!("{:?}", other)),
    }
}

/// Run `attempt` once, then up to `retries` more times while it keeps
/// failing. Returns the last error when every attempt fails.
pub fn with_retries<T, F>(retries: u32, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut tries = 0;
    loop {
        match attempt() {
            Ok(v) => return Ok(v),
            Err(e) if tries < retries => {
                tries += 1;
                debug!(error = %e, attempt = tries, "SNMP request failed; retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn oid_parse_and_display() {
        let oid: Oid = ".1.3.6.1.4.1.21695".parse().unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 4, 1, 21695]);
        assert_eq!(oid.to_string(), "1.3.6.1.4.1.21695");
        assert_eq!(oid.child(2).to_string(), "1.3.6.1.4.1.21695.2");
    }

    #[test]
    fn oid_rejects_garbage() {
        assert!("".parse::<Oid>().is_err());
        assert!("1".parse::<Oid>().is_err());
        assert!("1.3.x.1".parse::<Oid>().is_err());
        assert!("1..3".parse::<Oid>().is_err());
    }

    #[test]
    fn oid_serde_as_string() {
        let oid: Oid = serde_json::from_str("\"1.3.6.1.2.1\"").unwrap();
        assert_eq!(oid, Oid::new(vec![1, 3, 6, 1, 2, 1]));
        assert_eq!(serde_json::to_string(&oid).unwrap(), "\"1.3.6.1.2.1\"");
    }

    #[test]
    fn raw_value_conversion() {
        assert_eq!(RawValue::Integer(-5).as_f64().unwrap(), -5.0);
        assert_eq!(RawValue::Unsigned(230_000).as_f64().unwrap(), 230_000.0);
        let err = RawValue::Unsupported("OctetString".into())
            .as_f64()
            .unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn error_status_names() {
        assert_eq!(error_status_name(2), "noSuchName");
        assert_eq!(error_status_name(5), "genErr");
        assert_eq!(error_status_name(99), "unknownError");
    }

    #[test]
    fn retries_until_success() {
        let mut calls = 0;
        let result = with_retries(1, || {
            calls += 1;
            if calls == 1 {
                Err(AppError::Connectivity("timeout".into()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[test]
    fn gives_up_after_retry_budget() {
        let mut calls = 0;
        let result: Result<()> = with_retries(1, || {
            calls += 1;
            Err(AppError::Connectivity(format!("timeout {}", calls)))
        });
        let err = result.unwrap_err();
        assert_eq!(calls, 2);
        assert_eq!(err.to_string(), "SNMP connectivity error: timeout 2");
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let mut calls = 0;
        let result: Result<()> = with_retries(0, || {
            calls += 1;
            Err(AppError::Connectivity("timeout".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn session_defaults() {
        let config = SessionConfig::new("10.0.0.5");
        assert_eq!(config.port, 161);
        assert_eq!(config.community, "public");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retries, 1);
    }
}
