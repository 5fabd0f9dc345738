use check_power::check::{conclude, Check};
use check_power::device::{DeviceClient, DeviceSchema};
use check_power::history::HistoryStore;
use check_power::measurement::{Metric, Sample};
use check_power::snmp::{GetResponse, Oid, RawValue, SnmpTransport};
use check_power::verdict::Thresholds;
use check_power::{AppError, Status};
use pretty_assertions::assert_eq;
use std::path::Path;

/// Power strip double: every quantity reads 100, voltage 230 V, frequency
/// 50 Hz, and each channel's current is configurable in milliamps.
struct FakeStrip {
    schema: DeviceSchema,
    current_ma: [i64; 3],
    reachable: bool,
    requests: usize,
}

impl FakeStrip {
    fn new(current_ma: [i64; 3]) -> Self {
        Self {
            schema: DeviceSchema::default(),
            current_ma,
            reachable: true,
            requests: 0,
        }
    }

    fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new([0, 0, 0])
        }
    }
}

impl SnmpTransport for FakeStrip {
    fn get(&mut self, oid: &Oid) -> check_power::Result<GetResponse> {
        self.requests += 1;
        if !self.reachable {
            return Err(AppError::Connectivity("request timed out".into()));
        }
        let (index, column) = oid.arcs().split_last().expect("instance OID");
        if column == self.schema.temperature.oid.arcs() {
            return Ok(GetResponse::value(oid.clone(), RawValue::Integer(215)));
        }
        let metric = self
            .schema
            .quantities
            .iter()
            .find(|q| q.oid.arcs() == column)
            .map(|q| q.metric)
            .expect("known quantity");
        let raw = match metric {
            Metric::Current => self.current_ma[*index as usize],
            Metric::Voltage => 230_000,
            Metric::Frequency => 50_000,
            _ => 100,
        };
        Ok(GetResponse::value(oid.clone(), RawValue::Integer(raw)))
    }
}

fn thresholds() -> Thresholds {
    Thresholds {
        warn: 0.1,
        crit: 0.25,
    }
}

fn run_once(strip: FakeStrip, state: &Path) -> check_power::Result<check_power::CheckResult> {
    let client = DeviceClient::new(strip, DeviceSchema::default())?;
    Check::new(client, HistoryStore::new(state), thresholds(), 10).run()
}

#[test]
fn empty_history_is_ok_and_appended() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");

    let result = run_once(FakeStrip::new([40_000, 10, 2_000]), &state).unwrap();

    assert_eq!(result.verdict.status, Status::Ok);
    assert_eq!(result.verdict.message, None);
    assert!(result.appended);
    assert_eq!(result.measurement.temperature, 21.5);
    assert_eq!(result.measurement.channels[0].current, Sample::Float(40.0));
    assert_eq!(result.measurement.channels[0].power_factor, Sample::Float(100.0));
    assert_eq!(HistoryStore::new(&state).load().unwrap().len(), 1);
}

#[test]
fn current_far_above_average_is_critical_and_not_appended() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");

    run_once(FakeStrip::new([0, 10_000, 0]), &state).unwrap();
    let result = run_once(FakeStrip::new([0, 13_000, 0]), &state).unwrap();

    assert_eq!(result.verdict.status, Status::Critical);
    assert_eq!(
        result.verdict.message.as_deref(),
        Some("Channel 1 current is 13.00 but average is 10.00")
    );
    assert!(!result.appended);
    assert_eq!(HistoryStore::new(&state).load().unwrap().len(), 1);

    let outcome = conclude(Ok(result), "pdu-1", false).unwrap();
    assert_eq!(outcome.status.exit_code(), 2);
    assert!(outcome
        .line
        .starts_with("CRITICAL - Channel 1 current is 13.00 but average is 10.00 | "));
}

#[test]
fn moderate_deviation_is_warning() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");

    run_once(FakeStrip::new([10_000, 10_000, 10_000]), &state).unwrap();
    let result = run_once(FakeStrip::new([10_000, 10_000, 8_500]), &state).unwrap();

    assert_eq!(result.verdict.status, Status::Warning);
    assert!(result.verdict.message.unwrap().starts_with("Channel 2 "));
    assert!(!result.appended);
}

#[test]
fn low_baseline_skips_all_channels() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");

    run_once(FakeStrip::new([100, 50, 0]), &state).unwrap();
    let result = run_once(FakeStrip::new([20_000, 20_000, 20_000]), &state).unwrap();

    assert_eq!(result.verdict.status, Status::Ok);
    assert!(result.appended);
    assert_eq!(result.history_len, 2);
}

#[test]
fn window_is_bounded_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");

    for _ in 0..15 {
        let result = run_once(FakeStrip::new([5_000, 5_000, 5_000]), &state).unwrap();
        assert_eq!(result.verdict.status, Status::Ok);
    }
    assert_eq!(HistoryStore::new(&state).load().unwrap().len(), 11);
}

#[test]
fn unreachable_device_is_unknown_without_touching_history() {
    let dir = tempfile::tempdir().unwrap();
    let state = dir.path().join("state");
    run_once(FakeStrip::new([5_000, 5_000, 5_000]), &state).unwrap();
    let before = std::fs::read(&state).unwrap();

    let result = run_once(FakeStrip::unreachable(), &state);
    let outcome = conclude(result, "192.0.2.10", false).unwrap();

    assert_eq!(outcome.status, Status::Unknown);
    assert_eq!(outcome.status.exit_code(), 3);
    assert_eq!(outcome.line, "UNKNOWN - Couldn't connect to 192.0.2.10!");
    assert_eq!(std::fs::read(&state).unwrap(), before);
}

#[test]
fn fetch_stops_at_first_failure() {
    let mut strip = FakeStrip::unreachable();
    let mut client = DeviceClient::new(&mut strip, DeviceSchema::default()).unwrap();
    assert!(client.fetch().is_err());
    drop(client);
    assert_eq!(strip.requests, 1);
}

#[test]
fn report_lists_all_channels_and_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_once(FakeStrip::new([1_000, 2_000, 3_000]), &dir.path().join("s")).unwrap();
    let outcome = conclude(Ok(result), "pdu", false).unwrap();

    let (status, perf) = outcome.line.split_once(" | ").unwrap();
    assert_eq!(status, "OK");
    assert_eq!(perf.matches("'channel ").count(), 24);
    assert!(perf.contains("'channel 2 current'=3.00"));
    assert!(perf.contains("'channel 0 voltage'=230.00"));
    assert!(perf.contains("'channel 1 frequency'=50.00"));
    assert!(perf.contains("'channel 0 power factor'=100.00%"));
}
