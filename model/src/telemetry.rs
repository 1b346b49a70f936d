use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{FunctionName, NodeName};

/// One point of a resource usage series, as sampled by the metrics store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Unix seconds, possibly fractional.
    pub timestamp: f64,
    pub value:     f64,
}

/// Timing reported by the compute node on a successful invocation, taken
/// from the `X-Start-Time` (integer nanoseconds since epoch),
/// `X-Duration-Seconds` and `X-Computation-Seconds` (fractional seconds)
/// response headers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestTiming {
    start:       DateTime<Utc>,
    duration:    f64,
    computation: f64,
}

impl RequestTiming {
    /// Invalid or missing headers degrade to a zero duration rather than
    /// aborting the forward.
    pub fn from_headers(
        start: Option<&str>,
        duration: Option<&str>,
        computation: Option<&str>,
    ) -> Self {
        let start_ns =
            start.and_then(|raw| raw.parse::<i64>().ok()).unwrap_or(0);
        let duration = duration
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0)
            .max(0.0);
        let computation = computation
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0)
            .clamp(0.0, duration);
        Self {
            start: DateTime::from_timestamp_nanos(start_ns),
            duration,
            computation,
        }
    }

    pub fn start(&self) -> DateTime<Utc> { self.start }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::nanoseconds((self.duration * 1e9) as i64)
    }

    /// Wall-clock seconds spent serving the invocation.
    pub fn duration_seconds(&self) -> f64 { self.duration }

    /// Pure compute seconds, never exceeds [`Self::duration_seconds`].
    pub fn computation_seconds(&self) -> f64 { self.computation }
}

/// Execution telemetry of one completed invocation. Immutable once
/// enqueued; persisted (or lost) as part of exactly one flushed batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub function: FunctionName,
    pub node:     NodeName,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Seconds, redundant with `end_time - start_time`, stored for query
    /// convenience.
    pub duration: f64,
    pub computation_time: f64,
    /// Query-string parameter name to first value.
    pub params: HashMap<String, String>,
    pub cpu:    Vec<MetricSample>,
    pub mem:    Vec<MetricSample>,
}

impl TelemetryRecord {
    /// Samples outside `[start, end]` are discarded here so the stored
    /// series always matches the invocation window.
    pub fn new(
        function: FunctionName,
        node: NodeName,
        timing: RequestTiming,
        params: HashMap<String, String>,
        mut cpu: Vec<MetricSample>,
        mut mem: Vec<MetricSample>,
    ) -> Self {
        let start_time = timing.start();
        let end_time = timing.end();
        let start_secs = start_time.timestamp_millis() as f64 / 1000.0;
        let end_secs = end_time.timestamp_millis() as f64 / 1000.0;
        cpu.retain(|sample| {
            sample.timestamp >= start_secs && sample.timestamp <= end_secs
        });
        mem.retain(|sample| {
            sample.timestamp >= start_secs && sample.timestamp <= end_secs
        });

        Self {
            function,
            node,
            start_time,
            end_time,
            duration: timing.duration_seconds(),
            computation_time: timing.computation_seconds(),
            params,
            cpu,
            mem,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        nominal = {
            Some("1680713081910870799"), Some("0.002503"), Some("0.001"),
            0.002503, 0.001
        },
        missing_start = { None, Some("0.5"), Some("0.1"), 0.5, 0.1 },
        garbage_duration = { Some("0"), Some("abc"), None, 0.0, 0.0 },
        negative_duration = { Some("0"), Some("-1.5"), Some("0.2"), 0.0, 0.0 },
        computation_capped = {
            Some("0"), Some("0.1"), Some("0.5"), 0.1, 0.1
        },
    )]
    fn parses_timing_headers(
        start: Option<&str>,
        duration: Option<&str>,
        computation: Option<&str>,
        expected_duration: f64,
        expected_computation: f64,
    ) {
        let timing = RequestTiming::from_headers(start, duration, computation);
        assert_eq!(timing.duration_seconds(), expected_duration);
        assert_eq!(timing.computation_seconds(), expected_computation);
        assert!(timing.end() >= timing.start());
    }

    #[test]
    fn end_is_start_plus_duration() {
        let timing = RequestTiming::from_headers(
            Some("1680713081910870799"),
            Some("0.002503"),
            None,
        );
        let expected = DateTime::from_timestamp_nanos(1680713081910870799)
            + Duration::nanoseconds(2_503_000);
        assert_eq!(timing.end(), expected);
    }

    #[test]
    fn record_keeps_only_samples_within_the_window() {
        let timing = RequestTiming::from_headers(
            Some("1680713081000000000"),
            Some("10.0"),
            Some("1.0"),
        );
        let in_window = MetricSample { timestamp: 1680713085.0, value: 1.0 };
        let before = MetricSample { timestamp: 1680713080.0, value: 2.0 };
        let after = MetricSample { timestamp: 1680713095.0, value: 3.0 };

        let record = TelemetryRecord::new(
            FunctionName::try_new("cows").unwrap(),
            NodeName::try_new("cloud1").unwrap(),
            timing,
            HashMap::new(),
            vec![before, in_window, after],
            vec![after],
        );

        assert_eq!(record.cpu, vec![in_window]);
        assert!(record.mem.is_empty());
        assert!(record.end_time >= record.start_time);
    }
}
