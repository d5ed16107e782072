//! Rendering of results in the wire format.
//!
//! Numbers are rendered as fixed two-decimal strings with a unit suffix, e.g. `"0.12 secs"`,
//! `"100.00 bytes"` or `"8.50 objects/sec"`.

use serde_json::{Map, Value, json};

use crate::error::{BenchResult, ErrorResponse};
use crate::report::{BenchmarkReport, OperationReport};
use crate::stats::{PercentileStats, Throughput};

/// Conversion of a result into its JSON wire representation.
pub trait WireFormat {
    /// Renders `self` as JSON.
    fn to_wire(&self) -> Value;
}

/// Formats a duration given in seconds.
pub fn secs(value: f64) -> String {
    format!("{value:.2} secs")
}

/// Formats a size given in bytes.
pub fn bytes(value: f64) -> String {
    format!("{value:.2} bytes")
}

/// Formats a rate given in objects per second.
pub fn objects_per_sec(value: f64) -> String {
    format!("{value:.2} objects/sec")
}

fn percentiles(stats: &PercentileStats, format: fn(f64) -> String) -> Value {
    json!({
        "average": format(stats.average),
        "p50": format(stats.p50),
        "p90": format(stats.p90),
    })
}

impl WireFormat for OperationReport {
    fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            "latency".into(),
            percentiles(&self.stats.latency, secs),
        );
        let throughput = match &self.stats.throughput {
            Throughput::Aggregate(rate) => Value::String(objects_per_sec(*rate)),
            Throughput::Distribution(stats) => percentiles(stats, objects_per_sec),
        };
        map.insert("throughput".into(), throughput);

        if let Some(sizes) = &self.stats.object_size {
            map.insert("object_size".into(), percentiles(sizes, bytes));
        }
        if let Some(counts) = &self.counts {
            map.insert("compressed_obj_count".into(), counts.compressed.into());
            map.insert("uncompressed_obj_count".into(), counts.uncompressed.into());
        }

        Value::Object(map)
    }
}

impl WireFormat for BenchmarkReport {
    fn to_wire(&self) -> Value {
        self.iter()
            .map(|(key, report)| (key.to_owned(), report.to_wire()))
            .collect::<Map<_, _>>()
            .into()
    }
}

impl WireFormat for ErrorResponse {
    fn to_wire(&self) -> Value {
        json!({
            "errorMessage": self.error_message,
            "errorCode": self.error_code,
        })
    }
}

/// Renders a result, or the structured error that replaced it.
pub fn respond<T: WireFormat>(result: &BenchResult<T>) -> Value {
    match result {
        Ok(value) => value.to_wire(),
        Err(err) => ErrorResponse::from(err).to_wire(),
    }
}
