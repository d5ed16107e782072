//! Dispatch of benchmark requests to workloads, and merging of their reports.
//!
//! Every request type maps to a fixed list of [`Phase`]s. Phases run strictly one after another,
//! and within a phase the reference backend completes its full key loop before the accelerated
//! backend starts.

use crate::backends::{BackendKind, Backends};
use crate::config::{BenchmarkConfig, BenchmarkRequest, Defaults, RequestType};
use crate::error::{BenchError, BenchResult};
use crate::keys::KeyGenerator;
use crate::report::{BenchmarkReport, OperationReport};
use crate::workload::{Operation, WorkloadRunner};

const BOTH: &[BackendKind] = &BackendKind::ALL;
const ACCELERATED_ONLY: &[BackendKind] = &[BackendKind::Accelerated];

/// Where the keys of a phase come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeySource {
    /// The request's keys, or generated names.
    Write,
    /// The request's keys, or keys discovered in the bucket.
    Read,
    /// Keys discovered in the bucket, ignoring the request's keys.
    Discover,
    /// The operation does not work on keys.
    None,
}

/// One step of a benchmark run.
#[derive(Debug)]
struct Phase {
    operation: Operation,
    keys: KeySource,
    targets: &'static [BackendKind],
}

const fn phase(operation: Operation, keys: KeySource, targets: &'static [BackendKind]) -> Phase {
    Phase {
        operation,
        keys,
        targets,
    }
}

const PUT: &[Phase] = &[phase(Operation::Put, KeySource::Write, BOTH)];
const GET: &[Phase] = &[phase(Operation::Get, KeySource::Read, BOTH)];
const GET_TTFB: &[Phase] = &[phase(Operation::GetTtfb, KeySource::Read, BOTH)];
const GET_PASSTHROUGH: &[Phase] = &[phase(
    Operation::GetPassthrough,
    KeySource::Read,
    ACCELERATED_ONLY,
)];
const GET_PASSTHROUGH_TTFB: &[Phase] = &[phase(
    Operation::GetPassthroughTtfb,
    KeySource::Read,
    ACCELERATED_ONLY,
)];
const DELETE: &[Phase] = &[phase(Operation::Delete, KeySource::Write, BOTH)];
const LIST: &[Phase] = &[phase(Operation::ListObjectsV2, KeySource::None, BOTH)];

/// `ALL` deletes the written keys before listing, and reads only keys discovered afterwards, so
/// that it never reads objects it just deleted.
const ALL: &[Phase] = &[
    phase(Operation::Put, KeySource::Write, BOTH),
    phase(Operation::Delete, KeySource::Write, BOTH),
    phase(Operation::ListObjectsV2, KeySource::None, BOTH),
    phase(Operation::Get, KeySource::Discover, BOTH),
];

/// The phases executed for each request type.
fn phases(request_type: RequestType) -> &'static [Phase] {
    match request_type {
        RequestType::PutObject => PUT,
        RequestType::GetObject => GET,
        RequestType::GetObjectTtfb => GET_TTFB,
        RequestType::GetObjectPassthrough => GET_PASSTHROUGH,
        RequestType::GetObjectPassthroughTtfb => GET_PASSTHROUGH_TTFB,
        RequestType::DeleteObject => DELETE,
        RequestType::ListObjectsV2 => LIST,
        RequestType::All => ALL,
    }
}

/// Runs the benchmark described by `config` against both backends.
///
/// The first failing backend call aborts the run, and no partial report is returned.
pub async fn run(backends: &Backends, config: &BenchmarkConfig) -> BenchResult<BenchmarkReport> {
    tracing::info!(
        request_type = %config.request_type,
        bucket = %config.bucket,
        num_keys = config.num_keys,
        "starting benchmark"
    );

    let perftest = PerfTest {
        backends,
        config,
        runner: WorkloadRunner::new(config),
        keys: KeyGenerator::new(config.key_prefix.clone()),
    };

    let mut report = BenchmarkReport::new();
    for phase in phases(config.request_type) {
        let keys = perftest.resolve_keys(phase.keys).await?;
        report = report.merge(perftest.measure(phase, &keys).await?)?;
    }

    tracing::info!(entries = report.len(), "benchmark finished");
    Ok(report)
}

/// Parses a JSON event into a request and runs it.
pub async fn process_event(
    backends: &Backends,
    defaults: &Defaults,
    event: serde_json::Value,
) -> BenchResult<BenchmarkReport> {
    let request: BenchmarkRequest = serde_json::from_value(event)?;
    let config = BenchmarkConfig::from_request(request, defaults)?;
    run(backends, &config).await
}

struct PerfTest<'a> {
    backends: &'a Backends,
    config: &'a BenchmarkConfig,
    runner: WorkloadRunner<'a>,
    keys: KeyGenerator,
}

impl PerfTest<'_> {
    async fn resolve_keys(&self, source: KeySource) -> BenchResult<Vec<String>> {
        let keys = match (source, &self.config.keys) {
            (KeySource::None, _) => return Ok(Vec::new()),
            (KeySource::Write | KeySource::Read, Some(keys)) => keys.clone(),
            (KeySource::Write, None) => self.keys.generate(self.config.num_keys),
            (KeySource::Read, None) | (KeySource::Discover, _) => {
                self.keys
                    .discover(
                        self.backends.reference(),
                        &self.config.bucket,
                        self.config.num_keys,
                    )
                    .await?
            }
        };

        if keys.is_empty() {
            return Err(BenchError::EmptyKeySet {
                bucket: self.config.bucket.clone(),
            });
        }
        Ok(keys)
    }

    async fn measure(&self, phase: &Phase, keys: &[String]) -> BenchResult<BenchmarkReport> {
        let mut report = BenchmarkReport::new();

        for &kind in phase.targets {
            let backend = self.backends.get(kind);
            tracing::info!(
                backend = %kind,
                operation = %phase.operation,
                keys = keys.len(),
                "running workload"
            );

            let samples = self.runner.run(phase.operation, backend, keys).await?;
            report.insert(OperationReport::new(kind, phase.operation, &samples)?)?;
        }

        Ok(report)
    }
}
