//! Per-operation reports and their merge into one benchmark report.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Serialize;

use crate::backends::BackendKind;
use crate::error::{BenchError, BenchResult};
use crate::stats::OperationStats;
use crate::workload::{ObjectCounts, Operation, RawSamples};

/// The statistics of one operation against one backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperationReport {
    /// The backend the operation ran against.
    #[serde(skip)]
    pub backend: BackendKind,
    /// The measured operation.
    #[serde(skip)]
    pub operation: Operation,
    /// Latency, throughput and object size statistics.
    #[serde(flatten)]
    pub stats: OperationStats,
    /// Compressed and uncompressed object counts, for downloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<ObjectCounts>,
}

impl OperationReport {
    /// Summarizes the raw samples of one run.
    pub fn new(
        backend: BackendKind,
        operation: Operation,
        samples: &RawSamples,
    ) -> BenchResult<Self> {
        Ok(Self {
            backend,
            operation,
            stats: samples.stats()?,
            counts: samples.counts,
        })
    }

    /// The key of this report in a [`BenchmarkReport`], e.g. `reference_put_obj_perf_stats`.
    pub fn key(&self) -> String {
        format!(
            "{}_{}_perf_stats",
            self.backend.label(),
            self.operation.label()
        )
    }
}

/// All operation reports of a run, keyed by backend and operation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BenchmarkReport {
    entries: BTreeMap<String, OperationReport>,
}

impl BenchmarkReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation report under its [`key`](OperationReport::key).
    ///
    /// Keys are unique per backend and operation, so a collision is reported as an error instead
    /// of overwriting the existing entry.
    pub fn insert(&mut self, report: OperationReport) -> BenchResult<()> {
        match self.entries.entry(report.key()) {
            Entry::Vacant(entry) => {
                entry.insert(report);
                Ok(())
            }
            Entry::Occupied(entry) => Err(BenchError::DuplicateReportKey(entry.key().clone())),
        }
    }

    /// Merges all entries of `other` into this report.
    pub fn merge(mut self, other: BenchmarkReport) -> BenchResult<Self> {
        for (_, report) in other.entries {
            self.insert(report)?;
        }
        Ok(self)
    }

    /// Returns the entry stored under `key`.
    pub fn get(&self, key: &str) -> Option<&OperationReport> {
        self.entries.get(key)
    }

    /// Returns the entry for the given backend and operation.
    pub fn find(&self, backend: BackendKind, operation: Operation) -> Option<&OperationReport> {
        self.entries
            .values()
            .find(|report| report.backend == backend && report.operation == operation)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the report has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all keys, in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over all entries, in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationReport)> {
        self.entries.iter().map(|(key, report)| (key.as_str(), report))
    }
}

/// Flattens several reports into one.
pub fn merge(reports: impl IntoIterator<Item = BenchmarkReport>) -> BenchResult<BenchmarkReport> {
    reports
        .into_iter()
        .try_fold(BenchmarkReport::new(), BenchmarkReport::merge)
}
