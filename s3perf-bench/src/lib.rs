//! Benchmark harness comparing a *reference* object storage endpoint with an *accelerated* one.
//!
//! A run executes the same workload against both endpoints and reports latency, throughput and
//! object size distributions for each of them:
//!
//! - [`keys`] synthesizes key names, or discovers existing keys for read benchmarks.
//! - [`workload`] times individual backend calls and collects raw samples.
//! - [`stats`] reduces raw samples into averages and nearest-rank percentiles.
//! - [`perftest`] dispatches a request to the right workloads and merges the resulting
//!   [`BenchmarkReport`]s.
//!
//! Each backend runs its full key loop before the other backend starts, so that environmental
//! effects such as cache warm-up fall on one contiguous block per backend. The first failing call
//! aborts the whole run; results are either complete or absent.
//!
//! Besides the benchmark itself, the crate contains an [`autoheal`] poller measuring how long it
//! takes until an object becomes readable through the accelerated backend, a [`validate`]
//! comparator checking that both backends serve identical contents, and an [`ops`] client for
//! issuing single operations against one backend.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod autoheal;
pub mod backends;
pub mod config;
pub mod error;
pub mod keys;
pub mod ops;
pub mod perftest;
pub mod report;
pub mod stats;
pub mod validate;
pub mod wire;
pub mod workload;

pub use crate::backends::{BackendKind, Backends};
pub use crate::config::{BenchmarkConfig, BenchmarkRequest, Defaults, RequestType};
pub use crate::error::{BenchError, BenchResult, ErrorResponse};
pub use crate::perftest::run;
pub use crate::report::{BenchmarkReport, OperationReport};
