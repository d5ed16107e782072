//! Shared utilities for tests across the s3perf workspace.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod tracing;
