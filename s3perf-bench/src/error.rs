//! Errors aborting a benchmark run and their wire representation.

use std::time::Duration;

use s3perf_backend::BackendError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code reported for every failure that does not carry a provider error code.
pub const GENERIC_ERROR_CODE: &str = "1";

/// Errors that abort a benchmark, validation or auto-heal run.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The request named an operation that is not supported.
    #[error("unsupported request type: {0}")]
    UnsupportedRequestType(String),

    /// The request could not be parsed or contains invalid values.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The resolved key set is empty, so there is nothing to measure.
    #[error("no keys to benchmark in bucket `{bucket}`")]
    EmptyKeySet {
        /// The bucket that was benchmarked.
        bucket: String,
    },

    /// Statistics were requested over a sample set without samples.
    #[error("cannot compute statistics over an empty sample set")]
    EmptySampleSet,

    /// Two reports produced the same key while merging.
    #[error("duplicate report key `{0}`")]
    DuplicateReportKey(String),

    /// The auto-heal poller ran out of attempts or time before the object became readable.
    #[error("object not readable after {attempts} attempts in {elapsed:?}")]
    AutoHealExhausted {
        /// Number of `get` attempts made.
        attempts: u64,
        /// Time spent polling.
        elapsed: Duration,
    },

    /// A compressed object could not be decompressed.
    #[error("failed to decompress `{key}`")]
    Decompress {
        /// Key of the object.
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl BenchError {
    /// Returns the provider error code for backend errors, or [`GENERIC_ERROR_CODE`].
    pub fn error_code(&self) -> &str {
        match self {
            Self::Backend(err) => err.code().unwrap_or(GENERIC_ERROR_CODE),
            _ => GENERIC_ERROR_CODE,
        }
    }

    /// Returns the message reported to callers.
    ///
    /// For service errors this is the provider's message alone, without the code.
    pub fn error_message(&self) -> String {
        match self {
            Self::Backend(BackendError::Service { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for BenchError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

/// Result type for benchmark operations.
pub type BenchResult<T> = Result<T, BenchError>;

/// Structured error returned instead of a partial result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Human readable error message.
    pub error_message: String,
    /// Provider error code, or [`GENERIC_ERROR_CODE`].
    pub error_code: String,
}

impl From<&BenchError> for ErrorResponse {
    fn from(err: &BenchError) -> Self {
        Self {
            error_message: err.error_message(),
            error_code: err.error_code().to_owned(),
        }
    }
}
