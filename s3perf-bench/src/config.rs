//! Request parsing and the immutable per-run configuration derived from it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Upper bound for the number of keys used by a run, matching a single listing page.
pub const MAX_KEYS: usize = 1000;

/// Default number of keys written or read by a run.
pub const DEFAULT_NUM_KEYS: usize = MAX_KEYS;

/// Default payload length of written objects, in bytes.
pub const DEFAULT_OBJ_LENGTH: usize = 100;

/// Default number of listing calls per backend.
pub const DEFAULT_LIST_ITERATIONS: usize = 10;

/// Default prefix of generated key names.
pub const DEFAULT_KEY_PREFIX: &str = "s3perf_test_obj_";

/// The operation a benchmark request measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// Upload objects.
    PutObject,
    /// Download objects in full.
    GetObject,
    /// Download the first byte of objects.
    GetObjectTtfb,
    /// Download objects in full from an unmonitored bucket, accelerated backend only.
    GetObjectPassthrough,
    /// Download the first byte of objects from an unmonitored bucket, accelerated backend only.
    GetObjectPassthroughTtfb,
    /// Delete objects.
    DeleteObject,
    /// List a page of objects repeatedly.
    ListObjectsV2,
    /// Put, delete, list and get in sequence.
    All,
}

impl RequestType {
    /// The name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PutObject => "PUT_OBJECT",
            Self::GetObject => "GET_OBJECT",
            Self::GetObjectTtfb => "GET_OBJECT_TTFB",
            Self::GetObjectPassthrough => "GET_OBJECT_PASSTHROUGH",
            Self::GetObjectPassthroughTtfb => "GET_OBJECT_PASSTHROUGH_TTFB",
            Self::DeleteObject => "DELETE_OBJECT",
            Self::ListObjectsV2 => "LIST_OBJECTS_V2",
            Self::All => "ALL",
        }
    }

    /// Returns `true` for requests that only read existing objects.
    ///
    /// Read-only requests without explicit keys discover their keys by listing the bucket.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::GetObject
                | Self::GetObjectTtfb
                | Self::GetObjectPassthrough
                | Self::GetObjectPassthroughTtfb
        )
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s.trim().to_ascii_uppercase().as_str() {
            "PUT_OBJECT" => Self::PutObject,
            "GET_OBJECT" => Self::GetObject,
            "GET_OBJECT_TTFB" => Self::GetObjectTtfb,
            "GET_OBJECT_PASSTHROUGH" => Self::GetObjectPassthrough,
            "GET_OBJECT_PASSTHROUGH_TTFB" => Self::GetObjectPassthroughTtfb,
            "DELETE_OBJECT" => Self::DeleteObject,
            "LIST_OBJECTS_V2" => Self::ListObjectsV2,
            "ALL" => Self::All,
            _ => return Err(BenchError::UnsupportedRequestType(s.to_owned())),
        };

        Ok(result)
    }
}

/// A benchmark request as received on the wire.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRequest {
    /// Operation to measure, `ALL` when omitted.
    pub request_type: Option<String>,
    /// Bucket to run against.
    pub bucket: String,
    /// Explicit keys to use instead of generated or discovered ones.
    pub keys: Option<Vec<String>>,
    /// Number of keys to generate or discover.
    pub num_keys: Option<usize>,
    /// Payload length of written objects.
    pub obj_length: Option<usize>,
    /// Number of listing calls per backend.
    pub list_iterations: Option<usize>,
    /// Number of calls in flight against one backend at a time.
    pub concurrency: Option<usize>,
}

/// Deployment level defaults applied to fields a request leaves unset.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    /// See [`BenchmarkConfig::num_keys`].
    pub num_keys: usize,
    /// See [`BenchmarkConfig::obj_length`].
    pub obj_length: usize,
    /// See [`BenchmarkConfig::list_iterations`].
    pub list_iterations: usize,
    /// See [`BenchmarkConfig::concurrency`].
    pub concurrency: usize,
    /// See [`BenchmarkConfig::key_prefix`].
    pub key_prefix: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            num_keys: DEFAULT_NUM_KEYS,
            obj_length: DEFAULT_OBJ_LENGTH,
            list_iterations: DEFAULT_LIST_ITERATIONS,
            concurrency: 1,
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
        }
    }
}

/// The validated configuration of one benchmark run.
///
/// Built once per request and passed by reference to every phase of the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Operation to measure.
    pub request_type: RequestType,
    /// Bucket to run against.
    pub bucket: String,
    /// Keys supplied by the caller.
    pub keys: Option<Vec<String>>,
    /// Number of keys to generate or discover, at most [`MAX_KEYS`].
    pub num_keys: usize,
    /// Payload length of written objects, in bytes.
    pub obj_length: usize,
    /// Number of listing calls per backend.
    pub list_iterations: usize,
    /// Number of calls in flight against one backend at a time, at least 1.
    pub concurrency: usize,
    /// Prefix of generated key names.
    pub key_prefix: String,
}

impl BenchmarkConfig {
    /// Validates a request and fills unset fields from `defaults`.
    ///
    /// The key count is clamped to [`MAX_KEYS`].
    pub fn from_request(request: BenchmarkRequest, defaults: &Defaults) -> BenchResult<Self> {
        let request_type = match request.request_type.as_deref() {
            Some(name) => name.parse()?,
            None => RequestType::All,
        };

        let bucket = request.bucket.trim().to_owned();
        if bucket.is_empty() {
            return Err(BenchError::InvalidRequest("bucket must not be empty".into()));
        }

        let requested_keys = request.num_keys.unwrap_or(defaults.num_keys);
        let num_keys = requested_keys.min(MAX_KEYS);
        if num_keys < requested_keys {
            tracing::debug!(requested_keys, num_keys, "clamped key count");
        }

        let list_iterations = request.list_iterations.unwrap_or(defaults.list_iterations);
        if list_iterations == 0 {
            return Err(BenchError::InvalidRequest(
                "listIterations must be at least 1".into(),
            ));
        }

        Ok(Self {
            request_type,
            bucket,
            keys: request.keys,
            num_keys,
            obj_length: request.obj_length.unwrap_or(defaults.obj_length),
            list_iterations,
            concurrency: request.concurrency.unwrap_or(defaults.concurrency).max(1),
            key_prefix: defaults.key_prefix.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> BenchmarkRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn parses_request_types_case_insensitively() {
        assert_eq!(
            "get_object_passthrough_ttfb".parse::<RequestType>().unwrap(),
            RequestType::GetObjectPassthroughTtfb
        );
        assert_eq!(
            " List_Objects_V2 ".parse::<RequestType>().unwrap(),
            RequestType::ListObjectsV2
        );

        let err = "copy_object".parse::<RequestType>().unwrap_err();
        assert!(matches!(err, BenchError::UnsupportedRequestType(name) if name == "copy_object"));
    }

    #[test]
    fn applies_defaults() {
        let config = BenchmarkConfig::from_request(
            request(serde_json::json!({"bucket": "bench"})),
            &Defaults::default(),
        )
        .unwrap();

        assert_eq!(config.request_type, RequestType::All);
        assert_eq!(config.num_keys, 1000);
        assert_eq!(config.obj_length, 100);
        assert_eq!(config.list_iterations, 10);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.key_prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(config.keys, None);
    }

    #[test]
    fn clamps_key_count() {
        let config = BenchmarkConfig::from_request(
            request(serde_json::json!({
                "requestType": "put_object",
                "bucket": "bench",
                "numKeys": 5000,
                "objLength": 1024,
            })),
            &Defaults::default(),
        )
        .unwrap();

        assert_eq!(config.request_type, RequestType::PutObject);
        assert_eq!(config.num_keys, MAX_KEYS);
        assert_eq!(config.obj_length, 1024);
    }

    #[test]
    fn rejects_invalid_requests() {
        let defaults = Defaults::default();

        let err = BenchmarkConfig::from_request(
            request(serde_json::json!({"requestType": "head_object", "bucket": "bench"})),
            &defaults,
        )
        .unwrap_err();
        assert!(matches!(err, BenchError::UnsupportedRequestType(_)));

        let err = BenchmarkConfig::from_request(
            request(serde_json::json!({"bucket": "  "})),
            &defaults,
        )
        .unwrap_err();
        assert!(matches!(err, BenchError::InvalidRequest(_)));

        let err = BenchmarkConfig::from_request(
            request(serde_json::json!({"bucket": "bench", "listIterations": 0})),
            &defaults,
        )
        .unwrap_err();
        assert!(matches!(err, BenchError::InvalidRequest(_)));
    }

    #[test]
    fn missing_bucket_fails_to_parse() {
        let result = serde_json::from_value::<BenchmarkRequest>(serde_json::json!({}));
        assert!(result.is_err());
    }
}
