//! Single operations against one backend, used to inspect objects and buckets by hand.

use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use s3perf_backend::{HeadBucketResponse, HeadResponse};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::backends::{BackendKind, Backends};
use crate::config::MAX_KEYS;
use crate::error::{BenchError, BenchResult};
use crate::validate;
use crate::wire::WireFormat;

/// The operation to perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpsRequestType {
    /// List all buckets of the account.
    ListBuckets,
    /// List the first page of keys in a bucket.
    ListObjectsV2,
    /// Download an object and hash it.
    GetObject,
    /// Retrieve an object's metadata.
    HeadObject,
    /// Check that a bucket exists.
    HeadBucket,
}

impl OpsRequestType {
    /// The name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListBuckets => "LIST_BUCKETS",
            Self::ListObjectsV2 => "LIST_OBJECTS_V2",
            Self::GetObject => "GET_OBJECT",
            Self::HeadObject => "HEAD_OBJECT",
            Self::HeadBucket => "HEAD_BUCKET",
        }
    }
}

impl fmt::Display for OpsRequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpsRequestType {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LIST_BUCKETS" => Ok(Self::ListBuckets),
            "LIST_OBJECTS_V2" => Ok(Self::ListObjectsV2),
            "GET_OBJECT" => Ok(Self::GetObject),
            "HEAD_OBJECT" => Ok(Self::HeadObject),
            "HEAD_BUCKET" => Ok(Self::HeadBucket),
            _ => Err(BenchError::UnsupportedRequestType(s.to_owned())),
        }
    }
}

/// Parses the backend selector of an ops request.
///
/// `S3` and `BOLT` are accepted as aliases of `REFERENCE` and `ACCELERATED`.
fn parse_sdk_type(s: &str) -> BenchResult<BackendKind> {
    match s.trim().to_ascii_uppercase().as_str() {
        "REFERENCE" | "S3" => Ok(BackendKind::Reference),
        "ACCELERATED" | "BOLT" => Ok(BackendKind::Accelerated),
        _ => Err(BenchError::InvalidRequest(format!("unknown sdkType `{s}`"))),
    }
}

/// A raw ops request as received on the wire.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsRequest {
    /// The operation, e.g. `HEAD_OBJECT`.
    pub request_type: String,
    /// The backend to send the request to. Defaults to the reference backend.
    #[serde(default)]
    pub sdk_type: Option<String>,
    /// Bucket to operate on, required by all operations except `LIST_BUCKETS`.
    #[serde(default)]
    pub bucket: Option<String>,
    /// Key to operate on, for object operations.
    #[serde(default)]
    pub key: Option<String>,
}

impl OpsRequest {
    fn bucket(&self) -> BenchResult<&str> {
        required(self.bucket.as_deref(), "bucket")
    }

    fn key(&self) -> BenchResult<&str> {
        required(self.key.as_deref(), "key")
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> BenchResult<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(BenchError::InvalidRequest(format!("{field} is required"))),
    }
}

/// The result of an ops request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpsResponse {
    /// Names of all buckets.
    Buckets(Vec<String>),
    /// Keys of the first listing page.
    Objects(Vec<String>),
    /// Upper-case hex MD5 of the object body.
    Md5(String),
    /// Object metadata.
    HeadObject(HeadResponse),
    /// Bucket status.
    HeadBucket(HeadBucketResponse),
}

impl WireFormat for OpsResponse {
    fn to_wire(&self) -> Value {
        match self {
            Self::Buckets(buckets) => json!({ "buckets": buckets }),
            Self::Objects(objects) => json!({ "objects": objects }),
            Self::Md5(digest) => json!({ "md5": digest }),
            Self::HeadObject(head) => json!({
                "Expiration": head.expiration,
                "lastModified": head.last_modified.as_deref().map(iso8601),
                "ContentLength": head.content_length,
                "ContentEncoding": head.content_encoding,
                "ETag": head.etag,
                "VersionId": head.version_id,
                "StorageClass": head.storage_class,
            }),
            Self::HeadBucket(head) => json!({
                "statusCode": head.status_code,
                "region": head.region,
            }),
        }
    }
}

/// Renders an HTTP date such as `Wed, 21 Oct 2015 07:28:00 GMT` as ISO-8601.
///
/// Values that are not HTTP dates are passed through unchanged.
fn iso8601(http_date: &str) -> String {
    DateTime::parse_from_rfc2822(http_date)
        .map(|date| date.to_rfc3339())
        .unwrap_or_else(|_| http_date.to_owned())
}

/// Runs a single ops request against the selected backend.
pub async fn execute(backends: &Backends, request: &OpsRequest) -> BenchResult<OpsResponse> {
    let request_type: OpsRequestType = request.request_type.parse()?;
    let kind = match request.sdk_type.as_deref() {
        Some(sdk_type) => parse_sdk_type(sdk_type)?,
        None => BackendKind::Reference,
    };
    let backend = backends.get(kind);

    tracing::debug!(backend = %kind, %request_type, "executing ops request");

    let response = match request_type {
        OpsRequestType::ListBuckets => OpsResponse::Buckets(backend.list_buckets().await?.buckets),
        OpsRequestType::ListObjectsV2 => {
            let page = backend.list_objects(request.bucket()?, MAX_KEYS).await?;
            OpsResponse::Objects(page.keys)
        }
        OpsRequestType::GetObject => {
            let key = request.key()?;
            let object = validate::fetch(backend, request.bucket()?, key).await?;
            OpsResponse::Md5(validate::md5_upper_hex(key, &object.body, false)?)
        }
        OpsRequestType::HeadObject => {
            let head = backend.head_object(request.bucket()?, request.key()?).await?;
            OpsResponse::HeadObject(head)
        }
        OpsRequestType::HeadBucket => {
            OpsResponse::HeadBucket(backend.head_bucket(request.bucket()?).await?)
        }
    };

    Ok(response)
}

/// Parses a JSON event and executes it.
pub async fn process_event(backends: &Backends, event: Value) -> BenchResult<OpsResponse> {
    let request: OpsRequest = serde_json::from_value(event)?;
    execute(backends, &request).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use s3perf_backend::{CallKind, InMemoryBackend};

    use super::*;

    fn backends() -> (Arc<InMemoryBackend>, Arc<InMemoryBackend>, Backends) {
        let reference = Arc::new(InMemoryBackend::new("reference"));
        let accelerated = Arc::new(InMemoryBackend::new("accelerated"));
        let backends = Backends::new(reference.clone(), accelerated.clone());
        (reference, accelerated, backends)
    }

    #[tokio::test]
    async fn lists_objects_on_reference_by_default() {
        let (reference, accelerated, backends) = backends();
        reference.insert("bucket", "a", "1");
        reference.insert("bucket", "b", "2");

        let event = json!({"requestType": "list_objects_v2", "bucket": "bucket"});
        let response = process_event(&backends, event).await.unwrap();

        assert_eq!(response.to_wire(), json!({"objects": ["a", "b"]}));
        assert!(accelerated.calls().is_empty());
    }

    #[tokio::test]
    async fn bolt_alias_selects_accelerated() {
        let (reference, accelerated, backends) = backends();
        accelerated.insert("bucket", "key", "hello world");

        let event = json!({
            "requestType": "GET_OBJECT",
            "sdkType": "BOLT",
            "bucket": "bucket",
            "key": "key",
        });
        let response = process_event(&backends, event).await.unwrap();

        assert_eq!(
            response,
            OpsResponse::Md5("5EB63BBBE01EEED093CB22BB8F5ACDC3".into())
        );
        assert!(reference.calls().is_empty());
    }

    #[tokio::test]
    async fn lists_buckets_without_a_bucket() {
        let (reference, accelerated, backends) = backends();
        reference.insert("logs", "a", "1");
        reference.insert("data", "b", "2");
        accelerated.insert("cache", "c", "3");

        let event = json!({"requestType": "list_buckets", "sdkType": "S3"});
        let response = process_event(&backends, event).await.unwrap();

        assert_eq!(response.to_wire(), json!({"buckets": ["data", "logs"]}));
        assert_eq!(reference.calls()[0].kind, CallKind::ListBuckets);
        assert!(accelerated.calls().is_empty());
    }

    #[test]
    fn last_modified_is_rendered_as_iso8601() {
        let head = HeadResponse {
            last_modified: Some("Wed, 21 Oct 2015 07:28:00 GMT".into()),
            ..Default::default()
        };

        let wire = OpsResponse::HeadObject(head).to_wire();

        assert_eq!(wire["lastModified"], json!("2015-10-21T07:28:00+00:00"));
        assert_eq!(iso8601("yesterday"), "yesterday");
    }

    #[tokio::test]
    async fn head_object_renders_metadata() {
        let (reference, _, backends) = backends();
        reference.insert_encoded("bucket", "key", "abc", Some("gzip"));

        let event = json!({"requestType": "HEAD_OBJECT", "bucket": "bucket", "key": "key"});
        let wire = process_event(&backends, event).await.unwrap().to_wire();

        assert_eq!(wire["ContentLength"], json!(3));
        assert_eq!(wire["ContentEncoding"], json!("gzip"));
        assert!(wire.get("lastModified").is_some());
        assert_eq!(reference.calls()[0].kind, CallKind::HeadObject);
    }

    #[tokio::test]
    async fn head_bucket_reports_status() {
        let (_, _, backends) = backends();

        let event = json!({"requestType": "HEAD_BUCKET", "sdkType": "s3", "bucket": "bucket"});
        let wire = process_event(&backends, event).await.unwrap().to_wire();

        assert_eq!(wire["statusCode"], json!(200));
        assert_eq!(wire["region"], json!("local"));
    }

    #[tokio::test]
    async fn rejects_unknown_request_types() {
        let (reference, _, backends) = backends();

        let event = json!({"requestType": "LIST_VERSIONS", "bucket": "bucket"});
        let error = process_event(&backends, event).await.unwrap_err();

        assert!(
            matches!(error, BenchError::UnsupportedRequestType(ref name) if name == "LIST_VERSIONS")
        );
        assert!(reference.calls().is_empty());
    }

    #[tokio::test]
    async fn requires_key_for_object_operations() {
        let (_, _, backends) = backends();

        let event = json!({"requestType": "HEAD_OBJECT", "bucket": "bucket"});
        let error = process_event(&backends, event).await.unwrap_err();

        assert!(matches!(error, BenchError::InvalidRequest(_)));
    }

    #[test]
    fn parses_sdk_types() {
        assert_eq!(parse_sdk_type("reference").unwrap(), BackendKind::Reference);
        assert_eq!(parse_sdk_type("S3").unwrap(), BackendKind::Reference);
        assert_eq!(parse_sdk_type("Bolt").unwrap(), BackendKind::Accelerated);
        assert!(parse_sdk_type("gcs").is_err());
    }
}
