//! Compares an object as served by both backends.

use std::io::Read;

use bytes::{Bytes, BytesMut};
use flate2::read::MultiGzDecoder;
use futures::TryStreamExt;
use s3perf_backend::Backend;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::backends::Backends;
use crate::error::{BenchError, BenchResult};
use crate::wire::WireFormat;

/// The object to validate.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    /// Bucket of the object.
    pub bucket: String,
    /// Key of the object.
    pub key: String,
    /// Skip the reference backend, e.g. because the bucket was cleaned. Accepts `"ON"`/`"OFF"` or
    /// a boolean.
    #[serde(default, deserialize_with = "deserialize_switch")]
    pub bucket_clean: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Switch {
    Bool(bool),
    Text(String),
}

fn deserialize_switch<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Switch::deserialize(deserializer)? {
        Switch::Bool(value) => Ok(value),
        Switch::Text(text) => match text.trim().to_ascii_uppercase().as_str() {
            "ON" | "TRUE" => Ok(true),
            "OFF" | "FALSE" => Ok(false),
            _ => Err(D::Error::custom(format!("invalid switch value `{text}`"))),
        },
    }
}

/// Upper-case hex MD5 digests of the object contents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    /// Digest of the reference copy, absent when the bucket is clean.
    pub reference: Option<String>,
    /// Digest of the accelerated copy.
    pub accelerated: String,
}

impl ValidationReport {
    /// Returns `true` if both copies were fetched and their digests are equal.
    pub fn matches(&self) -> bool {
        self.reference.as_deref() == Some(self.accelerated.as_str())
    }
}

impl WireFormat for ValidationReport {
    fn to_wire(&self) -> Value {
        let mut map = Map::new();
        if let Some(ref reference) = self.reference {
            map.insert("reference-md5".into(), reference.clone().into());
        }
        map.insert("accelerated-md5".into(), self.accelerated.clone().into());
        Value::Object(map)
    }
}

/// Fetches `bucket/key` from the accelerated backend and, unless `bucket_clean` is set, from the
/// reference backend, and hashes both bodies.
///
/// Gzip encoded objects and keys ending in `.gz` are decompressed before hashing.
pub async fn compare(
    backends: &Backends,
    bucket: &str,
    key: &str,
    bucket_clean: bool,
) -> BenchResult<ValidationReport> {
    let accelerated = fetch(backends.accelerated(), bucket, key).await?;
    let reference = if bucket_clean {
        None
    } else {
        Some(fetch(backends.reference(), bucket, key).await?)
    };

    let compressed = key.ends_with(".gz")
        || accelerated.gzip
        || reference.as_ref().is_some_and(|object| object.gzip);

    let report = ValidationReport {
        reference: reference
            .map(|object| md5_upper_hex(key, &object.body, compressed))
            .transpose()?,
        accelerated: md5_upper_hex(key, &accelerated.body, compressed)?,
    };

    tracing::info!(bucket, key, compressed, matches = report.matches(), "validated object");
    Ok(report)
}

/// Parses a JSON event and validates the named object.
pub async fn process_event(backends: &Backends, event: Value) -> BenchResult<ValidationReport> {
    let request: ValidationRequest = serde_json::from_value(event)?;
    compare(
        backends,
        &request.bucket,
        &request.key,
        request.bucket_clean,
    )
    .await
}

pub(crate) struct FetchedObject {
    pub body: Bytes,
    pub gzip: bool,
}

/// Downloads an object in full.
pub(crate) async fn fetch(
    backend: &dyn Backend,
    bucket: &str,
    key: &str,
) -> BenchResult<FetchedObject> {
    let response = backend.get_object(bucket, key).await?;
    let gzip = response.is_gzip_encoded();
    let body: BytesMut = response.body.try_collect().await?;

    Ok(FetchedObject {
        body: body.freeze(),
        gzip,
    })
}

/// Hashes `body`, gunzipping it first if `compressed` is set.
///
/// Every member of a concatenated gzip stream is decoded.
pub(crate) fn md5_upper_hex(key: &str, body: &[u8], compressed: bool) -> BenchResult<String> {
    let digest = if compressed {
        let mut decoded = Vec::new();
        MultiGzDecoder::new(body)
            .read_to_end(&mut decoded)
            .map_err(|source| BenchError::Decompress {
                key: key.to_owned(),
                source,
            })?;
        md5::compute(&decoded)
    } else {
        md5::compute(body)
    };

    Ok(format!("{digest:X}"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use s3perf_backend::{CallKind, InMemoryBackend};
    use serde_json::json;

    use super::*;

    // MD5 of "hello world".
    const HELLO_MD5: &str = "5EB63BBBE01EEED093CB22BB8F5ACDC3";

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn backends() -> (Arc<InMemoryBackend>, Arc<InMemoryBackend>, Backends) {
        let reference = Arc::new(InMemoryBackend::new("reference"));
        let accelerated = Arc::new(InMemoryBackend::new("accelerated"));
        let backends = Backends::new(reference.clone(), accelerated.clone());
        (reference, accelerated, backends)
    }

    #[tokio::test]
    async fn hashes_both_copies() {
        let (reference, accelerated, backends) = backends();
        reference.insert("bucket", "key", "hello world");
        accelerated.insert("bucket", "key", "hello world");

        let report = compare(&backends, "bucket", "key", false).await.unwrap();

        assert_eq!(report.reference.as_deref(), Some(HELLO_MD5));
        assert_eq!(report.accelerated, HELLO_MD5);
        assert!(report.matches());
    }

    #[tokio::test]
    async fn reports_mismatches() {
        let (reference, accelerated, backends) = backends();
        reference.insert("bucket", "key", "hello world");
        accelerated.insert("bucket", "key", "stale");

        let report = compare(&backends, "bucket", "key", false).await.unwrap();

        assert!(!report.matches());
    }

    #[tokio::test]
    async fn clean_bucket_skips_reference() {
        let (reference, accelerated, backends) = backends();
        accelerated.insert("bucket", "key", "hello world");

        let report = compare(&backends, "bucket", "key", true).await.unwrap();

        assert_eq!(report.reference, None);
        assert!(reference.calls().is_empty());
        assert_eq!(
            report.to_wire(),
            json!({"accelerated-md5": HELLO_MD5})
        );
    }

    #[tokio::test]
    async fn decompresses_gz_keys() {
        let (reference, accelerated, backends) = backends();
        let compressed = gzip(b"hello world");
        reference.insert("bucket", "data.gz", compressed.clone());
        accelerated.insert("bucket", "data.gz", compressed);

        let report = compare(&backends, "bucket", "data.gz", false).await.unwrap();

        assert_eq!(report.accelerated, HELLO_MD5);
        assert!(report.matches());
    }

    #[tokio::test]
    async fn decompresses_gzip_encoded_objects() {
        let (reference, accelerated, backends) = backends();
        let compressed = gzip(b"hello world");
        reference.insert_encoded("bucket", "key", compressed.clone(), Some("gzip"));
        accelerated.insert("bucket", "key", compressed);

        let report = compare(&backends, "bucket", "key", false).await.unwrap();

        assert_eq!(report.reference.as_deref(), Some(HELLO_MD5));
        assert_eq!(report.accelerated, HELLO_MD5);
    }

    #[tokio::test]
    async fn decompresses_every_gzip_member() {
        let (reference, accelerated, backends) = backends();
        let mut members = gzip(b"hello ");
        members.extend(gzip(b"world"));
        reference.insert("bucket", "data.gz", members);
        accelerated.insert("bucket", "data.gz", gzip(b"hello world"));

        let report = compare(&backends, "bucket", "data.gz", false).await.unwrap();

        assert_eq!(report.reference.as_deref(), Some(HELLO_MD5));
        assert!(report.matches());
    }

    #[tokio::test]
    async fn invalid_gzip_is_an_error() {
        let (_, accelerated, backends) = backends();
        accelerated.insert("bucket", "data.gz", "not gzip");

        let error = compare(&backends, "bucket", "data.gz", true).await.unwrap_err();

        assert!(matches!(error, BenchError::Decompress { ref key, .. } if key == "data.gz"));
    }

    #[tokio::test]
    async fn missing_object_fails_without_retry() {
        let (reference, accelerated, backends) = backends();
        accelerated.insert("bucket", "key", "hello world");

        let error = compare(&backends, "bucket", "key", false).await.unwrap_err();

        assert_eq!(error.error_code(), "NoSuchKey");
        let kinds: Vec<_> = reference.calls().into_iter().map(|call| call.kind).collect();
        assert_eq!(kinds, [CallKind::Get]);
        assert_eq!(accelerated.calls().len(), 1);
    }

    #[tokio::test]
    async fn parses_bucket_clean_switch() {
        let (_, accelerated, backends) = backends();
        accelerated.insert("bucket", "key", "hello world");

        for bucket_clean in [json!("ON"), json!("on"), json!(true)] {
            let event = json!({"bucket": "bucket", "key": "key", "bucketClean": bucket_clean});
            let report = process_event(&backends, event).await.unwrap();
            assert_eq!(report.reference, None);
        }

        let event = json!({"bucket": "bucket", "key": "key", "bucketClean": "maybe"});
        let error = process_event(&backends, event).await.unwrap_err();
        assert!(matches!(error, BenchError::InvalidRequest(_)));
    }
}
