use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::BackendResult;

/// A type-erased [`Backend`] instance.
pub type BoxedBackend = Box<dyn Backend>;

/// A shared [`Backend`] instance.
pub type SharedBackend = Arc<dyn Backend>;

/// The body of an object, streamed in chunks.
pub type PayloadStream = BoxStream<'static, BackendResult<Bytes>>;

/// Operations the benchmark needs from an object storage endpoint.
///
/// Every method maps to exactly one request against the endpoint, so that timing a call measures
/// a single round trip.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Uploads `body` to `key`, overwriting any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<PutResponse>;

    /// Starts downloading the object at `key`.
    ///
    /// The call returns once response headers are available. The body has to be consumed from
    /// [`GetResponse::body`].
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse>;

    /// Deletes the object at `key`.
    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<DeleteResponse>;

    /// Lists a single page of at most `max_keys` objects in the bucket.
    async fn list_objects(&self, bucket: &str, max_keys: usize) -> BackendResult<ListResponse>;

    /// Retrieves the metadata of the object at `key`.
    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<HeadResponse>;

    /// Checks that the bucket exists and returns its region.
    async fn head_bucket(&self, bucket: &str) -> BackendResult<HeadBucketResponse>;

    /// Lists the buckets owned by the configured credentials.
    async fn list_buckets(&self) -> BackendResult<ListBucketsResponse>;
}

/// Response of [`Backend::put_object`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutResponse {
    /// The entity tag of the stored object.
    pub etag: Option<String>,
    /// The version id, if the bucket is versioned.
    pub version_id: Option<String>,
}

/// Response of [`Backend::get_object`].
pub struct GetResponse {
    /// The object's contents.
    pub body: PayloadStream,
    /// The object size as reported by the backend.
    pub content_length: Option<u64>,
    /// The `Content-Encoding` of the object, e.g. `gzip`.
    pub content_encoding: Option<String>,
}

impl GetResponse {
    /// Returns `true` if the backend reports the object as gzip encoded.
    pub fn is_gzip_encoded(&self) -> bool {
        self.content_encoding
            .as_deref()
            .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
    }
}

impl Debug for GetResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetResponse")
            .field("content_length", &self.content_length)
            .field("content_encoding", &self.content_encoding)
            .finish_non_exhaustive()
    }
}

/// Response of [`Backend::delete_object`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeleteResponse {
    /// HTTP status code, usually `204`.
    pub status_code: u16,
}

/// Response of [`Backend::list_objects`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListResponse {
    /// Keys of the listed objects, in the order returned by the backend.
    pub keys: Vec<String>,
    /// Number of keys on this page.
    pub key_count: usize,
}

/// Response of [`Backend::head_object`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadResponse {
    /// Object size in bytes.
    pub content_length: Option<u64>,
    /// The `Content-Encoding` of the object.
    pub content_encoding: Option<String>,
    /// Entity tag, including quotes.
    pub etag: Option<String>,
    /// Version id, if the bucket is versioned.
    pub version_id: Option<String>,
    /// `Last-Modified` timestamp as sent by the backend.
    pub last_modified: Option<String>,
    /// Storage class, e.g. `STANDARD`.
    pub storage_class: Option<String>,
    /// Lifecycle expiration (`x-amz-expiration`).
    pub expiration: Option<String>,
}

/// Response of [`Backend::head_bucket`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadBucketResponse {
    /// HTTP status code of the request.
    pub status_code: u16,
    /// The region the bucket lives in.
    pub region: Option<String>,
}

/// Response of [`Backend::list_buckets`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListBucketsResponse {
    /// Bucket names, in the order returned by the backend.
    pub buckets: Vec<String>,
}
