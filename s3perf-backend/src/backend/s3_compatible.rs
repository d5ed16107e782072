use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_ENCODING;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};

use super::common::{
    Backend, DeleteResponse, GetResponse, HeadBucketResponse, HeadResponse, ListBucketsResponse,
    ListResponse, PutResponse,
};
use crate::error::{BackendError, BackendResult};

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("s3perf/", env!("CARGO_PKG_VERSION"));

/// Lifetime of the presigned URLs used to stream object downloads.
const PRESIGN_EXPIRY_SECS: u32 = 300;

/// Connection settings for an S3-compatible endpoint.
#[derive(Clone, Debug, Default)]
pub struct S3CompatibleConfig {
    /// Endpoint URL. When `None`, the AWS endpoint of `region` is used.
    pub endpoint: Option<String>,
    /// Signing region.
    pub region: String,
    /// Use path-style instead of virtual-host-style bucket addressing.
    pub path_style: bool,
    /// Access key id. Falls back to the environment and instance credentials when `None`.
    pub access_key: Option<String>,
    /// Secret access key.
    pub secret_key: Option<String>,
    /// Session token for temporary credentials.
    pub session_token: Option<String>,
    /// Timeout applied to every request.
    pub request_timeout: Option<Duration>,
}

/// A [`Backend`] talking to an S3-compatible HTTP endpoint.
///
/// Requests are signed by `rust-s3`. Downloads go through a presigned URL fetched with `reqwest`,
/// so that the body arrives as a stream and the first chunk can be timed separately.
pub struct S3CompatibleBackend {
    name: &'static str,
    region: Region,
    credentials: Credentials,
    path_style: bool,
    request_timeout: Option<Duration>,
    client: reqwest::Client,
}

impl S3CompatibleBackend {
    /// Creates a new backend from its connection settings.
    pub fn new(name: &'static str, config: S3CompatibleConfig) -> BackendResult<Self> {
        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            config.session_token.as_deref(),
            None,
        )
        .map_err(|e| BackendError::Config(format!("failed to load credentials: {e}")))?;

        let region = match config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region,
                endpoint,
            },
            None => config
                .region
                .parse()
                .map_err(|e| BackendError::Config(format!("invalid region: {e}")))?,
        };

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BackendError::transport("building http client", e))?;

        Ok(Self {
            name,
            region,
            credentials,
            path_style: config.path_style,
            request_timeout: config.request_timeout,
            client,
        })
    }

    fn bucket(&self, name: &str) -> BackendResult<Box<Bucket>> {
        let mut bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| s3_error("creating bucket handle", e))?;

        if self.path_style {
            bucket = bucket.with_path_style();
        }
        if let Some(timeout) = self.request_timeout {
            bucket = bucket
                .with_request_timeout(timeout)
                .map_err(|e| s3_error("configuring request timeout", e))?;
        }

        Ok(bucket)
    }
}

impl fmt::Debug for S3CompatibleBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3CompatibleBackend")
            .field("name", &self.name)
            .field("region", &self.region.to_string())
            .field("path_style", &self.path_style)
            .finish_non_exhaustive()
    }
}

/// Converts a `rust-s3` error, extracting the provider error code from failed responses.
fn s3_error(context: &str, error: S3Error) -> BackendError {
    match error {
        S3Error::HttpFailWithBody(status, body) => service_error(status, &body),
        other => BackendError::transport(context, other),
    }
}

/// Builds a [`BackendError::Service`] from an S3 XML error document.
///
/// Responses without a body (such as failed `HEAD` requests) use the status code as error code.
fn service_error(status: u16, body: &str) -> BackendError {
    let code = xml_element(body, "Code").unwrap_or_else(|| status.to_string());
    let message = xml_element(body, "Message").unwrap_or_else(|| {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown error")
            .to_owned()
    });

    BackendError::Service {
        status,
        code,
        message,
    }
}

/// Builds a listing page from the returned keys, counting them.
fn list_response(keys: impl IntoIterator<Item = String>) -> ListResponse {
    let keys: Vec<String> = keys.into_iter().collect();
    ListResponse {
        key_count: keys.len(),
        keys,
    }
}

fn xml_element(document: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = document.find(&open)? + open.len();
    let end = start + document[start..].find(&close)?;
    Some(document[start..end].trim().to_owned())
}

#[async_trait::async_trait]
impl Backend for S3CompatibleBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    #[tracing::instrument(level = "trace", skip(self, body), fields(backend = self.name))]
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<PutResponse> {
        let response = self
            .bucket(bucket)?
            .put_object(key, &body)
            .await
            .map_err(|e| s3_error("put object", e))?;

        let headers = response.headers();
        Ok(PutResponse {
            etag: headers.get("etag").cloned(),
            version_id: headers.get("x-amz-version-id").cloned(),
        })
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = self.name))]
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse> {
        let url = self
            .bucket(bucket)?
            .presign_get(key, PRESIGN_EXPIRY_SECS, None)
            .await
            .map_err(|e| s3_error("presign get object", e))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::transport("get object", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(service_error(status.as_u16(), &body));
        }

        let content_length = response.content_length();
        let content_encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes_stream()
            .map_err(|e| BackendError::transport("reading object body", e))
            .boxed();

        Ok(GetResponse {
            body,
            content_length,
            content_encoding,
        })
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = self.name))]
    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<DeleteResponse> {
        let response = self
            .bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(|e| s3_error("delete object", e))?;

        Ok(DeleteResponse {
            status_code: response.status_code(),
        })
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = self.name))]
    async fn list_objects(&self, bucket: &str, max_keys: usize) -> BackendResult<ListResponse> {
        let (page, _status) = self
            .bucket(bucket)?
            .list_page(String::new(), None, None, None, Some(max_keys))
            .await
            .map_err(|e| s3_error("list objects", e))?;

        Ok(list_response(page.contents.into_iter().map(|object| object.key)))
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = self.name))]
    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<HeadResponse> {
        let (head, _status) = self
            .bucket(bucket)?
            .head_object(key)
            .await
            .map_err(|e| s3_error("head object", e))?;

        Ok(HeadResponse {
            content_length: head.content_length.and_then(|len| u64::try_from(len).ok()),
            content_encoding: head.content_encoding,
            etag: head.e_tag,
            version_id: head.version_id,
            last_modified: head.last_modified,
            storage_class: head.storage_class,
            expiration: head.expiration,
        })
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = self.name))]
    async fn head_bucket(&self, bucket: &str) -> BackendResult<HeadBucketResponse> {
        let (region, status_code) = self
            .bucket(bucket)?
            .location()
            .await
            .map_err(|e| s3_error("head bucket", e))?;

        Ok(HeadBucketResponse {
            status_code,
            region: Some(region.to_string()),
        })
    }

    #[tracing::instrument(level = "trace", skip(self), fields(backend = self.name))]
    async fn list_buckets(&self) -> BackendResult<ListBucketsResponse> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone())
            .await
            .map_err(|e| s3_error("list buckets", e))?;

        Ok(ListBucketsResponse {
            buckets: response.bucket_names().collect(),
        })
    }
}
