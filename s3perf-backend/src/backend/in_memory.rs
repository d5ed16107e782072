//! In-memory backend for tests.
//!
//! This provides a [`Backend`] backed by a `BTreeMap`, so that benchmark runs can be exercised
//! without a storage endpoint. The backend is [`Clone`] so tests can hold a handle for inspection
//! while the harness owns a shared copy.
//!
//! Every call is appended to a call log, and a single call can be made to fail with a provider
//! error code to simulate backend failures.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::StreamExt;

use super::common::{
    Backend, DeleteResponse, GetResponse, HeadBucketResponse, HeadResponse, ListBucketsResponse,
    ListResponse, PutResponse,
};
use crate::error::{BackendError, BackendResult};

/// Size of the chunks a stored body is split into when streamed back.
const CHUNK_SIZE: usize = 16;

/// The kind of a call recorded by [`InMemoryBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// [`Backend::put_object`]
    Put,
    /// [`Backend::get_object`]
    Get,
    /// [`Backend::delete_object`]
    Delete,
    /// [`Backend::list_objects`]
    List,
    /// [`Backend::head_object`]
    HeadObject,
    /// [`Backend::head_bucket`]
    HeadBucket,
    /// [`Backend::list_buckets`]
    ListBuckets,
}

/// A single call made against an [`InMemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// The operation that was invoked.
    pub kind: CallKind,
    /// The bucket the call targeted, empty for [`CallKind::ListBuckets`].
    pub bucket: String,
    /// The object key, for object level operations.
    pub key: Option<String>,
}

#[derive(Clone, Debug)]
struct StoredObject {
    body: Bytes,
    content_encoding: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    calls: Vec<Call>,
    /// 1-based index of the call that should fail, with the error code to report.
    fail_on: Option<(usize, String)>,
}

/// A [`Backend`] keeping all objects in memory.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    name: &'static str,
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    /// Creates an empty backend with the given diagnostic name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked; the map itself is intact.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores an object directly, bypassing the call log.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        self.insert_encoded(bucket, key, body, None);
    }

    /// Stores an object with a `Content-Encoding`, bypassing the call log.
    pub fn insert_encoded(
        &self,
        bucket: &str,
        key: &str,
        body: impl Into<Bytes>,
        content_encoding: Option<&str>,
    ) {
        let object = StoredObject {
            body: body.into(),
            content_encoding: content_encoding.map(str::to_owned),
        };
        self.state()
            .objects
            .insert((bucket.to_owned(), key.to_owned()), object);
    }

    /// Returns the stored contents of an object, if present.
    pub fn get_stored(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state()
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .map(|object| object.body.clone())
    }

    /// Returns `true` if the backend contains the given object.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.state()
            .objects
            .contains_key(&(bucket.to_owned(), key.to_owned()))
    }

    /// Returns the keys stored in `bucket`, in lexicographic order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Returns the names of all buckets holding at least one object, in lexicographic order.
    pub fn buckets(&self) -> Vec<String> {
        let mut buckets: Vec<String> = Vec::new();
        for (bucket, _) in self.state().objects.keys() {
            if buckets.last() != Some(bucket) {
                buckets.push(bucket.clone());
            }
        }
        buckets
    }

    /// Returns all calls made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Makes the `n`-th call (1-based, counting from the first call ever made) fail with a
    /// service error carrying `code`.
    pub fn fail_on_call(&self, n: usize, code: &str) {
        self.state().fail_on = Some((n, code.to_owned()));
    }

    /// Records a call and returns the injected failure, if this call is meant to fail.
    fn record(&self, kind: CallKind, bucket: &str, key: Option<&str>) -> BackendResult<()> {
        let mut state = self.state();
        state.calls.push(Call {
            kind,
            bucket: bucket.to_owned(),
            key: key.map(str::to_owned),
        });

        match &state.fail_on {
            Some((n, code)) if *n == state.calls.len() => Err(BackendError::Service {
                status: 500,
                code: code.clone(),
                message: format!("injected failure on call {n}"),
            }),
            _ => Ok(()),
        }
    }
}

fn no_such_key(key: &str) -> BackendError {
    BackendError::Service {
        status: 404,
        code: "NoSuchKey".into(),
        message: format!("The specified key does not exist: {key}"),
    }
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<PutResponse> {
        self.record(CallKind::Put, bucket, Some(key))?;
        let etag = format!("\"{:x}\"", body.len());
        self.insert(bucket, key, body);
        Ok(PutResponse {
            etag: Some(etag),
            version_id: None,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse> {
        self.record(CallKind::Get, bucket, Some(key))?;
        let object = self
            .state()
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
            .ok_or_else(|| no_such_key(key))?;

        let content_length = Some(object.body.len() as u64);
        let chunks: Vec<BackendResult<Bytes>> = object
            .body
            .chunks(CHUNK_SIZE)
            .map(|chunk| Ok(object.body.slice_ref(chunk)))
            .collect();

        Ok(GetResponse {
            body: futures_util::stream::iter(chunks).boxed(),
            content_length,
            content_encoding: object.content_encoding,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<DeleteResponse> {
        self.record(CallKind::Delete, bucket, Some(key))?;
        self.state()
            .objects
            .remove(&(bucket.to_owned(), key.to_owned()));
        Ok(DeleteResponse { status_code: 204 })
    }

    async fn list_objects(&self, bucket: &str, max_keys: usize) -> BackendResult<ListResponse> {
        self.record(CallKind::List, bucket, None)?;
        let keys: Vec<String> = self.keys(bucket).into_iter().take(max_keys).collect();
        Ok(ListResponse {
            key_count: keys.len(),
            keys,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<HeadResponse> {
        self.record(CallKind::HeadObject, bucket, Some(key))?;
        let state = self.state();
        let object = state
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .ok_or_else(|| no_such_key(key))?;

        Ok(HeadResponse {
            content_length: Some(object.body.len() as u64),
            content_encoding: object.content_encoding.clone(),
            etag: Some(format!("\"{:x}\"", object.body.len())),
            ..Default::default()
        })
    }

    async fn head_bucket(&self, bucket: &str) -> BackendResult<HeadBucketResponse> {
        self.record(CallKind::HeadBucket, bucket, None)?;
        Ok(HeadBucketResponse {
            status_code: 200,
            region: Some("local".into()),
        })
    }

    async fn list_buckets(&self) -> BackendResult<ListBucketsResponse> {
        self.record(CallKind::ListBuckets, "", None)?;
        Ok(ListBucketsResponse {
            buckets: self.buckets(),
        })
    }
}
