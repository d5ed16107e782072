//! Timed execution of a single operation type against one backend.
//!
//! Every measurement wraps exactly one backend call: the timer starts right before the call and
//! stops right after it, or after the first or last body chunk for downloads. Payloads are
//! generated before the timer starts.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use s3perf_backend::Backend;
use serde::Serialize;

use crate::config::{BenchmarkConfig, MAX_KEYS};
use crate::error::{BenchError, BenchResult};
use crate::stats::{self, OperationStats, SampleSet};

/// An operation that can be measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Upload a random payload per key.
    Put,
    /// Download each key in full.
    Get,
    /// Download the first byte of each key.
    GetTtfb,
    /// Download each key in full from an unmonitored bucket.
    GetPassthrough,
    /// Download the first byte of each key from an unmonitored bucket.
    GetPassthroughTtfb,
    /// Delete each key.
    Delete,
    /// List a page of objects repeatedly.
    ListObjectsV2,
}

impl Operation {
    /// The label used in report keys.
    pub fn label(self) -> &'static str {
        match self {
            Self::Put => "put_obj",
            Self::Get => "get_obj",
            Self::GetTtfb => "get_obj_ttfb",
            Self::GetPassthrough => "get_obj_passthrough",
            Self::GetPassthroughTtfb => "get_obj_passthrough_ttfb",
            Self::Delete => "del_obj",
            Self::ListObjectsV2 => "list_objects_v2",
        }
    }

    /// Returns `true` for downloads, which collect object sizes and compression counts.
    pub fn is_read(self) -> bool {
        self.read_mode().is_some()
    }

    fn read_mode(self) -> Option<ReadMode> {
        match self {
            Self::Get | Self::GetPassthrough => Some(ReadMode::Full),
            Self::GetTtfb | Self::GetPassthroughTtfb => Some(ReadMode::FirstByte),
            Self::Put | Self::Delete | Self::ListObjectsV2 => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How much of an object body a download waits for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Drain the whole body.
    Full,
    /// Stop after the first byte arrived.
    FirstByte,
}

/// Number of downloaded objects by encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ObjectCounts {
    /// Objects that are gzip encoded or have a `.gz` key.
    pub compressed: u64,
    /// All other objects.
    pub uncompressed: u64,
}

/// Raw measurements of one operation against one backend.
#[derive(Clone, Debug, Default)]
pub struct RawSamples {
    /// Call latencies, in seconds.
    pub latencies: SampleSet,
    /// Per-call throughput in objects per second, collected for listings only.
    pub throughputs: Option<SampleSet>,
    /// Reported object sizes in bytes, collected for downloads only.
    pub sizes: Option<SampleSet>,
    /// Compression counts, collected for downloads only.
    pub counts: Option<ObjectCounts>,
}

impl RawSamples {
    /// Reduces the samples into statistics.
    pub fn stats(&self) -> BenchResult<OperationStats> {
        stats::compute(
            &self.latencies,
            self.throughputs.as_ref(),
            self.sizes.as_ref(),
        )
    }
}

#[derive(Debug)]
struct ReadSample {
    latency: Duration,
    size: Option<u64>,
    compressed: bool,
}

/// Executes one operation type against a backend, using the settings of a run.
#[derive(Debug)]
pub struct WorkloadRunner<'a> {
    config: &'a BenchmarkConfig,
}

impl<'a> WorkloadRunner<'a> {
    /// Creates a runner for the given run configuration.
    pub fn new(config: &'a BenchmarkConfig) -> Self {
        Self { config }
    }

    /// Runs `operation` against `backend` for every key.
    ///
    /// Listings ignore `keys` and repeat the configured number of listing calls instead.
    pub async fn run(
        &self,
        operation: Operation,
        backend: &dyn Backend,
        keys: &[String],
    ) -> BenchResult<RawSamples> {
        match operation {
            Operation::Put => self.put(backend, keys).await,
            Operation::Delete => self.delete(backend, keys).await,
            Operation::ListObjectsV2 => self.list(backend).await,
            Operation::Get
            | Operation::GetTtfb
            | Operation::GetPassthrough
            | Operation::GetPassthroughTtfb => {
                let mode = operation.read_mode().unwrap_or(ReadMode::Full);
                self.get(backend, keys, mode).await
            }
        }
    }

    /// Calls `op` for every key with at most `concurrency` calls in flight.
    ///
    /// Results keep the order of `keys`. The first error is returned and no further calls are
    /// started.
    async fn for_each_key<'k, F, Fut, T>(
        &self,
        keys: &'k [String],
        mut op: F,
    ) -> BenchResult<Vec<T>>
    where
        F: FnMut(&'k str) -> Fut,
        Fut: Future<Output = BenchResult<T>>,
    {
        futures::stream::iter(keys)
            .map(|key| op(key.as_str()))
            .buffered(self.config.concurrency)
            .try_collect()
            .await
    }

    /// Uploads a random lowercase payload of the configured length to every key.
    ///
    /// All payloads of one call are drawn from a single generator.
    pub async fn put(&self, backend: &dyn Backend, keys: &[String]) -> BenchResult<RawSamples> {
        let bucket = self.config.bucket.as_str();
        let len = self.config.obj_length;
        let mut rng = SmallRng::seed_from_u64(rand::random());

        let latencies = self
            .for_each_key(keys, |key| {
                let body = random_payload(&mut rng, len);
                async move {
                    let start = Instant::now();
                    backend.put_object(bucket, key, body).await?;
                    Ok::<_, BenchError>(start.elapsed())
                }
            })
            .await?;

        Ok(RawSamples {
            latencies: durations(latencies),
            ..Default::default()
        })
    }

    /// Downloads every key, recording latency, reported size and compression.
    pub async fn get(
        &self,
        backend: &dyn Backend,
        keys: &[String],
        mode: ReadMode,
    ) -> BenchResult<RawSamples> {
        let bucket = self.config.bucket.as_str();

        let samples = self
            .for_each_key(keys, |key| async move {
                let start = Instant::now();
                let response = backend.get_object(bucket, key).await?;
                let compressed = response.is_gzip_encoded() || key.ends_with(".gz");
                let size = response.content_length;

                let mut body = response.body;
                while let Some(chunk) = body.next().await {
                    let chunk = chunk?;
                    if mode == ReadMode::FirstByte && !chunk.is_empty() {
                        break;
                    }
                }

                Ok::<_, BenchError>(ReadSample {
                    latency: start.elapsed(),
                    size,
                    compressed,
                })
            })
            .await?;

        let mut latencies = SampleSet::with_capacity(samples.len());
        let mut sizes = SampleSet::new();
        let mut counts = ObjectCounts::default();
        for sample in samples {
            latencies.push_duration(sample.latency);
            if let Some(size) = sample.size {
                sizes.push(size as f64);
            }
            if sample.compressed {
                counts.compressed += 1;
            } else {
                counts.uncompressed += 1;
            }
        }

        Ok(RawSamples {
            latencies,
            throughputs: None,
            sizes: Some(sizes),
            counts: Some(counts),
        })
    }

    /// Deletes every key.
    pub async fn delete(&self, backend: &dyn Backend, keys: &[String]) -> BenchResult<RawSamples> {
        let bucket = self.config.bucket.as_str();

        let latencies = self
            .for_each_key(keys, |key| async move {
                let start = Instant::now();
                backend.delete_object(bucket, key).await?;
                Ok::<_, BenchError>(start.elapsed())
            })
            .await?;

        Ok(RawSamples {
            latencies: durations(latencies),
            ..Default::default()
        })
    }

    /// Lists a single page of the bucket `list_iterations` times.
    ///
    /// Besides the latency, each call yields a throughput of returned keys per second.
    pub async fn list(&self, backend: &dyn Backend) -> BenchResult<RawSamples> {
        let bucket = self.config.bucket.as_str();
        let iterations = self.config.list_iterations;

        let mut latencies = SampleSet::with_capacity(iterations);
        let mut throughputs = SampleSet::with_capacity(iterations);
        for _ in 0..iterations {
            let start = Instant::now();
            let page = backend.list_objects(bucket, MAX_KEYS).await?;
            let elapsed = start.elapsed();

            latencies.push_duration(elapsed);
            throughputs.push(stats::rate(page.key_count, elapsed.as_secs_f64()));
        }

        Ok(RawSamples {
            latencies,
            throughputs: Some(throughputs),
            ..Default::default()
        })
    }
}

fn durations(durations: Vec<Duration>) -> SampleSet {
    durations.into_iter().map(|d| d.as_secs_f64()).collect()
}

/// Generates `len` random lowercase ASCII letters.
fn random_payload(rng: &mut SmallRng, len: usize) -> Bytes {
    (0..len)
        .map(|_| rng.random_range(b'a'..=b'z'))
        .collect::<Vec<u8>>()
        .into()
}
