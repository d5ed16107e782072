//! Reduction of raw samples into averages and nearest-rank percentiles.
//!
//! Percentiles are taken from a sorted copy of the samples, never from the caller's list. The
//! order in which the mean and percentiles are derived therefore does not matter, and a
//! [`SampleSet`] can be summarized any number of times.

use std::time::Duration;

use serde::Serialize;

use crate::error::{BenchError, BenchResult};

/// An append-only sequence of measurements collected during one workload run.
///
/// Latencies are stored in seconds, object sizes in bytes and throughputs in objects per second.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleSet {
    samples: Vec<f64>,
}

impl SampleSet {
    /// Creates an empty sample set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sample set with room for `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Appends a single value.
    pub fn push(&mut self, value: f64) {
        self.samples.push(value);
    }

    /// Appends a duration, in seconds.
    pub fn push_duration(&mut self, duration: Duration) {
        self.samples.push(duration.as_secs_f64());
    }

    /// The number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no samples have been collected.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The sum of all samples.
    pub fn sum(&self) -> f64 {
        self.samples.iter().sum()
    }

    /// The samples in the order they were collected.
    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }
}

impl FromIterator<f64> for SampleSet {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

/// Average, lower median and 90th percentile of a sample set.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PercentileStats {
    /// Arithmetic mean.
    pub average: f64,
    /// Lower median: for an even number of samples, the smaller of the two central values.
    pub p50: f64,
    /// The sample at sorted index `⌊n·0.9⌋`, without interpolation.
    pub p90: f64,
}

impl PercentileStats {
    /// Summarizes `samples`, failing if there are none.
    pub fn compute(samples: &SampleSet) -> BenchResult<Self> {
        let values = samples.as_slice();
        if values.is_empty() {
            return Err(BenchError::EmptySampleSet);
        }

        let n = values.len();
        let average = samples.sum() / n as f64;

        let mut sorted = values.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);

        Ok(Self {
            average,
            p50: sorted[lower_median_index(n)],
            p90: sorted[nearest_rank_index(n, 9, 10)],
        })
    }
}

/// Index of the lower median in a sorted list of `n > 0` values.
fn lower_median_index(n: usize) -> usize {
    (n - 1) / 2
}

/// Index `⌊n·num/den⌋` in a sorted list of `n > 0` values, for a fraction below 1.
///
/// Computed in integers so that e.g. `10 · 0.9` is exactly 9.
fn nearest_rank_index(n: usize, num: usize, den: usize) -> usize {
    (n * num / den).min(n - 1)
}

/// Throughput of an operation, in objects per second.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Throughput {
    /// One overall rate for the run: number of samples divided by the total latency.
    Aggregate(f64),
    /// Distribution of per-call rates, used for listings.
    Distribution(PercentileStats),
}

/// The statistics derived from one workload run against one backend.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OperationStats {
    /// Latency, in seconds.
    pub latency: PercentileStats,
    /// Throughput, in objects per second.
    pub throughput: Throughput,
    /// Object sizes, in bytes, when sizes were collected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_size: Option<PercentileStats>,
}

/// Reduces raw samples of one run into [`OperationStats`].
///
/// When `throughputs` contains per-call rates, they are summarized like latencies. Otherwise the
/// throughput is the aggregate `count / total latency` of the run, which is not the same as the
/// mean of per-call rates. Object sizes are summarized only if any were collected.
pub fn compute(
    latencies: &SampleSet,
    throughputs: Option<&SampleSet>,
    sizes: Option<&SampleSet>,
) -> BenchResult<OperationStats> {
    let latency = PercentileStats::compute(latencies)?;

    let throughput = match throughputs {
        Some(rates) => Throughput::Distribution(PercentileStats::compute(rates)?),
        None => Throughput::Aggregate(rate(latencies.len(), latencies.sum())),
    };

    let object_size = match sizes {
        Some(sizes) if !sizes.is_empty() => Some(PercentileStats::compute(sizes)?),
        _ => None,
    };

    Ok(OperationStats {
        latency,
        throughput,
        object_size,
    })
}

/// Objects per second, reporting zero if no time was measured at all.
pub(crate) fn rate(count: usize, secs: f64) -> f64 {
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}
