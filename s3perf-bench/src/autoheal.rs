//! Measures how long it takes until an object becomes readable through the accelerated backend.

use std::time::Duration;

use s3perf_backend::Backend;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;

use crate::backends::Backends;
use crate::error::{BenchError, BenchResult};
use crate::wire::{self, WireFormat};

/// The object to poll for.
#[derive(Clone, Debug, Deserialize)]
pub struct AutoHealRequest {
    /// Bucket of the object.
    pub bucket: String,
    /// Key of the object.
    pub key: String,
}

/// Outcome of a successful poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoHealReport {
    /// Time from the first attempt until the first successful `get`.
    pub elapsed: Duration,
    /// Number of `get` calls, including the successful one.
    pub attempts: u64,
}

impl WireFormat for AutoHealReport {
    fn to_wire(&self) -> Value {
        json!({
            "auto_heal_time": wire::secs(self.elapsed.as_secs_f64()),
            "attempts": self.attempts,
        })
    }
}

/// Repeatedly reads an object until a read succeeds.
///
/// Polling stops at whichever limit is hit first. With neither `max_attempts` nor `timeout`
/// set, polling continues until the object is readable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutoHealPoller {
    /// Pause between two failed attempts.
    pub interval: Duration,
    /// Maximum number of `get` calls.
    pub max_attempts: Option<u64>,
    /// Maximum time spent polling.
    pub timeout: Option<Duration>,
}

impl AutoHealPoller {
    /// A poller without limits that retries immediately.
    pub fn unbounded() -> Self {
        Self {
            interval: Duration::ZERO,
            max_attempts: None,
            timeout: None,
        }
    }

    /// Polls `bucket/key` on `backend` until a `get` succeeds.
    pub async fn poll(
        &self,
        backend: &dyn Backend,
        bucket: &str,
        key: &str,
    ) -> BenchResult<AutoHealReport> {
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            let remaining = self
                .timeout
                .map(|timeout| timeout.saturating_sub(start.elapsed()));

            let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
            let out_of_time = attempts > 0 && remaining.is_some_and(|r| r.is_zero());
            if out_of_attempts || out_of_time {
                return Err(BenchError::AutoHealExhausted {
                    attempts,
                    elapsed: start.elapsed(),
                });
            }

            attempts += 1;
            let attempt = backend.get_object(bucket, key);
            let result = match remaining {
                Some(remaining) => match tokio::time::timeout(remaining, attempt).await {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(BenchError::AutoHealExhausted {
                            attempts,
                            elapsed: start.elapsed(),
                        });
                    }
                },
                None => attempt.await,
            };

            match result {
                Ok(_) => {
                    let report = AutoHealReport {
                        elapsed: start.elapsed(),
                        attempts,
                    };
                    tracing::info!(
                        bucket,
                        key,
                        attempts,
                        elapsed = ?report.elapsed,
                        "object readable"
                    );
                    return Ok(report);
                }
                Err(error) => {
                    tracing::debug!(bucket, key, attempts, %error, "object not readable yet");
                }
            }

            if self.interval.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.interval).await;
            }
        }
    }
}

impl Default for AutoHealPoller {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Parses a JSON event and polls the accelerated backend for the named object.
pub async fn process_event(
    backends: &Backends,
    poller: &AutoHealPoller,
    event: Value,
) -> BenchResult<AutoHealReport> {
    let request: AutoHealRequest = serde_json::from_value(event)?;
    poller
        .poll(backends.accelerated(), &request.bucket, &request.key)
        .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use s3perf_backend::InMemoryBackend;

    use super::*;

    fn bounded(max_attempts: u64) -> AutoHealPoller {
        AutoHealPoller {
            interval: Duration::from_millis(10),
            max_attempts: Some(max_attempts),
            timeout: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn readable_object_heals_on_first_attempt() {
        let backend = InMemoryBackend::new("accelerated");
        backend.insert("bucket", "key", "payload");

        let report = bounded(3).poll(&backend, "bucket", "key").await.unwrap();

        assert_eq!(report.attempts, 1);
        assert_eq!(report.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_after_failures() {
        let backend = InMemoryBackend::new("accelerated");
        backend.insert("bucket", "key", "payload");
        backend.fail_on_call(1, "SlowDown");

        let report = bounded(3).poll(&backend, "bucket", "key").await.unwrap();

        assert_eq!(report.attempts, 2);
        assert_eq!(report.elapsed, Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let backend = InMemoryBackend::new("accelerated");

        let error = bounded(3).poll(&backend, "bucket", "missing").await.unwrap_err();

        assert!(matches!(error, BenchError::AutoHealExhausted { attempts: 3, .. }));
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_timeout() {
        let backend = InMemoryBackend::new("accelerated");
        let poller = AutoHealPoller {
            interval: Duration::from_secs(1),
            max_attempts: None,
            timeout: Some(Duration::from_secs(5)),
        };

        let error = poller.poll(&backend, "bucket", "missing").await.unwrap_err();

        let BenchError::AutoHealExhausted { attempts, elapsed } = error else {
            panic!("unexpected error: {error}");
        };
        assert_eq!(attempts, 5);
        assert_eq!(elapsed, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn heals_once_object_appears() {
        let backend = Arc::new(InMemoryBackend::new("accelerated"));
        let writer = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            writer.insert("bucket", "key", "healed");
        });

        let report = bounded(100).poll(backend.as_ref(), "bucket", "key").await.unwrap();

        assert_eq!(report.attempts, 5);
        assert_eq!(report.elapsed, Duration::from_millis(40));
    }

    #[tokio::test]
    async fn polls_the_accelerated_backend() {
        let reference = Arc::new(InMemoryBackend::new("reference"));
        let accelerated = Arc::new(InMemoryBackend::new("accelerated"));
        accelerated.insert("bucket", "key", "payload");
        let backends = Backends::new(reference.clone(), accelerated.clone());

        let event = json!({"bucket": "bucket", "key": "key"});
        let report = process_event(&backends, &bounded(1), event).await.unwrap();

        assert_eq!(report.attempts, 1);
        assert!(reference.calls().is_empty());
        assert_eq!(accelerated.calls().len(), 1);
    }

    #[test]
    fn wire_format() {
        let report = AutoHealReport {
            elapsed: Duration::from_millis(1250),
            attempts: 4,
        };

        assert_eq!(
            report.to_wire(),
            json!({"auto_heal_time": "1.25 secs", "attempts": 4})
        );
    }
}
