//! Synthesis and discovery of the keys a benchmark operates on.

use s3perf_backend::Backend;

use crate::config::MAX_KEYS;
use crate::error::BenchResult;

/// Produces key names for benchmark runs.
#[derive(Clone, Debug)]
pub struct KeyGenerator {
    prefix: String,
}

impl KeyGenerator {
    /// Creates a generator for keys starting with `prefix`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns `n` names of the form `<prefix><index>`.
    ///
    /// The result only depends on the prefix and `n`, so both backends operate on the same
    /// logical set of objects.
    pub fn generate(&self, n: usize) -> Vec<String> {
        (0..n).map(|index| format!("{}{index}", self.prefix)).collect()
    }

    /// Lists up to `cap` keys that already exist in `bucket`.
    ///
    /// Read benchmarks use this to target previously populated objects instead of keys that may
    /// not exist. `cap` is clamped to [`MAX_KEYS`].
    pub async fn discover(
        &self,
        backend: &dyn Backend,
        bucket: &str,
        cap: usize,
    ) -> BenchResult<Vec<String>> {
        let cap = cap.min(MAX_KEYS);
        let mut page = backend.list_objects(bucket, cap).await?;
        page.keys.truncate(cap);

        tracing::debug!(
            backend = backend.name(),
            bucket,
            keys = page.keys.len(),
            "discovered existing keys"
        );
        Ok(page.keys)
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_KEY_PREFIX)
    }
}
