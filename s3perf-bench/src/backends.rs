//! The pair of endpoints being compared.

use std::fmt;

use s3perf_backend::{Backend, SharedBackend};
use serde::Serialize;

/// Identifies one of the two compared endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The baseline endpoint.
    Reference,
    /// The caching proxy placed in front of the reference endpoint.
    Accelerated,
}

impl BackendKind {
    /// Both backends, in the order they are benchmarked.
    pub const ALL: [BackendKind; 2] = [BackendKind::Reference, BackendKind::Accelerated];

    /// The label used as prefix of report keys.
    pub fn label(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Accelerated => "accelerated",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The reference and accelerated backends used for a run.
#[derive(Clone)]
pub struct Backends {
    reference: SharedBackend,
    accelerated: SharedBackend,
}

impl Backends {
    /// Creates a new pair of backends.
    pub fn new(reference: SharedBackend, accelerated: SharedBackend) -> Self {
        Self {
            reference,
            accelerated,
        }
    }

    /// Returns the backend of the given kind.
    pub fn get(&self, kind: BackendKind) -> &dyn Backend {
        match kind {
            BackendKind::Reference => self.reference.as_ref(),
            BackendKind::Accelerated => self.accelerated.as_ref(),
        }
    }

    /// The reference backend.
    pub fn reference(&self) -> &dyn Backend {
        self.reference.as_ref()
    }

    /// The accelerated backend.
    pub fn accelerated(&self) -> &dyn Backend {
        self.accelerated.as_ref()
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backends")
            .field("reference", &self.reference.name())
            .field("accelerated", &self.accelerated.name())
            .finish()
    }
}
