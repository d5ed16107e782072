//! Uniform access to S3-compatible object storage endpoints.
//!
//! The benchmark harness talks to two endpoints, a *reference* backend and an *accelerated*
//! backend placed in front of it. Both are driven through the same [`Backend`] trait so that the
//! exact same sequence of operations can be timed on each of them.
//!
//! Two implementations are provided:
//!
//! - [`S3CompatibleBackend`] talks to a real endpoint over HTTP.
//! - [`InMemoryBackend`] keeps objects in a `BTreeMap` and is used by tests. It records every call
//!   and can inject failures.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod backend;
mod error;

pub use backend::common::*;
pub use backend::in_memory::{Call, CallKind, InMemoryBackend};
pub use backend::s3_compatible::{S3CompatibleBackend, S3CompatibleConfig};
pub use error::*;
