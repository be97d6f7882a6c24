//! Policy evaluation core for OpenTelemetry telemetry records.
//!
//! Given a compiled policy set and a stream of records (log records, metric
//! points, spans), the engine decides per record whether to keep or drop it,
//! applies in-place mutations to survivors, and counts matches per policy.
//! Spans kept by probabilistic sampling get a consistent-sampling threshold
//! written into their W3C `tracestate`.
//!
//! The engine is representation-agnostic: records are reached only through
//! the [`FieldAccessor`] capability trait, so callers bring their own OTLP
//! bindings. Evaluation is CPU-bound, lock-free on the hot path, and never
//! fails; every failure mode is caught when a policy set compiles.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triage_engine::{PolicyEngine, PolicyRegistry};
//!
//! let registry = Arc::new(PolicyRegistry::new());
//! registry.update(&triage_policy::parse(policies_json)?)?;
//!
//! let engine = PolicyEngine::new(Arc::clone(&registry));
//! let verdict = engine.evaluate_log(&mut accessor);
//! if verdict.is_drop() {
//!     // discard the record
//! }
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod accessor;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod policy;
pub mod ratelimit;
pub mod registry;
pub mod sampler;
pub mod stats;
pub mod tracestate;
pub mod transform;

#[cfg(test)]
pub(crate) mod testutil;

pub use accessor::FieldAccessor;
pub use engine::{Decision, PolicyEngine, Verdict};
pub use error::{Error, Result};
pub use registry::{FileProvider, PolicyProvider, PolicyRegistry, Snapshot};
pub use stats::{PolicyStats, StatsReport};
