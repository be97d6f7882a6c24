//! OTLP bindings for the Triage engine.
//!
//! This crate provides:
//! - `FieldAccessor` implementations over `opentelemetry_proto` generated
//!   types, one per signal (log record, metric, span)
//! - attribute-list helpers for nested reads and top-level writes
//! - canonical lowercase tag readers for OTLP enum fields
//!
//! # Example
//!
//! ```rust,ignore
//! use triage_otlp::LogAccessor;
//!
//! let mut accessor = LogAccessor::new(&mut record)
//!     .with_resource(resource.as_mut(), schema_url);
//! let verdict = engine.evaluate_log(&mut accessor);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod log;
pub mod metric;
pub mod span;
pub mod value;

pub use log::LogAccessor;
pub use metric::MetricAccessor;
pub use span::SpanAccessor;
