//! Policy wire schema and typed model for Triage.
//!
//! This crate provides:
//! - the JSON policy document format (the stable wire shape)
//! - a typed, validated policy model
//! - parsing with strict structural validation
//!
//! # Example
//!
//! ```rust,ignore
//! use triage_policy::parse;
//!
//! let input = r#"{"policies": [{"id": "drop-debug", "log": {
//!     "match": [{"log_field": "severity_text", "exact": "DEBUG"}],
//!     "keep": "none"
//! }}]}"#;
//!
//! let set = parse(input)?;
//! assert_eq!(set.logs.len(), 1);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod model;
pub mod parser;
pub mod schema;

pub use error::{Error, Result};
pub use model::{
    FieldRef, Keep, LogField, Matcher, MetricField, Policy, PolicySet, Predicate, RateLimitConfig,
    RateWindow, SampleConfig, SampleMode, Signal, TraceField, Transform, TransformKind,
};
pub use parser::{parse, parse_slice};
