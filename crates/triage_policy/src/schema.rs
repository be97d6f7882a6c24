//! Policy wire schema.
//!
//! The raw JSON shapes of the policy ingest format. These stay loose on
//! purpose: structural rules (exactly one signal, exactly one predicate per
//! matcher, value ranges) are enforced by the parser when it builds the typed
//! model, so a schema error always names the offending policy.

use serde::{Deserialize, Serialize};

use crate::model::{RateWindow, SampleMode};

/// Top-level policy document: `{"policies": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// The full desired policy set.
    #[serde(default)]
    pub policies: Vec<PolicyEntry>,
}

/// One policy as written on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyEntry {
    /// Unique policy ID.
    pub id: String,
    /// Defaults to enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Log signal block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<SignalBlock>,
    /// Metric signal block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<SignalBlock>,
    /// Trace signal block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<SignalBlock>,
}

const fn default_enabled() -> bool {
    true
}

/// The per-signal policy body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBlock {
    /// AND-combined match rules.
    #[serde(rename = "match")]
    pub matchers: Vec<MatchRule>,
    /// The keep decision.
    pub keep: KeepRule,
    /// Ordered transform operations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<TransformRule>,
}

/// A field name or a nested attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameOrPath {
    /// A single key.
    Name(String),
    /// Path segments, outermost first.
    Path(Vec<String>),
}

impl NameOrPath {
    /// Path segments regardless of spelling.
    #[must_use]
    pub fn segments(&self) -> Vec<String> {
        match self {
            Self::Name(name) => vec![name.clone()],
            Self::Path(path) => path.clone(),
        }
    }
}

/// One match rule. Exactly one field reference and exactly one predicate
/// must be set; the parser rejects anything else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRule {
    /// Fixed log field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_field: Option<String>,
    /// Fixed metric field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_field: Option<String>,
    /// Fixed span field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_field: Option<String>,
    /// Log record attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_attribute: Option<NameOrPath>,
    /// Metric data point attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datapoint_attribute: Option<NameOrPath>,
    /// Span attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_attribute: Option<NameOrPath>,
    /// Resource attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_attribute: Option<NameOrPath>,
    /// Instrumentation scope attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_attribute: Option<NameOrPath>,

    /// Exact-match predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<String>,
    /// Prefix predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,
    /// Suffix predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_with: Option<String>,
    /// Substring predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    /// Regular expression predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Presence predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,

    /// ASCII case-insensitive comparison for string predicates.
    #[serde(default)]
    pub case_insensitive: bool,
    /// Flip the final predicate result.
    #[serde(default)]
    pub negate: bool,
}

/// The keep decision on the wire: `"all"`, `"none"`, `{"sample": ...}`, or
/// `{"rate_limit": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeepRule {
    /// `"all"` or `"none"`.
    Word(KeepWord),
    /// Probabilistic sampling.
    Sample {
        /// Sampling parameters.
        sample: SampleRule,
    },
    /// Token-bucket rate limiting.
    RateLimit {
        /// Rate-limit parameters.
        rate_limit: RateLimitRule,
    },
}

/// The two verbatim keep decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepWord {
    /// Keep everything that matches.
    All,
    /// Drop everything that matches.
    None,
}

/// Wire shape of a `sample` decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRule {
    /// Keep percentage.
    pub percentage: f64,
    /// Sampling mode; proportional when omitted.
    #[serde(default)]
    pub mode: SampleMode,
    /// Threshold precision in hex digits.
    #[serde(default = "default_precision")]
    pub precision: u8,
    /// Drop on a missing or malformed randomness source.
    #[serde(default)]
    pub fail_closed: bool,
    /// Record attribute to derive randomness from instead of the trace ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

const fn default_precision() -> u8 {
    4
}

/// Wire shape of a `rate_limit` decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Records admitted per window.
    pub count: u64,
    /// The window.
    pub per: RateWindow,
    /// Record attribute partitioning the buckets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// One transform operation on the wire. Exactly one of the kind keys must be
/// set; the key's value names the target field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformRule {
    /// Remove the target field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove: Option<String>,
    /// Replace the target's value with `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redact: Option<String>,
    /// Rename the target attribute to `to`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    /// Add the target with `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<String>,
    /// Replacement value for redact and add.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Rename destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Overwrite an existing destination.
    #[serde(default)]
    pub upsert: bool,
}
