//! Typed policy model.
//!
//! These types represent a validated, well-formed policy set. Invalid states
//! (empty matcher lists, out-of-range percentages, field references for the
//! wrong signal) are rejected by the parser and unrepresentable here.

use serde::{Deserialize, Serialize};

/// Telemetry signal a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Log records.
    Log,
    /// Metric data points.
    Metric,
    /// Spans.
    Trace,
}

impl Signal {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Metric => "metric",
            Self::Trace => "trace",
        }
    }
}

/// Fixed fields of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogField {
    Body,
    SeverityText,
    TraceId,
    SpanId,
    EventName,
    ResourceSchemaUrl,
    ScopeSchemaUrl,
}

impl LogField {
    /// Resolves a wire-format field name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "body" => Some(Self::Body),
            "severity_text" => Some(Self::SeverityText),
            "trace_id" => Some(Self::TraceId),
            "span_id" => Some(Self::SpanId),
            "event_name" => Some(Self::EventName),
            "resource_schema_url" => Some(Self::ResourceSchemaUrl),
            "scope_schema_url" => Some(Self::ScopeSchemaUrl),
            _ => None,
        }
    }

    /// Wire-format name of this field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::SeverityText => "severity_text",
            Self::TraceId => "trace_id",
            Self::SpanId => "span_id",
            Self::EventName => "event_name",
            Self::ResourceSchemaUrl => "resource_schema_url",
            Self::ScopeSchemaUrl => "scope_schema_url",
        }
    }
}

/// Fixed fields of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Name,
    Description,
    Unit,
    Type,
    AggregationTemporality,
    ScopeName,
    ScopeVersion,
    ResourceSchemaUrl,
    ScopeSchemaUrl,
}

impl MetricField {
    /// Resolves a wire-format field name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "description" => Some(Self::Description),
            "unit" => Some(Self::Unit),
            "type" => Some(Self::Type),
            "aggregation_temporality" => Some(Self::AggregationTemporality),
            "scope_name" => Some(Self::ScopeName),
            "scope_version" => Some(Self::ScopeVersion),
            "resource_schema_url" => Some(Self::ResourceSchemaUrl),
            "scope_schema_url" => Some(Self::ScopeSchemaUrl),
            _ => None,
        }
    }

    /// Wire-format name of this field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Unit => "unit",
            Self::Type => "type",
            Self::AggregationTemporality => "aggregation_temporality",
            Self::ScopeName => "scope_name",
            Self::ScopeVersion => "scope_version",
            Self::ResourceSchemaUrl => "resource_schema_url",
            Self::ScopeSchemaUrl => "scope_schema_url",
        }
    }
}

/// Fixed fields of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceField {
    Name,
    TraceId,
    SpanId,
    ParentSpanId,
    TraceState,
    Kind,
    Status,
    EventName,
    ScopeName,
    ScopeVersion,
    ResourceSchemaUrl,
    ScopeSchemaUrl,
}

impl TraceField {
    /// Resolves a wire-format field name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "name" => Some(Self::Name),
            "trace_id" => Some(Self::TraceId),
            "span_id" => Some(Self::SpanId),
            "parent_span_id" => Some(Self::ParentSpanId),
            "trace_state" => Some(Self::TraceState),
            "kind" => Some(Self::Kind),
            "status" => Some(Self::Status),
            "event_name" => Some(Self::EventName),
            "scope_name" => Some(Self::ScopeName),
            "scope_version" => Some(Self::ScopeVersion),
            "resource_schema_url" => Some(Self::ResourceSchemaUrl),
            "scope_schema_url" => Some(Self::ScopeSchemaUrl),
            _ => None,
        }
    }

    /// Wire-format name of this field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::TraceId => "trace_id",
            Self::SpanId => "span_id",
            Self::ParentSpanId => "parent_span_id",
            Self::TraceState => "trace_state",
            Self::Kind => "kind",
            Self::Status => "status",
            Self::EventName => "event_name",
            Self::ScopeName => "scope_name",
            Self::ScopeVersion => "scope_version",
            Self::ResourceSchemaUrl => "resource_schema_url",
            Self::ScopeSchemaUrl => "scope_schema_url",
        }
    }
}

/// A compiled reference to one field of a record.
///
/// `F` is the signal's fixed-field enum. Attribute paths may be nested for
/// reads; writes only ever target single-segment paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRef<F> {
    /// A fixed field of the signal.
    Field(F),
    /// Record-level attribute path: log attributes, the metric data point's
    /// attributes, or span attributes.
    RecordAttribute(Vec<String>),
    /// Resource attribute path.
    ResourceAttribute(Vec<String>),
    /// Instrumentation scope attribute path.
    ScopeAttribute(Vec<String>),
}

impl<F> FieldRef<F> {
    /// A single-key record attribute reference.
    #[must_use]
    pub fn record_attribute(key: impl Into<String>) -> Self {
        Self::RecordAttribute(vec![key.into()])
    }

    /// The attribute key this reference may write to, for depth-1 paths.
    #[must_use]
    pub fn write_target(&self) -> Option<&str> {
        match self {
            Self::RecordAttribute(path)
            | Self::ResourceAttribute(path)
            | Self::ScopeAttribute(path) => {
                if path.len() == 1 {
                    Some(&path[0])
                } else {
                    None
                }
            }
            Self::Field(_) => None,
        }
    }
}

/// A matcher predicate, before compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Byte-for-byte equality (after optional case folding).
    Exact(String),
    /// Prefix match.
    StartsWith(String),
    /// Suffix match.
    EndsWith(String),
    /// Substring match.
    Contains(String),
    /// Regular expression match; compiled at policy load.
    Regex(String),
    /// Presence check. `Exists(false)` matches an absent field.
    Exists(bool),
}

/// One predicate against one field reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Matcher<F> {
    /// The field being inspected.
    pub field: FieldRef<F>,
    /// The predicate applied to the field's value.
    pub predicate: Predicate,
    /// Compare case-insensitively (ASCII folding) for string predicates.
    pub case_insensitive: bool,
    /// Flip the final result, `exists` included.
    pub negate: bool,
}

/// Probabilistic sampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    /// Sample against the policy threshold alone.
    #[default]
    Proportional,
    /// Honor an incoming tracestate threshold; the stricter one wins.
    Equalizing,
}

/// Configuration of a `sample` keep decision.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    /// Keep percentage in `[0, 100]`.
    pub percentage: f64,
    /// Sampling mode.
    pub mode: SampleMode,
    /// Threshold resolution in fractional hex digits, `1..=14`.
    pub precision: u8,
    /// Drop records whose randomness source is missing or malformed.
    pub fail_closed: bool,
    /// Optional record attribute supplying the randomness source instead of
    /// the trace ID.
    pub key: Option<String>,
}

/// Rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateWindow {
    Second,
    Minute,
    Hour,
}

impl RateWindow {
    /// Window length in seconds.
    #[must_use]
    pub const fn seconds(self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3600,
        }
    }
}

/// Configuration of a `rate_limit` keep decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Records admitted per window; bucket capacity.
    pub count: u64,
    /// The refill window.
    pub window: RateWindow,
    /// Optional record attribute partitioning the buckets.
    pub key: Option<String>,
}

/// A policy's keep decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Keep {
    /// Keep every matching record.
    All,
    /// Drop every matching record.
    None,
    /// Keep a deterministic fraction of matching records.
    Sample(SampleConfig),
    /// Keep up to N matching records per window.
    RateLimit(RateLimitConfig),
}

/// Transform operation kind.
///
/// Variant order is execution order within one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransformKind {
    Remove,
    Redact,
    Rename,
    Add,
}

/// One mutation applied to records a policy matched.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<F> {
    /// What the operation does.
    pub kind: TransformKind,
    /// The field it targets.
    pub target: FieldRef<F>,
    /// Replacement value for redact and add.
    pub value: Option<String>,
    /// Target attribute key for rename.
    pub to: Option<String>,
    /// Overwrite an existing target (rename, add).
    pub upsert: bool,
}

/// A validated policy for one signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy<F> {
    /// Unique ID; policies evaluate in byte-ascending ID order.
    pub id: String,
    /// Disabled policies are skipped entirely.
    pub enabled: bool,
    /// AND-combined matchers; never empty.
    pub matchers: Vec<Matcher<F>>,
    /// The keep decision for matching records.
    pub keep: Keep,
    /// Mutations applied to matching records that survive.
    pub transforms: Vec<Transform<F>>,
}

/// A full parsed policy set, split per signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicySet {
    /// Log policies.
    pub logs: Vec<Policy<LogField>>,
    /// Metric policies.
    pub metrics: Vec<Policy<MetricField>>,
    /// Trace policies.
    pub traces: Vec<Policy<TraceField>>,
}

impl PolicySet {
    /// Total number of policies across all signals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.len() + self.metrics.len() + self.traces.len()
    }

    /// True when the set has no policies at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
