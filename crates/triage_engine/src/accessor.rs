//! The capability boundary between the engine and a concrete record.
//!
//! The engine never sees an OTLP struct. It reads and mutates records through
//! a [`FieldAccessor`], so callers with different representations (generated
//! protobuf types, plain maps) can share one evaluation pipeline.

use std::borrow::Cow;

use triage_policy::FieldRef;

/// Read and mutate capabilities over one telemetry record in its
/// resource/scope context.
///
/// Contract:
/// - `read` returns the field's text when the field is present and holds a
///   string. A present-but-empty attribute reads as `Some("")`; an absent
///   field, an unresolvable path, or a non-string value reads as `None`.
///   Fixed string fields whose OTLP encoding cannot distinguish empty from
///   unset (severity text, names, schema URLs) read as `None` when empty.
/// - `is_present` reports raw presence regardless of value type, so an
///   integer attribute is present but unreadable as text.
/// - Mutations return whether the field existed before the operation.
/// - Reads may traverse nested attribute paths; writes only ever target
///   single-segment paths.
///
/// All operations are infallible: an accessor that cannot resolve a field
/// reports absence, never an error.
pub trait FieldAccessor {
    /// The signal's fixed-field enum.
    type Field: Copy;

    /// Reads the field's text.
    fn read(&self, field: &FieldRef<Self::Field>) -> Option<Cow<'_, str>>;

    /// Whether the field is present at all.
    fn is_present(&self, field: &FieldRef<Self::Field>) -> bool;

    /// Writes `value` into the field.
    fn set(&mut self, field: &FieldRef<Self::Field>, value: &str) -> bool;

    /// Removes the field.
    fn remove(&mut self, field: &FieldRef<Self::Field>) -> bool;

    /// Moves an attribute to a new key. With `upsert` false an existing
    /// target key blocks the rename (the source stays untouched).
    fn rename(&mut self, field: &FieldRef<Self::Field>, to: &str, upsert: bool) -> bool;

    /// Lowercase hex trace ID, for signals that carry one.
    fn trace_id_hex(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Raw W3C tracestate text, for signals that carry one.
    fn trace_state(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// Replaces the record's tracestate. No-op for signals without one.
    fn set_trace_state(&mut self, _value: &str) {}
}
