//! Field access over OTLP spans.

use std::borrow::Cow;

use opentelemetry_proto::tonic::common::v1::{InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::Span;
use triage_engine::FieldAccessor;
use triage_policy::{FieldRef, TraceField};

use crate::value;

/// Accessor over one span in its resource/scope context.
#[derive(Debug)]
pub struct SpanAccessor<'a> {
    span: &'a mut Span,
    resource: Option<&'a mut Resource>,
    scope: Option<&'a mut InstrumentationScope>,
    resource_schema_url: &'a str,
    scope_schema_url: &'a str,
}

impl<'a> SpanAccessor<'a> {
    /// An accessor over a bare span, with no resource or scope context.
    #[must_use]
    pub fn new(span: &'a mut Span) -> Self {
        Self {
            span,
            resource: None,
            scope: None,
            resource_schema_url: "",
            scope_schema_url: "",
        }
    }

    /// Attaches the span's resource and its schema URL.
    #[must_use]
    pub fn with_resource(mut self, resource: Option<&'a mut Resource>, schema_url: &'a str) -> Self {
        self.resource = resource;
        self.resource_schema_url = schema_url;
        self
    }

    /// Attaches the span's instrumentation scope and its schema URL.
    #[must_use]
    pub fn with_scope(
        mut self,
        scope: Option<&'a mut InstrumentationScope>,
        schema_url: &'a str,
    ) -> Self {
        self.scope = scope;
        self.scope_schema_url = schema_url;
        self
    }

    fn attr_list(&self, field: &FieldRef<TraceField>) -> Option<&[KeyValue]> {
        match field {
            FieldRef::RecordAttribute(_) => Some(&self.span.attributes),
            FieldRef::ResourceAttribute(_) => {
                self.resource.as_deref().map(|r| r.attributes.as_slice())
            }
            FieldRef::ScopeAttribute(_) => self.scope.as_deref().map(|s| s.attributes.as_slice()),
            FieldRef::Field(_) => None,
        }
    }

    fn attr_list_mut(&mut self, field: &FieldRef<TraceField>) -> Option<&mut Vec<KeyValue>> {
        match field {
            FieldRef::RecordAttribute(_) => Some(&mut self.span.attributes),
            FieldRef::ResourceAttribute(_) => self.resource.as_deref_mut().map(|r| &mut r.attributes),
            FieldRef::ScopeAttribute(_) => self.scope.as_deref_mut().map(|s| &mut s.attributes),
            FieldRef::Field(_) => None,
        }
    }

    fn first_event_name(&self) -> Option<&str> {
        self.span
            .events
            .iter()
            .map(|event| event.name.as_str())
            .find(|name| !name.is_empty())
    }
}

/// Canonical lowercase tag for a span kind; unspecified reads as absent.
#[must_use]
pub const fn span_kind_tag(kind: i32) -> Option<&'static str> {
    match kind {
        1 => Some("internal"),
        2 => Some("server"),
        3 => Some("client"),
        4 => Some("producer"),
        5 => Some("consumer"),
        _ => None,
    }
}

/// Canonical lowercase tag for a span status code. A missing status reads as
/// `unset`; the status field is always present.
#[must_use]
pub const fn span_status_tag(code: i32) -> &'static str {
    match code {
        1 => "ok",
        2 => "error",
        _ => "unset",
    }
}

impl FieldAccessor for SpanAccessor<'_> {
    type Field = TraceField;

    fn read(&self, field: &FieldRef<TraceField>) -> Option<Cow<'_, str>> {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                TraceField::Name => value::non_empty(&self.span.name),
                TraceField::TraceId => value::id_hex(&self.span.trace_id).map(Cow::Owned),
                TraceField::SpanId => value::id_hex(&self.span.span_id).map(Cow::Owned),
                TraceField::ParentSpanId => {
                    value::id_hex(&self.span.parent_span_id).map(Cow::Owned)
                }
                TraceField::TraceState => value::non_empty(&self.span.trace_state),
                TraceField::Kind => span_kind_tag(self.span.kind).map(Cow::Borrowed),
                TraceField::Status => {
                    let code = self.span.status.as_ref().map_or(0, |status| status.code);
                    Some(Cow::Borrowed(span_status_tag(code)))
                }
                TraceField::EventName => self.first_event_name().map(Cow::Borrowed),
                TraceField::ScopeName => self
                    .scope
                    .as_deref()
                    .and_then(|s| value::non_empty(&s.name)),
                TraceField::ScopeVersion => self
                    .scope
                    .as_deref()
                    .and_then(|s| value::non_empty(&s.version)),
                TraceField::ResourceSchemaUrl => value::non_empty(self.resource_schema_url),
                TraceField::ScopeSchemaUrl => value::non_empty(self.scope_schema_url),
            };
        }
        let attrs = self.attr_list(field)?;
        value::find_path(attrs, attr_path(field)?)
            .and_then(value::string_value)
            .map(Cow::Borrowed)
    }

    fn is_present(&self, field: &FieldRef<TraceField>) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                TraceField::Name => !self.span.name.is_empty(),
                TraceField::TraceId => value::id_present(&self.span.trace_id),
                TraceField::SpanId => value::id_present(&self.span.span_id),
                TraceField::ParentSpanId => value::id_present(&self.span.parent_span_id),
                TraceField::TraceState => !self.span.trace_state.is_empty(),
                TraceField::Kind => span_kind_tag(self.span.kind).is_some(),
                TraceField::Status => true,
                TraceField::EventName => self.first_event_name().is_some(),
                TraceField::ScopeName => {
                    self.scope.as_deref().is_some_and(|s| !s.name.is_empty())
                }
                TraceField::ScopeVersion => {
                    self.scope.as_deref().is_some_and(|s| !s.version.is_empty())
                }
                TraceField::ResourceSchemaUrl => !self.resource_schema_url.is_empty(),
                TraceField::ScopeSchemaUrl => !self.scope_schema_url.is_empty(),
            };
        }
        self.attr_list(field)
            .zip(attr_path(field))
            .is_some_and(|(attrs, path)| value::find_path(attrs, path).is_some())
    }

    fn set(&mut self, field: &FieldRef<TraceField>, new_value: &str) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                TraceField::Name => {
                    let hit = !self.span.name.is_empty();
                    self.span.name = new_value.to_string();
                    hit
                }
                TraceField::TraceId => {
                    let hit = value::id_present(&self.span.trace_id);
                    self.span.trace_id = value::id_from_hex(new_value, 16);
                    hit
                }
                TraceField::SpanId => {
                    let hit = value::id_present(&self.span.span_id);
                    self.span.span_id = value::id_from_hex(new_value, 8);
                    hit
                }
                TraceField::ParentSpanId => {
                    let hit = value::id_present(&self.span.parent_span_id);
                    self.span.parent_span_id = value::id_from_hex(new_value, 8);
                    hit
                }
                TraceField::TraceState => {
                    let hit = !self.span.trace_state.is_empty();
                    self.span.trace_state = new_value.to_string();
                    hit
                }
                // Enum fields, events, and container metadata are read-only.
                _ => false,
            };
        }
        let Some(key) = field.write_target() else {
            return false;
        };
        let Some(attrs) = self.attr_list_mut(field) else {
            return false;
        };
        value::put(attrs, key, new_value)
    }

    fn remove(&mut self, field: &FieldRef<TraceField>) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                TraceField::Name => {
                    let hit = !self.span.name.is_empty();
                    self.span.name.clear();
                    hit
                }
                TraceField::TraceId => {
                    let hit = value::id_present(&self.span.trace_id);
                    self.span.trace_id = Vec::new();
                    hit
                }
                TraceField::SpanId => {
                    let hit = value::id_present(&self.span.span_id);
                    self.span.span_id = Vec::new();
                    hit
                }
                TraceField::ParentSpanId => {
                    let hit = value::id_present(&self.span.parent_span_id);
                    self.span.parent_span_id = Vec::new();
                    hit
                }
                TraceField::TraceState => {
                    let hit = !self.span.trace_state.is_empty();
                    self.span.trace_state.clear();
                    hit
                }
                _ => false,
            };
        }
        let Some(key) = field.write_target() else {
            return false;
        };
        let Some(attrs) = self.attr_list_mut(field) else {
            return false;
        };
        value::remove(attrs, key)
    }

    fn rename(&mut self, field: &FieldRef<TraceField>, to: &str, upsert: bool) -> bool {
        let Some(key) = field.write_target() else {
            return false;
        };
        let Some(attrs) = self.attr_list_mut(field) else {
            return false;
        };
        value::rename(attrs, key, to, upsert)
    }

    fn trace_id_hex(&self) -> Option<Cow<'_, str>> {
        value::id_hex(&self.span.trace_id).map(Cow::Owned)
    }

    fn trace_state(&self) -> Option<Cow<'_, str>> {
        if self.span.trace_state.is_empty() {
            None
        } else {
            Some(Cow::Borrowed(&self.span.trace_state))
        }
    }

    fn set_trace_state(&mut self, new_value: &str) {
        self.span.trace_state = new_value.to_string();
    }
}

fn attr_path(field: &FieldRef<TraceField>) -> Option<&[String]> {
    match field {
        FieldRef::RecordAttribute(path)
        | FieldRef::ResourceAttribute(path)
        | FieldRef::ScopeAttribute(path) => Some(path),
        FieldRef::Field(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::trace::v1::span::Event;
    use opentelemetry_proto::tonic::trace::v1::Status;

    fn span() -> Span {
        Span {
            name: "GET /checkout".to_string(),
            trace_id: vec![0xaa; 16],
            span_id: vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
            kind: 2,
            trace_state: "vendora=xyz".to_string(),
            attributes: vec![KeyValue {
                key: "http.method".to_string(),
                value: Some(value::string_entry("GET")),
            }],
            status: Some(Status {
                code: 2,
                message: "boom".to_string(),
            }),
            events: vec![Event {
                name: "exception".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn reads_fixed_fields_and_tags() {
        let mut s = span();
        let accessor = SpanAccessor::new(&mut s);
        assert_eq!(
            accessor.read(&FieldRef::Field(TraceField::Name)).as_deref(),
            Some("GET /checkout")
        );
        assert_eq!(
            accessor.read(&FieldRef::Field(TraceField::Kind)).as_deref(),
            Some("server")
        );
        assert_eq!(
            accessor.read(&FieldRef::Field(TraceField::Status)).as_deref(),
            Some("error")
        );
        assert_eq!(
            accessor
                .read(&FieldRef::Field(TraceField::EventName))
                .as_deref(),
            Some("exception")
        );
        assert_eq!(
            accessor
                .read(&FieldRef::Field(TraceField::TraceState))
                .as_deref(),
            Some("vendora=xyz")
        );
    }

    #[test]
    fn unspecified_kind_is_absent_but_status_always_present() {
        let mut s = Span::default();
        let accessor = SpanAccessor::new(&mut s);
        assert_eq!(accessor.read(&FieldRef::Field(TraceField::Kind)), None);
        assert!(!accessor.is_present(&FieldRef::Field(TraceField::Kind)));

        assert_eq!(
            accessor.read(&FieldRef::Field(TraceField::Status)).as_deref(),
            Some("unset")
        );
        assert!(accessor.is_present(&FieldRef::Field(TraceField::Status)));
    }

    #[test]
    fn parent_span_id_absent_on_root_spans() {
        let mut s = span();
        let accessor = SpanAccessor::new(&mut s);
        assert_eq!(
            accessor.read(&FieldRef::Field(TraceField::ParentSpanId)),
            None
        );
        assert_eq!(
            accessor.read(&FieldRef::Field(TraceField::SpanId)).as_deref(),
            Some("0102030405060708")
        );
    }

    #[test]
    fn trace_capabilities() {
        let mut s = span();
        let mut accessor = SpanAccessor::new(&mut s);
        assert_eq!(
            accessor.trace_id_hex().as_deref(),
            Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
        assert_eq!(accessor.trace_state().as_deref(), Some("vendora=xyz"));

        accessor.set_trace_state("ot=th:8,vendora=xyz");
        assert_eq!(s.trace_state, "ot=th:8,vendora=xyz");
    }

    #[test]
    fn attribute_round_trip() {
        let mut s = span();
        let mut accessor = SpanAccessor::new(&mut s);
        assert_eq!(
            accessor
                .read(&FieldRef::record_attribute("http.method"))
                .as_deref(),
            Some("GET")
        );
        assert!(accessor.rename(&FieldRef::record_attribute("http.method"), "method", true));
        assert_eq!(
            accessor.read(&FieldRef::record_attribute("method")).as_deref(),
            Some("GET")
        );
        assert!(accessor.remove(&FieldRef::record_attribute("method")));
        assert!(!accessor.is_present(&FieldRef::record_attribute("method")));
    }

    #[test]
    fn event_name_is_read_only() {
        let mut s = span();
        let mut accessor = SpanAccessor::new(&mut s);
        assert!(!accessor.set(&FieldRef::Field(TraceField::EventName), "renamed"));
        assert!(!accessor.remove(&FieldRef::Field(TraceField::EventName)));
        assert_eq!(s.events[0].name, "exception");
    }

    #[test]
    fn kind_and_status_not_writable() {
        let mut s = span();
        let mut accessor = SpanAccessor::new(&mut s);
        assert!(!accessor.set(&FieldRef::Field(TraceField::Kind), "client"));
        assert!(!accessor.remove(&FieldRef::Field(TraceField::Status)));
    }

    #[test]
    fn remove_trace_state_clears_it() {
        let mut s = span();
        let mut accessor = SpanAccessor::new(&mut s);
        assert!(accessor.remove(&FieldRef::Field(TraceField::TraceState)));
        assert_eq!(accessor.trace_state(), None);
    }
}
