//! Field access over OTLP log records.

use std::borrow::Cow;

use opentelemetry_proto::tonic::common::v1::{InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::logs::v1::LogRecord;
use opentelemetry_proto::tonic::resource::v1::Resource;
use triage_engine::FieldAccessor;
use triage_policy::{FieldRef, LogField};

use crate::value;

/// Accessor over one log record in its resource/scope context.
#[derive(Debug)]
pub struct LogAccessor<'a> {
    record: &'a mut LogRecord,
    resource: Option<&'a mut Resource>,
    scope: Option<&'a mut InstrumentationScope>,
    resource_schema_url: &'a str,
    scope_schema_url: &'a str,
}

impl<'a> LogAccessor<'a> {
    /// An accessor over a bare record, with no resource or scope context.
    #[must_use]
    pub fn new(record: &'a mut LogRecord) -> Self {
        Self {
            record,
            resource: None,
            scope: None,
            resource_schema_url: "",
            scope_schema_url: "",
        }
    }

    /// Attaches the record's resource and its schema URL.
    #[must_use]
    pub fn with_resource(mut self, resource: Option<&'a mut Resource>, schema_url: &'a str) -> Self {
        self.resource = resource;
        self.resource_schema_url = schema_url;
        self
    }

    /// Attaches the record's instrumentation scope and its schema URL.
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

    fn attr_list(&self, field: &FieldRef<LogField>) -> Option<&[KeyValue]> {
        match field {
            FieldRef::RecordAttribute(_) => Some(&self.record.attributes),
            FieldRef::ResourceAttribute(_) => {
                self.resource.as_deref().map(|r| r.attributes.as_slice())
            }
            FieldRef::ScopeAttribute(_) => self.scope.as_deref().map(|s| s.attributes.as_slice()),
            FieldRef::Field(_) => None,
        }
    }

    fn attr_list_mut(&mut self, field: &FieldRef<LogField>) -> Option<&mut Vec<KeyValue>> {
        match field {
            FieldRef::RecordAttribute(_) => Some(&mut self.record.attributes),
            FieldRef::ResourceAttribute(_) => self.resource.as_deref_mut().map(|r| &mut r.attributes),
            FieldRef::ScopeAttribute(_) => self.scope.as_deref_mut().map(|s| &mut s.attributes),
            FieldRef::Field(_) => None,
        }
    }
}

fn attr_path(field: &FieldRef<LogField>) -> Option<&[String]> {
    match field {
        FieldRef::RecordAttribute(path)
        | FieldRef::ResourceAttribute(path)
        | FieldRef::ScopeAttribute(path) => Some(path),
        FieldRef::Field(_) => None,
    }
}

impl FieldAccessor for LogAccessor<'_> {
    type Field = LogField;

    fn read(&self, field: &FieldRef<LogField>) -> Option<Cow<'_, str>> {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                LogField::Body => self
                    .record
                    .body
                    .as_ref()
                    .and_then(value::string_value)
                    .map(Cow::Borrowed),
                LogField::SeverityText => value::non_empty(&self.record.severity_text),
                LogField::TraceId => value::id_hex(&self.record.trace_id).map(Cow::Owned),
                LogField::SpanId => value::id_hex(&self.record.span_id).map(Cow::Owned),
                LogField::EventName => value::non_empty(&self.record.event_name),
                LogField::ResourceSchemaUrl => value::non_empty(self.resource_schema_url),
                LogField::ScopeSchemaUrl => value::non_empty(self.scope_schema_url),
            };
        }
        let attrs = self.attr_list(field)?;
        value::find_path(attrs, attr_path(field)?)
            .and_then(value::string_value)
            .map(Cow::Borrowed)
    }

    fn is_present(&self, field: &FieldRef<LogField>) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                LogField::Body => self
                    .record
                    .body
                    .as_ref()
                    .is_some_and(|body| body.value.is_some()),
                LogField::SeverityText => !self.record.severity_text.is_empty(),
                LogField::TraceId => value::id_present(&self.record.trace_id),
                LogField::SpanId => value::id_present(&self.record.span_id),
                LogField::EventName => !self.record.event_name.is_empty(),
                LogField::ResourceSchemaUrl => !self.resource_schema_url.is_empty(),
                LogField::ScopeSchemaUrl => !self.scope_schema_url.is_empty(),
            };
        }
        self.attr_list(field)
            .zip(attr_path(field))
            .is_some_and(|(attrs, path)| value::find_path(attrs, path).is_some())
    }

    fn set(&mut self, field: &FieldRef<LogField>, new_value: &str) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                LogField::Body => {
                    let hit = self.is_present(field);
                    self.record.body = Some(value::string_entry(new_value));
                    hit
                }
                LogField::SeverityText => {
                    let hit = !self.record.severity_text.is_empty();
                    self.record.severity_text = new_value.to_string();
                    hit
                }
                LogField::TraceId => {
                    let hit = value::id_present(&self.record.trace_id);
                    self.record.trace_id = value::id_from_hex(new_value, 16);
                    hit
                }
                LogField::SpanId => {
                    let hit = value::id_present(&self.record.span_id);
                    self.record.span_id = value::id_from_hex(new_value, 8);
                    hit
                }
                LogField::EventName => {
                    let hit = !self.record.event_name.is_empty();
                    self.record.event_name = new_value.to_string();
                    hit
                }
                // Schema URLs belong to the enclosing containers and are
                // read-only through the record accessor.
                LogField::ResourceSchemaUrl | LogField::ScopeSchemaUrl => false,
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

    fn remove(&mut self, field: &FieldRef<LogField>) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                LogField::Body => {
                    let hit = self.is_present(field);
                    self.record.body = None;
                    hit
                }
                LogField::SeverityText => {
                    let hit = !self.record.severity_text.is_empty();
                    self.record.severity_text.clear();
                    hit
                }
                LogField::TraceId => {
                    let hit = value::id_present(&self.record.trace_id);
                    self.record.trace_id = Vec::new();
                    hit
                }
                LogField::SpanId => {
                    let hit = value::id_present(&self.record.span_id);
                    self.record.span_id = Vec::new();
                    hit
                }
                LogField::EventName => {
                    let hit = !self.record.event_name.is_empty();
                    self.record.event_name.clear();
                    hit
                }
                LogField::ResourceSchemaUrl | LogField::ScopeSchemaUrl => false,
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

    fn rename(&mut self, field: &FieldRef<LogField>, to: &str, upsert: bool) -> bool {
        let Some(key) = field.write_target() else {
            return false;
        };
        let Some(attrs) = self.attr_list_mut(field) else {
            return false;
        };
        value::rename(attrs, key, to, upsert)
    }

    fn trace_id_hex(&self) -> Option<Cow<'_, str>> {
        value::id_hex(&self.record.trace_id).map(Cow::Owned)
    }
}
