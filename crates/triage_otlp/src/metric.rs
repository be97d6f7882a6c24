//! Field access over OTLP metrics.
//!
//! Record-level attributes for a metric are the first data point's
//! attributes, matching the reference evaluator's behavior.

use std::borrow::Cow;

use opentelemetry_proto::tonic::common::v1::{InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::metrics::v1::{metric, Metric};
use opentelemetry_proto::tonic::resource::v1::Resource;
use triage_engine::FieldAccessor;
use triage_policy::{FieldRef, MetricField};

use crate::value;

/// Accessor over one metric in its resource/scope context.
#[derive(Debug)]
pub struct MetricAccessor<'a> {
    metric: &'a mut Metric,
    resource: Option<&'a mut Resource>,
    scope: Option<&'a mut InstrumentationScope>,
    resource_schema_url: &'a str,
    scope_schema_url: &'a str,
}

impl<'a> MetricAccessor<'a> {
    /// An accessor over a bare metric, with no resource or scope context.
    #[must_use]
    pub fn new(metric: &'a mut Metric) -> Self {
        Self {
            metric,
            resource: None,
            scope: None,
            resource_schema_url: "",
            scope_schema_url: "",
        }
    }

    /// Attaches the metric's resource and its schema URL.
    #[must_use]
    pub fn with_resource(mut self, resource: Option<&'a mut Resource>, schema_url: &'a str) -> Self {
        self.resource = resource;
        self.resource_schema_url = schema_url;
        self
    }

    /// Attaches the metric's instrumentation scope and its schema URL.
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

    fn attr_list(&self, field: &FieldRef<MetricField>) -> Option<&[KeyValue]> {
        match field {
            FieldRef::RecordAttribute(_) => datapoint_attrs(self.metric).map(Vec::as_slice),
            FieldRef::ResourceAttribute(_) => {
                self.resource.as_deref().map(|r| r.attributes.as_slice())
            }
            FieldRef::ScopeAttribute(_) => self.scope.as_deref().map(|s| s.attributes.as_slice()),
            FieldRef::Field(_) => None,
        }
    }

    fn attr_list_mut(&mut self, field: &FieldRef<MetricField>) -> Option<&mut Vec<KeyValue>> {
        match field {
            FieldRef::RecordAttribute(_) => datapoint_attrs_mut(self.metric),
            FieldRef::ResourceAttribute(_) => self.resource.as_deref_mut().map(|r| &mut r.attributes),
            FieldRef::ScopeAttribute(_) => self.scope.as_deref_mut().map(|s| &mut s.attributes),
            FieldRef::Field(_) => None,
        }
    }
}

/// The first data point's attributes, regardless of metric shape.
fn datapoint_attrs(metric: &Metric) -> Option<&Vec<KeyValue>> {
    match metric.data.as_ref()? {
        metric::Data::Gauge(gauge) => gauge.data_points.first().map(|p| &p.attributes),
        metric::Data::Sum(sum) => sum.data_points.first().map(|p| &p.attributes),
        metric::Data::Histogram(histogram) => histogram.data_points.first().map(|p| &p.attributes),
        metric::Data::ExponentialHistogram(histogram) => {
            histogram.data_points.first().map(|p| &p.attributes)
        }
        metric::Data::Summary(summary) => summary.data_points.first().map(|p| &p.attributes),
    }
}

fn datapoint_attrs_mut(metric: &mut Metric) -> Option<&mut Vec<KeyValue>> {
    match metric.data.as_mut()? {
        metric::Data::Gauge(gauge) => gauge.data_points.first_mut().map(|p| &mut p.attributes),
        metric::Data::Sum(sum) => sum.data_points.first_mut().map(|p| &mut p.attributes),
        metric::Data::Histogram(histogram) => {
            histogram.data_points.first_mut().map(|p| &mut p.attributes)
        }
        metric::Data::ExponentialHistogram(histogram) => {
            histogram.data_points.first_mut().map(|p| &mut p.attributes)
        }
        metric::Data::Summary(summary) => summary.data_points.first_mut().map(|p| &mut p.attributes),
    }
}

/// Canonical lowercase tag for the metric's shape.
#[must_use]
pub fn metric_type_tag(metric: &Metric) -> Option<&'static str> {
    Some(match metric.data.as_ref()? {
        metric::Data::Gauge(_) => "gauge",
        metric::Data::Sum(_) => "sum",
        metric::Data::Histogram(_) => "histogram",
        metric::Data::ExponentialHistogram(_) => "exponential_histogram",
        metric::Data::Summary(_) => "summary",
    })
}

/// Canonical lowercase tag for the metric's aggregation temporality. Absent
/// for shapes without one and for unspecified temporality.
#[must_use]
pub fn temporality_tag(metric: &Metric) -> Option<&'static str> {
    let temporality = match metric.data.as_ref()? {
        metric::Data::Sum(sum) => sum.aggregation_temporality,
        metric::Data::Histogram(histogram) => histogram.aggregation_temporality,
        metric::Data::ExponentialHistogram(histogram) => histogram.aggregation_temporality,
        metric::Data::Gauge(_) | metric::Data::Summary(_) => return None,
    };
    match temporality {
        1 => Some("delta"),
        2 => Some("cumulative"),
        _ => None,
    }
}

impl FieldAccessor for MetricAccessor<'_> {
    type Field = MetricField;

    fn read(&self, field: &FieldRef<MetricField>) -> Option<Cow<'_, str>> {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                MetricField::Name => value::non_empty(&self.metric.name),
                MetricField::Description => value::non_empty(&self.metric.description),
                MetricField::Unit => value::non_empty(&self.metric.unit),
                MetricField::Type => metric_type_tag(self.metric).map(Cow::Borrowed),
                MetricField::AggregationTemporality => {
                    temporality_tag(self.metric).map(Cow::Borrowed)
                }
                MetricField::ScopeName => self
                    .scope
                    .as_deref()
                    .and_then(|s| value::non_empty(&s.name)),
                MetricField::ScopeVersion => self
                    .scope
                    .as_deref()
                    .and_then(|s| value::non_empty(&s.version)),
                MetricField::ResourceSchemaUrl => value::non_empty(self.resource_schema_url),
                MetricField::ScopeSchemaUrl => value::non_empty(self.scope_schema_url),
            };
        }
        let attrs = self.attr_list(field)?;
        value::find_path(attrs, attr_path(field)?)
            .and_then(value::string_value)
            .map(Cow::Borrowed)
    }

    fn is_present(&self, field: &FieldRef<MetricField>) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                MetricField::Name => !self.metric.name.is_empty(),
                MetricField::Description => !self.metric.description.is_empty(),
                MetricField::Unit => !self.metric.unit.is_empty(),
                MetricField::Type => self.metric.data.is_some(),
                MetricField::AggregationTemporality => temporality_tag(self.metric).is_some(),
                MetricField::ScopeName => {
                    self.scope.as_deref().is_some_and(|s| !s.name.is_empty())
                }
                MetricField::ScopeVersion => {
                    self.scope.as_deref().is_some_and(|s| !s.version.is_empty())
                }
                MetricField::ResourceSchemaUrl => !self.resource_schema_url.is_empty(),
                MetricField::ScopeSchemaUrl => !self.scope_schema_url.is_empty(),
            };
        }
        self.attr_list(field)
            .zip(attr_path(field))
            .is_some_and(|(attrs, path)| value::find_path(attrs, path).is_some())
    }

    fn set(&mut self, field: &FieldRef<MetricField>, new_value: &str) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                MetricField::Name => {
                    let hit = !self.metric.name.is_empty();
                    self.metric.name = new_value.to_string();
                    hit
                }
                MetricField::Description => {
                    let hit = !self.metric.description.is_empty();
                    self.metric.description = new_value.to_string();
                    hit
                }
                MetricField::Unit => {
                    let hit = !self.metric.unit.is_empty();
                    self.metric.unit = new_value.to_string();
                    hit
                }
                // Enum shapes and scope/container metadata are read-only.
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

    fn remove(&mut self, field: &FieldRef<MetricField>) -> bool {
        if let FieldRef::Field(fixed) = field {
            return match fixed {
                MetricField::Name => {
                    let hit = !self.metric.name.is_empty();
                    self.metric.name.clear();
                    hit
                }
                MetricField::Description => {
                    let hit = !self.metric.description.is_empty();
                    self.metric.description.clear();
                    hit
                }
                MetricField::Unit => {
                    let hit = !self.metric.unit.is_empty();
                    self.metric.unit.clear();
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

    fn rename(&mut self, field: &FieldRef<MetricField>, to: &str, upsert: bool) -> bool {
        let Some(key) = field.write_target() else {
            return false;
        };
        let Some(attrs) = self.attr_list_mut(field) else {
            return false;
        };
        value::rename(attrs, key, to, upsert)
    }
}

fn attr_path(field: &FieldRef<MetricField>) -> Option<&[String]> {
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
    use opentelemetry_proto::tonic::metrics::v1::{Gauge, NumberDataPoint, Sum};

    fn gauge_metric() -> Metric {
        Metric {
            name: "http.requests".to_string(),
            unit: "1".to_string(),
            data: Some(metric::Data::Gauge(Gauge {
                data_points: vec![NumberDataPoint {
                    attributes: vec![KeyValue {
                        key: "route".to_string(),
                        value: Some(value::string_entry("/checkout")),
                    }],
                    ..Default::default()
                }],
            })),
            ..Default::default()
        }
    }

    fn delta_sum_metric() -> Metric {
        Metric {
            name: "bytes.sent".to_string(),
            data: Some(metric::Data::Sum(Sum {
                aggregation_temporality: 1,
                ..Default::default()
            })),
            ..Default::default()
        }
    }

    #[test]
    fn reads_name_and_type_tags() {
        let mut metric = gauge_metric();
        let accessor = MetricAccessor::new(&mut metric);
        assert_eq!(
            accessor.read(&FieldRef::Field(MetricField::Name)).as_deref(),
            Some("http.requests")
        );
        assert_eq!(
            accessor.read(&FieldRef::Field(MetricField::Type)).as_deref(),
            Some("gauge")
        );
        // Gauges carry no temporality.
        assert_eq!(
            accessor.read(&FieldRef::Field(MetricField::AggregationTemporality)),
            None
        );
    }

    #[test]
    fn temporality_tags() {
        let mut metric = delta_sum_metric();
        let accessor = MetricAccessor::new(&mut metric);
        assert_eq!(
            accessor
                .read(&FieldRef::Field(MetricField::AggregationTemporality))
                .as_deref(),
            Some("delta")
        );

        let mut dataless = Metric::default();
        let accessor = MetricAccessor::new(&mut dataless);
        assert_eq!(accessor.read(&FieldRef::Field(MetricField::Type)), None);
        assert!(!accessor.is_present(&FieldRef::Field(MetricField::Type)));
    }

    #[test]
    fn datapoint_attributes_come_from_first_point() {
        let mut metric = gauge_metric();
        let accessor = MetricAccessor::new(&mut metric);
        assert_eq!(
            accessor
                .read(&FieldRef::record_attribute("route"))
                .as_deref(),
            Some("/checkout")
        );
    }

    #[test]
    fn datapoint_writes_hit_first_point() {
        let mut metric = gauge_metric();
        let mut accessor = MetricAccessor::new(&mut metric);
        assert!(!accessor.set(&FieldRef::record_attribute("region"), "eu-1"));
        assert!(accessor.remove(&FieldRef::record_attribute("route")));

        match metric.data.as_ref().unwrap() {
            metric::Data::Gauge(gauge) => {
                let attrs = &gauge.data_points[0].attributes;
                assert!(attrs.iter().any(|kv| kv.key == "region"));
                assert!(!attrs.iter().any(|kv| kv.key == "route"));
            }
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[test]
    fn no_datapoints_means_no_record_attributes() {
        let mut metric = Metric {
            data: Some(metric::Data::Gauge(Gauge {
                data_points: Vec::new(),
            })),
            ..Default::default()
        };
        let mut accessor = MetricAccessor::new(&mut metric);
        assert_eq!(accessor.read(&FieldRef::record_attribute("any")), None);
        assert!(!accessor.set(&FieldRef::record_attribute("any"), "v"));
    }

    #[test]
    fn scope_name_reads_through_context() {
        let mut metric = gauge_metric();
        let mut scope = InstrumentationScope {
            name: "otel-sdk".to_string(),
            version: "1.2.3".to_string(),
            ..Default::default()
        };
        let accessor = MetricAccessor::new(&mut metric).with_scope(Some(&mut scope), "");
        assert_eq!(
            accessor
                .read(&FieldRef::Field(MetricField::ScopeName))
                .as_deref(),
            Some("otel-sdk")
        );
        assert_eq!(
            accessor
                .read(&FieldRef::Field(MetricField::ScopeVersion))
                .as_deref(),
            Some("1.2.3")
        );
    }

    #[test]
    fn type_is_not_writable() {
        let mut metric = gauge_metric();
        let mut accessor = MetricAccessor::new(&mut metric);
        assert!(!accessor.set(&FieldRef::Field(MetricField::Type), "sum"));
        assert!(!accessor.remove(&FieldRef::Field(MetricField::AggregationTemporality)));
    }

    #[test]
    fn name_redaction_round_trip() {
        let mut metric = gauge_metric();
        let mut accessor = MetricAccessor::new(&mut metric);
        assert!(accessor.set(&FieldRef::Field(MetricField::Name), "redacted.metric"));
        assert_eq!(
            accessor.read(&FieldRef::Field(MetricField::Name)).as_deref(),
            Some("redacted.metric")
        );
        assert!(accessor.remove(&FieldRef::Field(MetricField::Name)));
        assert!(!accessor.is_present(&FieldRef::Field(MetricField::Name)));
    }
}
