//! Policy document parsing and validation.
//!
//! Turns the wire schema into the typed model, enforcing every structural
//! rule: unique non-empty IDs, exactly one signal per policy, a non-empty
//! AND-combined matcher list with exactly one field reference and one
//! predicate each, value ranges on sampling and rate limiting, and
//! well-formed transforms. Validation is all-or-nothing; the first problem
//! rejects the whole document.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::model::{
    FieldRef, Keep, LogField, Matcher, MetricField, Policy, PolicySet, Predicate, RateLimitConfig,
    SampleConfig, Signal, TraceField, Transform, TransformKind,
};
use crate::schema::{
    KeepRule, KeepWord, MatchRule, NameOrPath, PolicyDocument, SignalBlock, TransformRule,
};

/// Parses and validates a policy document.
///
/// # Errors
///
/// Returns an error when the document is not valid JSON or any policy fails
/// structural validation.
pub fn parse(input: &str) -> Result<PolicySet> {
    let document: PolicyDocument = serde_json::from_str(input)?;
    build(document)
}

/// Parses and validates a policy document from raw bytes.
///
/// # Errors
///
/// Returns an error when the document is not valid JSON or any policy fails
/// structural validation.
pub fn parse_slice(input: &[u8]) -> Result<PolicySet> {
    let document: PolicyDocument = serde_json::from_slice(input)?;
    build(document)
}

fn build(document: PolicyDocument) -> Result<PolicySet> {
    let mut set = PolicySet::default();
    let mut seen = BTreeSet::new();

    for entry in document.policies {
        if entry.id.is_empty() {
            return Err(Error::invalid("", "policy id must be non-empty"));
        }
        if !seen.insert(entry.id.clone()) {
            return Err(Error::DuplicateId(entry.id));
        }

        let blocks = usize::from(entry.log.is_some())
            + usize::from(entry.metric.is_some())
            + usize::from(entry.trace.is_some());
        if blocks != 1 {
            return Err(Error::invalid(
                &entry.id,
                "policy must configure exactly one signal",
            ));
        }

        if let Some(block) = &entry.log {
            set.logs.push(build_policy(
                &entry.id,
                entry.enabled,
                Signal::Log,
                block,
                LogField::from_name,
            )?);
        }
        if let Some(block) = &entry.metric {
            set.metrics.push(build_policy(
                &entry.id,
                entry.enabled,
                Signal::Metric,
                block,
                MetricField::from_name,
            )?);
        }
        if let Some(block) = &entry.trace {
            set.traces.push(build_policy(
                &entry.id,
                entry.enabled,
                Signal::Trace,
                block,
                TraceField::from_name,
            )?);
        }
    }

    Ok(set)
}

fn build_policy<F: Copy>(
    id: &str,
    enabled: bool,
    signal: Signal,
    block: &SignalBlock,
    resolve: fn(&str) -> Option<F>,
) -> Result<Policy<F>> {
    if block.matchers.is_empty() {
        return Err(Error::invalid(id, "matcher list must be non-empty"));
    }

    let matchers = block
        .matchers
        .iter()
        .map(|rule| build_matcher(id, signal, rule, resolve))
        .collect::<Result<Vec<_>>>()?;

    let keep = build_keep(id, &block.keep)?;

    let transforms = block
        .transforms
        .iter()
        .map(|rule| build_transform(id, rule, resolve))
        .collect::<Result<Vec<_>>>()?;

    Ok(Policy {
        id: id.to_string(),
        enabled,
        matchers,
        keep,
        transforms,
    })
}

fn build_matcher<F: Copy>(
    id: &str,
    signal: Signal,
    rule: &MatchRule,
    resolve: fn(&str) -> Option<F>,
) -> Result<Matcher<F>> {
    let field = build_field_ref(id, signal, rule, resolve)?;
    let predicate = build_predicate(id, rule)?;
    Ok(Matcher {
        field,
        predicate,
        case_insensitive: rule.case_insensitive,
        negate: rule.negate,
    })
}

fn build_field_ref<F: Copy>(
    id: &str,
    signal: Signal,
    rule: &MatchRule,
    resolve: fn(&str) -> Option<F>,
) -> Result<FieldRef<F>> {
    let (fixed, record, foreign) = match signal {
        Signal::Log => (
            rule.log_field.as_deref(),
            rule.log_attribute.as_ref(),
            rule.metric_field.is_some()
                || rule.trace_field.is_some()
                || rule.datapoint_attribute.is_some()
                || rule.span_attribute.is_some(),
        ),
        Signal::Metric => (
            rule.metric_field.as_deref(),
            rule.datapoint_attribute.as_ref(),
            rule.log_field.is_some()
                || rule.trace_field.is_some()
                || rule.log_attribute.is_some()
                || rule.span_attribute.is_some(),
        ),
        Signal::Trace => (
            rule.trace_field.as_deref(),
            rule.span_attribute.as_ref(),
            rule.log_field.is_some()
                || rule.metric_field.is_some()
                || rule.log_attribute.is_some()
                || rule.datapoint_attribute.is_some(),
        ),
    };

    if foreign {
        return Err(Error::invalid(
            id,
            format!(
                "matcher references a field of another signal in a {} policy",
                signal.as_str()
            ),
        ));
    }

    let mut refs: Vec<FieldRef<F>> = Vec::new();
    if let Some(name) = fixed {
        let field = resolve(name).ok_or_else(|| {
            Error::invalid(id, format!("unknown {} field '{name}'", signal.as_str()))
        })?;
        refs.push(FieldRef::Field(field));
    }
    if let Some(path) = record {
        refs.push(FieldRef::RecordAttribute(attribute_path(id, path)?));
    }
    if let Some(path) = &rule.resource_attribute {
        refs.push(FieldRef::ResourceAttribute(attribute_path(id, path)?));
    }
    if let Some(path) = &rule.scope_attribute {
        refs.push(FieldRef::ScopeAttribute(attribute_path(id, path)?));
    }

    match refs.len() {
        1 => Ok(refs.remove(0)),
        0 => Err(Error::invalid(
            id,
            "matcher must reference exactly one field",
        )),
        _ => Err(Error::invalid(
            id,
            "matcher references more than one field",
        )),
    }
}

fn attribute_path(id: &str, path: &NameOrPath) -> Result<Vec<String>> {
    let segments = path.segments();
    if segments.is_empty() || segments.iter().any(String::is_empty) {
        return Err(Error::invalid(
            id,
            "attribute path segments must be non-empty",
        ));
    }
    Ok(segments)
}

fn build_predicate(id: &str, rule: &MatchRule) -> Result<Predicate> {
    let mut predicates: Vec<Predicate> = Vec::new();
    if let Some(value) = &rule.exact {
        predicates.push(Predicate::Exact(value.clone()));
    }
    if let Some(value) = &rule.starts_with {
        predicates.push(Predicate::StartsWith(value.clone()));
    }
    if let Some(value) = &rule.ends_with {
        predicates.push(Predicate::EndsWith(value.clone()));
    }
    if let Some(value) = &rule.contains {
        predicates.push(Predicate::Contains(value.clone()));
    }
    if let Some(pattern) = &rule.regex {
        predicates.push(Predicate::Regex(pattern.clone()));
    }
    if let Some(want) = rule.exists {
        predicates.push(Predicate::Exists(want));
    }

    match predicates.len() {
        1 => Ok(predicates.remove(0)),
        0 => Err(Error::invalid(id, "matcher must set exactly one predicate")),
        _ => Err(Error::invalid(id, "matcher sets more than one predicate")),
    }
}

fn build_keep(id: &str, keep: &KeepRule) -> Result<Keep> {
    match keep {
        KeepRule::Word(KeepWord::All) => Ok(Keep::All),
        KeepRule::Word(KeepWord::None) => Ok(Keep::None),
        KeepRule::Sample { sample } => {
            if !sample.percentage.is_finite()
                || sample.percentage < 0.0
                || sample.percentage > 100.0
            {
                return Err(Error::invalid(
                    id,
                    format!("sample percentage {} out of range", sample.percentage),
                ));
            }
            if !(1..=14).contains(&sample.precision) {
                return Err(Error::invalid(
                    id,
                    format!("sample precision {} out of range 1..=14", sample.precision),
                ));
            }
            if sample.key.as_deref() == Some("") {
                return Err(Error::invalid(id, "sample key must be non-empty"));
            }
            Ok(Keep::Sample(SampleConfig {
                percentage: sample.percentage,
                mode: sample.mode,
                precision: sample.precision,
                fail_closed: sample.fail_closed,
                key: sample.key.clone(),
            }))
        }
        KeepRule::RateLimit { rate_limit } => {
            if rate_limit.count == 0 {
                return Err(Error::invalid(id, "rate_limit count must be positive"));
            }
            if rate_limit.key.as_deref() == Some("") {
                return Err(Error::invalid(id, "rate_limit key must be non-empty"));
            }
            Ok(Keep::RateLimit(RateLimitConfig {
                count: rate_limit.count,
                window: rate_limit.per,
                key: rate_limit.key.clone(),
            }))
        }
    }
}

fn build_transform<F: Copy>(
    id: &str,
    rule: &TransformRule,
    resolve: fn(&str) -> Option<F>,
) -> Result<Transform<F>> {
    let mut ops: Vec<(TransformKind, &str)> = Vec::new();
    if let Some(target) = &rule.remove {
        ops.push((TransformKind::Remove, target));
    }
    if let Some(target) = &rule.redact {
        ops.push((TransformKind::Redact, target));
    }
    if let Some(target) = &rule.rename {
        ops.push((TransformKind::Rename, target));
    }
    if let Some(target) = &rule.add {
        ops.push((TransformKind::Add, target));
    }

    let (kind, target) = match ops.len() {
        1 => ops.remove(0),
        0 => {
            return Err(Error::invalid(
                id,
                "transform must set exactly one operation",
            ))
        }
        _ => {
            return Err(Error::invalid(
                id,
                "transform sets more than one operation",
            ))
        }
    };

    if target.is_empty() {
        return Err(Error::invalid(id, "transform target must be non-empty"));
    }

    // A target naming one of the signal's fixed fields addresses that field;
    // anything else addresses a top-level record attribute.
    let target_ref = resolve(target).map_or_else(
        || FieldRef::record_attribute(target),
        |field| FieldRef::Field(field),
    );

    match kind {
        TransformKind::Rename => {
            if matches!(target_ref, FieldRef::Field(_)) {
                return Err(Error::invalid(id, "fixed fields cannot be renamed"));
            }
            match rule.to.as_deref() {
                Some(to) if !to.is_empty() => {}
                _ => return Err(Error::invalid(id, "rename requires a non-empty 'to'")),
            }
        }
        TransformKind::Redact | TransformKind::Add => {
            if rule.value.is_none() {
                return Err(Error::invalid(
                    id,
                    format!(
                        "{} requires a 'value'",
                        if kind == TransformKind::Redact {
                            "redact"
                        } else {
                            "add"
                        }
                    ),
                ));
            }
        }
        TransformKind::Remove => {}
    }

    Ok(Transform {
        kind,
        target: target_ref,
        value: rule.value.clone(),
        to: rule.to.clone(),
        upsert: rule.upsert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SampleMode;

    fn parse_one(input: &str) -> PolicySet {
        parse(input).expect("valid test policy document")
    }

    #[test]
    fn parses_severity_drop_policy() {
        let set = parse_one(
            r#"{"policies": [{"id": "drop-debug", "log": {
                "match": [{"log_field": "severity_text", "exact": "DEBUG"}],
                "keep": "none"
            }}]}"#,
        );
        assert_eq!(set.logs.len(), 1);
        let policy = &set.logs[0];
        assert_eq!(policy.id, "drop-debug");
        assert!(policy.enabled);
        assert_eq!(policy.matchers.len(), 1);
        assert_eq!(
            policy.matchers[0].field,
            FieldRef::Field(LogField::SeverityText)
        );
        assert_eq!(
            policy.matchers[0].predicate,
            Predicate::Exact("DEBUG".to_string())
        );
        assert_eq!(policy.keep, Keep::None);
    }

    #[test]
    fn parses_nested_attribute_path() {
        let set = parse_one(
            r#"{"policies": [{"id": "nested", "trace": {
                "match": [{"span_attribute": ["http", "request", "method"], "exact": "GET"}],
                "keep": "all"
            }}]}"#,
        );
        assert_eq!(
            set.traces[0].matchers[0].field,
            FieldRef::RecordAttribute(vec![
                "http".to_string(),
                "request".to_string(),
                "method".to_string()
            ])
        );
    }

    #[test]
    fn parses_sample_and_rate_limit_keeps() {
        let set = parse_one(
            r#"{"policies": [
                {"id": "sampled", "trace": {
                    "match": [{"trace_field": "kind", "exact": "server"}],
                    "keep": {"sample": {"percentage": 50, "mode": "equalizing",
                                        "precision": 3, "fail_closed": true}}
                }},
                {"id": "limited", "log": {
                    "match": [{"log_field": "severity_text", "exact": "INFO"}],
                    "keep": {"rate_limit": {"count": 2, "per": "second", "key": "tenant"}}
                }}
            ]}"#,
        );
        match &set.traces[0].keep {
            Keep::Sample(config) => {
                assert!((config.percentage - 50.0).abs() < f64::EPSILON);
                assert_eq!(config.mode, SampleMode::Equalizing);
                assert_eq!(config.precision, 3);
                assert!(config.fail_closed);
                assert_eq!(config.key, None);
            }
            other => panic!("expected sample keep, got {other:?}"),
        }
        match &set.logs[0].keep {
            Keep::RateLimit(config) => {
                assert_eq!(config.count, 2);
                assert_eq!(config.window.seconds(), 1);
                assert_eq!(config.key.as_deref(), Some("tenant"));
            }
            other => panic!("expected rate_limit keep, got {other:?}"),
        }
    }

    #[test]
    fn parses_transforms() {
        let set = parse_one(
            r#"{"policies": [{"id": "scrub", "log": {
                "match": [{"log_attribute": "user.email", "exists": true}],
                "keep": "all",
                "transforms": [
                    {"remove": "user.email"},
                    {"redact": "body", "value": "[REDACTED]"},
                    {"rename": "user.id", "to": "user.ref", "upsert": true},
                    {"add": "scrubbed", "value": "true"}
                ]
            }}]}"#,
        );
        let transforms = &set.logs[0].transforms;
        assert_eq!(transforms.len(), 4);
        assert_eq!(transforms[0].kind, TransformKind::Remove);
        assert_eq!(
            transforms[0].target,
            FieldRef::record_attribute("user.email")
        );
        assert_eq!(transforms[1].kind, TransformKind::Redact);
        assert_eq!(transforms[1].target, FieldRef::Field(LogField::Body));
        assert_eq!(transforms[2].kind, TransformKind::Rename);
        assert!(transforms[2].upsert);
        assert_eq!(transforms[3].kind, TransformKind::Add);
    }

    #[test]
    fn rejects_empty_matcher_list() {
        let err = parse(r#"{"policies": [{"id": "p", "log": {"match": [], "keep": "all"}}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = parse(
            r#"{"policies": [
                {"id": "p", "log": {"match": [{"log_field": "body", "exists": true}], "keep": "all"}},
                {"id": "p", "trace": {"match": [{"trace_field": "name", "exists": true}], "keep": "all"}}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "p"));
    }

    #[test]
    fn rejects_unknown_field_name() {
        let err = parse(
            r#"{"policies": [{"id": "p", "log": {
                "match": [{"log_field": "no_such_field", "exists": true}],
                "keep": "all"
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown log field"));
    }

    #[test]
    fn rejects_field_from_another_signal() {
        let err = parse(
            r#"{"policies": [{"id": "p", "log": {
                "match": [{"trace_field": "kind", "exact": "server"}],
                "keep": "all"
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("another signal"));
    }

    #[test]
    fn rejects_multiple_signals() {
        let err = parse(
            r#"{"policies": [{"id": "p",
                "log": {"match": [{"log_field": "body", "exists": true}], "keep": "all"},
                "trace": {"match": [{"trace_field": "name", "exists": true}], "keep": "all"}
            }]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one signal"));
    }

    #[test]
    fn rejects_multiple_predicates() {
        let err = parse(
            r#"{"policies": [{"id": "p", "log": {
                "match": [{"log_field": "body", "exact": "x", "contains": "y"}],
                "keep": "all"
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than one predicate"));
    }

    #[test]
    fn rejects_out_of_range_sample_parameters() {
        let err = parse(
            r#"{"policies": [{"id": "p", "trace": {
                "match": [{"trace_field": "name", "exists": true}],
                "keep": {"sample": {"percentage": 101}}
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let err = parse(
            r#"{"policies": [{"id": "p", "trace": {
                "match": [{"trace_field": "name", "exists": true}],
                "keep": {"sample": {"percentage": 50, "precision": 15}}
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("precision"));
    }

    #[test]
    fn accepts_boundary_percentages() {
        let set = parse_one(
            r#"{"policies": [
                {"id": "zero", "trace": {
                    "match": [{"trace_field": "name", "exists": true}],
                    "keep": {"sample": {"percentage": 0}}
                }},
                {"id": "hundred", "trace": {
                    "match": [{"trace_field": "name", "exists": true}],
                    "keep": {"sample": {"percentage": 100}}
                }}
            ]}"#,
        );
        assert_eq!(set.traces.len(), 2);
    }

    #[test]
    fn rejects_zero_rate_limit_count() {
        let err = parse(
            r#"{"policies": [{"id": "p", "log": {
                "match": [{"log_field": "body", "exists": true}],
                "keep": {"rate_limit": {"count": 0, "per": "second"}}
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn rejects_rename_of_fixed_field() {
        let err = parse(
            r#"{"policies": [{"id": "p", "log": {
                "match": [{"log_field": "body", "exists": true}],
                "keep": "all",
                "transforms": [{"rename": "body", "to": "copy"}]
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot be renamed"));
    }

    #[test]
    fn rejects_redact_without_value() {
        let err = parse(
            r#"{"policies": [{"id": "p", "log": {
                "match": [{"log_field": "body", "exists": true}],
                "keep": "all",
                "transforms": [{"redact": "body"}]
            }}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a 'value'"));
    }

    #[test]
    fn disabled_flag_carries_through() {
        let set = parse_one(
            r#"{"policies": [{"id": "p", "enabled": false, "log": {
                "match": [{"log_field": "body", "exists": true}],
                "keep": "none"
            }}]}"#,
        );
        assert!(!set.logs[0].enabled);
    }

    #[test]
    fn empty_document_parses_to_empty_set() {
        let set = parse_one(r#"{"policies": []}"#);
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }
}
