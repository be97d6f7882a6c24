//! Attribute-list helpers over OTLP key-value pairs.
//!
//! OTLP attributes are flat `Vec<KeyValue>` lists whose values may nest via
//! kvlist values. Reads traverse nested paths; writes only ever touch the
//! top level of one list.

use std::borrow::Cow;

use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, KeyValue};

/// The string inside an `AnyValue`, if it holds one.
#[must_use]
pub fn string_value(value: &AnyValue) -> Option<&str> {
    match value.value.as_ref()? {
        any_value::Value::StringValue(text) => Some(text),
        _ => None,
    }
}

/// Finds a top-level attribute with a populated value.
#[must_use]
pub fn find<'a>(attrs: &'a [KeyValue], key: &str) -> Option<&'a AnyValue> {
    attrs
        .iter()
        .find(|entry| entry.key == key)
        .and_then(|entry| entry.value.as_ref())
}

/// Walks a nested attribute path, descending through kvlist values.
/// Traversal stops at the first non-map intermediate value.
#[must_use]
pub fn find_path<'a>(attrs: &'a [KeyValue], path: &[String]) -> Option<&'a AnyValue> {
    let (first, rest) = path.split_first()?;
    let value = find(attrs, first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value.value.as_ref()? {
        any_value::Value::KvlistValue(list) => find_path(&list.values, rest),
        _ => None,
    }
}

/// Wraps a string as an `AnyValue`.
#[must_use]
pub fn string_entry(value: impl Into<String>) -> AnyValue {
    AnyValue {
        value: Some(any_value::Value::StringValue(value.into())),
    }
}

/// Inserts or replaces a top-level attribute. Returns whether the key
/// existed before.
pub fn put(attrs: &mut Vec<KeyValue>, key: &str, value: &str) -> bool {
    if let Some(entry) = attrs.iter_mut().find(|entry| entry.key == key) {
        entry.value = Some(string_entry(value));
        return true;
    }
    attrs.push(KeyValue {
        key: key.to_string(),
        value: Some(string_entry(value)),
    });
    false
}

/// Removes a top-level attribute. Returns whether the key existed.
pub fn remove(attrs: &mut Vec<KeyValue>, key: &str) -> bool {
    let before = attrs.len();
    attrs.retain(|entry| entry.key != key);
    attrs.len() != before
}

/// Moves a top-level attribute to a new key, carrying its string value ("" if
/// the value was not a string). With `upsert` false an existing target key
/// blocks the move; the source stays and the hit flag still reports true.
pub fn rename(attrs: &mut Vec<KeyValue>, from: &str, to: &str, upsert: bool) -> bool {
    let Some(position) = attrs.iter().position(|entry| entry.key == from) else {
        return false;
    };
    if !upsert && attrs.iter().any(|entry| entry.key == to) {
        return true;
    }
    let source = attrs.remove(position);
    let carried = source
        .value
        .as_ref()
        .and_then(string_value)
        .unwrap_or_default()
        .to_string();
    put(attrs, to, &carried);
    true
}

/// Hex text of a trace/span ID; absent when empty or all zero.
#[must_use]
pub fn id_hex(id: &[u8]) -> Option<String> {
    if id.is_empty() || id.iter().all(|byte| *byte == 0) {
        return None;
    }
    Some(hex::encode(id))
}

/// Decodes a replacement ID. Malformed input or a wrong-length value clears
/// the ID, which reads back as absent.
#[must_use]
pub fn id_from_hex(text: &str, len: usize) -> Vec<u8> {
    match hex::decode(text) {
        Ok(bytes) if bytes.len() == len => bytes,
        _ => Vec::new(),
    }
}

/// Whether an ID carries any non-zero byte.
#[must_use]
pub fn id_present(id: &[u8]) -> bool {
    !id.is_empty() && id.iter().any(|byte| *byte != 0)
}

/// Wraps a non-empty string field; OTLP cannot distinguish empty from unset
/// for these, so empty reads as absent.
#[must_use]
pub(crate) fn non_empty(text: &str) -> Option<Cow<'_, str>> {
    if text.is_empty() {
        None
    } else {
        Some(Cow::Borrowed(text))
    }
}
