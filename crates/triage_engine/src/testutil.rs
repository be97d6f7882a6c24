//! In-memory record double for engine tests.
//!
//! Implements the accessor contract over plain maps: fixed fields keyed by
//! the signal's field enum, attributes as a tree that can hold strings,
//! integers, and nested maps.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use triage_policy::FieldRef;

use crate::accessor::FieldAccessor;

#[derive(Debug, Clone)]
pub(crate) enum FakeValue {
    Text(String),
    Int(i64),
    Map(BTreeMap<String, FakeValue>),
}

#[derive(Debug, Clone)]
pub(crate) struct FakeRecord<F> {
    pub fields: HashMap<F, String>,
    pub attrs: BTreeMap<String, FakeValue>,
    pub trace_id: Option<String>,
    pub trace_state: Option<String>,
}

impl<F: Copy + Eq + Hash> FakeRecord<F> {
    pub fn new() -> Self {
        Self {
            fields: HashMap::new(),
            attrs: BTreeMap::new(),
            trace_id: None,
            trace_state: None,
        }
    }

    pub fn with_field(mut self, field: F, value: &str) -> Self {
        self.fields.insert(field, value.to_string());
        self
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attrs
            .insert(key.to_string(), FakeValue::Text(value.to_string()));
        self
    }

    pub fn with_int_attr(mut self, key: &str, value: i64) -> Self {
        self.attrs.insert(key.to_string(), FakeValue::Int(value));
        self
    }

    pub fn with_nested_attr(mut self, outer: &str, inner: &str, value: &str) -> Self {
        let mut map = BTreeMap::new();
        map.insert(inner.to_string(), FakeValue::Text(value.to_string()));
        self.attrs.insert(outer.to_string(), FakeValue::Map(map));
        self
    }

    pub fn with_trace_id(mut self, trace_id: &str) -> Self {
        self.trace_id = Some(trace_id.to_string());
        self
    }

    pub fn with_trace_state(mut self, trace_state: &str) -> Self {
        self.trace_state = Some(trace_state.to_string());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match self.attrs.get(key) {
            Some(FakeValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn field(&self, field: F) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }
}

fn lookup<'a>(attrs: &'a BTreeMap<String, FakeValue>, path: &[String]) -> Option<&'a FakeValue> {
    let (first, rest) = path.split_first()?;
    let value = attrs.get(first)?;
    if rest.is_empty() {
        return Some(value);
    }
    match value {
        FakeValue::Map(inner) => lookup(inner, rest),
        _ => None,
    }
}

impl<F: Copy + Eq + Hash> FieldAccessor for FakeRecord<F> {
    type Field = F;

    fn read(&self, field: &FieldRef<F>) -> Option<Cow<'_, str>> {
        match field {
            FieldRef::Field(fixed) => self
                .fields
                .get(fixed)
                .map(|value| Cow::Borrowed(value.as_str())),
            FieldRef::RecordAttribute(path) => match lookup(&self.attrs, path)? {
                FakeValue::Text(value) => Some(Cow::Borrowed(value.as_str())),
                _ => None,
            },
            FieldRef::ResourceAttribute(_) | FieldRef::ScopeAttribute(_) => None,
        }
    }

    fn is_present(&self, field: &FieldRef<F>) -> bool {
        match field {
            FieldRef::Field(fixed) => self.fields.contains_key(fixed),
            FieldRef::RecordAttribute(path) => lookup(&self.attrs, path).is_some(),
            FieldRef::ResourceAttribute(_) | FieldRef::ScopeAttribute(_) => false,
        }
    }

    fn set(&mut self, field: &FieldRef<F>, value: &str) -> bool {
        match field {
            FieldRef::Field(fixed) => self.fields.insert(*fixed, value.to_string()).is_some(),
            FieldRef::RecordAttribute(path) if path.len() == 1 => self
                .attrs
                .insert(path[0].clone(), FakeValue::Text(value.to_string()))
                .is_some(),
            _ => false,
        }
    }

    fn remove(&mut self, field: &FieldRef<F>) -> bool {
        match field {
            FieldRef::Field(fixed) => self.fields.remove(fixed).is_some(),
            FieldRef::RecordAttribute(path) if path.len() == 1 => {
                self.attrs.remove(&path[0]).is_some()
            }
            _ => false,
        }
    }

    fn rename(&mut self, field: &FieldRef<F>, to: &str, upsert: bool) -> bool {
        let FieldRef::RecordAttribute(path) = field else {
            return false;
        };
        if path.len() != 1 || !self.attrs.contains_key(&path[0]) {
            return false;
        }
        if !upsert && self.attrs.contains_key(to) {
            return true;
        }
        let value = match self.attrs.remove(&path[0]) {
            Some(FakeValue::Text(value)) => value,
            _ => String::new(),
        };
        self.attrs.insert(to.to_string(), FakeValue::Text(value));
        true
    }

    fn trace_id_hex(&self) -> Option<Cow<'_, str>> {
        self.trace_id.as_deref().map(Cow::Borrowed)
    }

    fn trace_state(&self) -> Option<Cow<'_, str>> {
        self.trace_state.as_deref().map(Cow::Borrowed)
    }

    fn set_trace_state(&mut self, value: &str) {
        self.trace_state = Some(value.to_string());
    }
}
