//! Compiled matchers.
//!
//! A matcher is a single predicate against one field reference, compiled once
//! when a policy set loads and stateless afterwards. Regexes are built here
//! with the case-sensitivity flag baked in, so an invalid pattern rejects the
//! policy update instead of surfacing during evaluation.

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use triage_policy::{FieldRef, Matcher, Predicate};

use crate::accessor::FieldAccessor;
use crate::error::{Error, Result};

/// One compiled predicate against one field.
#[derive(Debug, Clone)]
pub struct CompiledMatcher<F> {
    field: FieldRef<F>,
    predicate: CompiledPredicate,
    negate: bool,
}

#[derive(Debug, Clone)]
enum CompiledPredicate {
    Exact { value: String, fold: bool },
    StartsWith { value: String, fold: bool },
    EndsWith { value: String, fold: bool },
    Contains { value: String, fold: bool },
    Pattern(Regex),
    Exists(bool),
}

impl<F: Copy> CompiledMatcher<F> {
    /// Compiles a matcher spec. Case-insensitive string values are folded to
    /// ASCII lowercase once, here.
    ///
    /// # Errors
    ///
    /// Returns an error when a regex predicate fails to compile.
    pub fn compile(policy_id: &str, spec: &Matcher<F>) -> Result<Self> {
        let fold = spec.case_insensitive;
        let predicate = match &spec.predicate {
            Predicate::Exact(value) => CompiledPredicate::Exact {
                value: folded_value(value, fold),
                fold,
            },
            Predicate::StartsWith(value) => CompiledPredicate::StartsWith {
                value: folded_value(value, fold),
                fold,
            },
            Predicate::EndsWith(value) => CompiledPredicate::EndsWith {
                value: folded_value(value, fold),
                fold,
            },
            Predicate::Contains(value) => CompiledPredicate::Contains {
                value: folded_value(value, fold),
                fold,
            },
            Predicate::Regex(pattern) => CompiledPredicate::Pattern(
                RegexBuilder::new(pattern)
                    .case_insensitive(fold)
                    .build()
                    .map_err(|source| Error::InvalidRegex {
                        id: policy_id.to_string(),
                        pattern: pattern.clone(),
                        source,
                    })?,
            ),
            Predicate::Exists(want) => CompiledPredicate::Exists(*want),
        };
        Ok(Self {
            field: spec.field.clone(),
            predicate,
            negate: spec.negate,
        })
    }

    /// Evaluates the predicate against the record behind `accessor`.
    pub fn matches<A: FieldAccessor<Field = F>>(&self, accessor: &A) -> bool {
        let hit = match &self.predicate {
            CompiledPredicate::Exists(want) => accessor.is_present(&self.field) == *want,
            CompiledPredicate::Exact { value, fold } => self
                .read_folded(accessor, *fold)
                .is_some_and(|found| found.as_ref() == value),
            CompiledPredicate::StartsWith { value, fold } => self
                .read_folded(accessor, *fold)
                .is_some_and(|found| found.starts_with(value.as_str())),
            CompiledPredicate::EndsWith { value, fold } => self
                .read_folded(accessor, *fold)
                .is_some_and(|found| found.ends_with(value.as_str())),
            CompiledPredicate::Contains { value, fold } => self
                .read_folded(accessor, *fold)
                .is_some_and(|found| found.contains(value.as_str())),
            CompiledPredicate::Pattern(regex) => accessor
                .read(&self.field)
                .is_some_and(|found| regex.is_match(&found)),
        };
        hit != self.negate
    }

    fn read_folded<'a, A: FieldAccessor<Field = F>>(
        &self,
        accessor: &'a A,
        fold: bool,
    ) -> Option<Cow<'a, str>> {
        let value = accessor.read(&self.field)?;
        if fold && value.bytes().any(|byte| byte.is_ascii_uppercase()) {
            Some(Cow::Owned(value.to_ascii_lowercase()))
        } else {
            Some(value)
        }
    }
}

fn folded_value(value: &str, fold: bool) -> String {
    if fold {
        value.to_ascii_lowercase()
    } else {
        value.to_string()
    }
}
