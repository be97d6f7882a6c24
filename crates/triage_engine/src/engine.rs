//! Per-record evaluation pipeline.
//!
//! For each record: enumerate the snapshot's policies in ascending ID order,
//! evaluate every policy's matchers under AND, combine the matched policies'
//! keep decisions under a most-restrictive-wins rule, then run transforms on
//! survivors. Evaluation never fails; every failure mode was caught when the
//! policy set compiled.

use std::sync::Arc;

use triage_policy::{LogField, MetricField, TraceField};

use crate::accessor::FieldAccessor;
use crate::policy::{CompiledKeep, CompiledPolicy};
use crate::registry::PolicyRegistry;
use crate::transform;

/// Outcome of evaluating one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// The combined decision.
    pub decision: Decision,
    /// IDs of the policies whose matchers all accepted, in ascending order.
    pub matched: Vec<String>,
}

impl Verdict {
    /// True when the record should be discarded.
    #[must_use]
    pub fn is_drop(&self) -> bool {
        self.decision == Decision::Drop
    }

    const fn no_match() -> Self {
        Self {
            decision: Decision::NoMatch,
            matched: Vec::new(),
        }
    }
}

/// The combined per-record decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Keep the record; a policy matched and admitted it.
    Keep,
    /// Discard the record.
    Drop,
    /// No policy matched; the record is kept by default.
    NoMatch,
}

/// Restrictiveness ranking of keep decisions; lower is more restrictive.
/// The most restrictive kind among the matched policies wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Strictness {
    Drop,
    RateLimit,
    Sample,
    KeepAll,
}

const fn strictness<F>(keep: &CompiledKeep<F>) -> Strictness {
    match keep {
        CompiledKeep::None => Strictness::Drop,
        CompiledKeep::RateLimit { .. } => Strictness::RateLimit,
        CompiledKeep::Sample(_) => Strictness::Sample,
        CompiledKeep::All => Strictness::KeepAll,
    }
}

/// The evaluator. Stateless apart from its registry handle; clone freely
/// across threads.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    registry: Arc<PolicyRegistry>,
}

impl PolicyEngine {
    /// An engine evaluating against the registry's current snapshot.
    #[must_use]
    pub fn new(registry: Arc<PolicyRegistry>) -> Self {
        Self { registry }
    }

    /// Evaluates one log record.
    pub fn evaluate_log<A>(&self, accessor: &mut A) -> Verdict
    where
        A: FieldAccessor<Field = LogField>,
    {
        let snapshot = self.registry.snapshot();
        evaluate(&snapshot.logs, accessor)
    }

    /// Evaluates one metric.
    pub fn evaluate_metric<A>(&self, accessor: &mut A) -> Verdict
    where
        A: FieldAccessor<Field = MetricField>,
    {
        let snapshot = self.registry.snapshot();
        evaluate(&snapshot.metrics, accessor)
    }

    /// Evaluates one span.
    pub fn evaluate_trace<A>(&self, accessor: &mut A) -> Verdict
    where
        A: FieldAccessor<Field = TraceField>,
    {
        let snapshot = self.registry.snapshot();
        evaluate(&snapshot.traces, accessor)
    }
}

fn evaluate<F, A>(policies: &[CompiledPolicy<F>], accessor: &mut A) -> Verdict
where
    F: Copy,
    A: FieldAccessor<Field = F>,
{
    // Matching pass. Policies arrive ID-sorted from the snapshot, so the
    // matched list is ID-sorted too.
    let mut matched: Vec<&CompiledPolicy<F>> = Vec::new();
    for policy in policies {
        if policy.matches(accessor) {
            policy.counters.record_hit();
            matched.push(policy);
        } else {
            policy.counters.record_miss();
        }
    }

    if matched.is_empty() {
        return Verdict::no_match();
    }

    let strictest = matched
        .iter()
        .map(|policy| strictness(&policy.keep))
        .min()
        .unwrap_or(Strictness::KeepAll);

    // Ties among rate-limit or sample policies go to the first one in ID
    // order: only that policy's bucket is charged or sampler consulted.
    let mut pending_trace_state: Option<String> = None;
    let decision = match strictest {
        Strictness::Drop => Decision::Drop,
        Strictness::KeepAll => Decision::Keep,
        Strictness::RateLimit => {
            let mut decision = Decision::Keep;
            for policy in &matched {
                if let CompiledKeep::RateLimit { limiter, key } = &policy.keep {
                    let key_value = key
                        .as_ref()
                        .and_then(|field| accessor.read(field))
                        .map_or_else(String::new, std::borrow::Cow::into_owned);
                    decision = if limiter.try_acquire(&key_value) {
                        Decision::Keep
                    } else {
                        Decision::Drop
                    };
                    break;
                }
            }
            decision
        }
        Strictness::Sample => {
            let mut decision = Decision::Keep;
            for policy in &matched {
                if let CompiledKeep::Sample(sampler) = &policy.keep {
                    let outcome = sampler.decide(accessor);
                    if outcome.keep {
                        pending_trace_state = outcome.trace_state;
                        decision = Decision::Keep;
                    } else {
                        decision = Decision::Drop;
                    }
                    break;
                }
            }
            decision
        }
    };

    let matched_ids: Vec<String> = matched.iter().map(|policy| policy.id.clone()).collect();

    if decision == Decision::Drop {
        return Verdict {
            decision,
            matched: matched_ids,
        };
    }

    // Transform pass: every matched policy's ops, in policy-ID order. There
    // is no second matching pass; transforms are invisible to matchers.
    for policy in &matched {
        transform::apply_all(policy.transforms(), accessor);
    }

    if let Some(trace_state) = pending_trace_state {
        accessor.set_trace_state(&trace_state);
    }

    Verdict {
        decision,
        matched: matched_ids,
    }
}
