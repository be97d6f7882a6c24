//! Compiled policies and their match counters.

use std::sync::atomic::{AtomicU64, Ordering};

use triage_policy::{FieldRef, Keep, Policy, Transform};

use crate::accessor::FieldAccessor;
use crate::error::Result;
use crate::matcher::CompiledMatcher;
use crate::ratelimit::KeyedLimiter;
use crate::sampler::Sampler;

/// Per-policy hit/miss counters.
///
/// Incremented with relaxed ordering on the evaluation path; collected with a
/// sequentially consistent swap-to-zero so stats reads are exact.
#[derive(Debug, Default)]
pub struct MatchCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MatchCounters {
    /// Records a record all of whose matchers accepted.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a record at least one matcher rejected.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshots `(hits, misses)` and resets both to zero.
    pub fn take(&self) -> (u64, u64) {
        (
            self.hits.swap(0, Ordering::SeqCst),
            self.misses.swap(0, Ordering::SeqCst),
        )
    }
}

/// A policy's keep decision, compiled.
#[derive(Debug)]
pub enum CompiledKeep<F> {
    /// Keep every matching record.
    All,
    /// Drop every matching record.
    None,
    /// Deterministic probabilistic sampling.
    Sample(Sampler<F>),
    /// Token-bucket rate limiting.
    RateLimit {
        /// The policy's keyed buckets.
        limiter: KeyedLimiter,
        /// The key field partitioning them, when configured.
        key: Option<FieldRef<F>>,
    },
}

/// A compiled policy: matchers, keep decision, ordered transforms, counters.
#[derive(Debug)]
pub struct CompiledPolicy<F> {
    /// Unique policy ID; snapshots hold policies in ascending ID order.
    pub id: String,
    /// The compiled keep decision.
    pub keep: CompiledKeep<F>,
    /// Hit/miss counters, live for this compiled instance's lifetime.
    pub counters: MatchCounters,
    matchers: Vec<CompiledMatcher<F>>,
    transforms: Vec<Transform<F>>,
}

impl<F: Copy> CompiledPolicy<F> {
    /// Compiles one validated policy.
    ///
    /// Transforms are re-ordered into execution order here (all removes, then
    /// redacts, then renames, then adds) with declaration order preserved
    /// within each kind.
    ///
    /// # Errors
    ///
    /// Returns an error when a matcher regex fails to compile.
    pub fn compile(spec: &Policy<F>) -> Result<Self> {
        let matchers = spec
            .matchers
            .iter()
            .map(|matcher| CompiledMatcher::compile(&spec.id, matcher))
            .collect::<Result<Vec<_>>>()?;

        let keep = match &spec.keep {
            Keep::All => CompiledKeep::All,
            Keep::None => CompiledKeep::None,
            Keep::Sample(config) => CompiledKeep::Sample(Sampler::new(config)),
            Keep::RateLimit(config) => CompiledKeep::RateLimit {
                limiter: KeyedLimiter::new(config.count, config.window.seconds()),
                key: config
                    .key
                    .as_ref()
                    .map(|key| FieldRef::record_attribute(key.clone())),
            },
        };

        let mut transforms = spec.transforms.clone();
        transforms.sort_by_key(|transform| transform.kind);

        Ok(Self {
            id: spec.id.clone(),
            keep,
            counters: MatchCounters::default(),
            matchers,
            transforms,
        })
    }

    /// True when every matcher accepts the record.
    pub fn matches<A: FieldAccessor<Field = F>>(&self, accessor: &A) -> bool {
        self.matchers.iter().all(|matcher| matcher.matches(accessor))
    }

    /// The policy's transforms in execution order.
    #[must_use]
    pub fn transforms(&self) -> &[Transform<F>] {
        &self.transforms
    }
}
