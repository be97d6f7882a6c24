//! Policy registry with atomic snapshot swap.
//!
//! The registry owns the current compiled policy set. Evaluators take a
//! reference-counted snapshot per record; updates compile the whole incoming
//! set first and swap it in only on success, so a single bad policy (say, an
//! invalid regex) preserves the prior snapshot intact.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use triage_policy::{LogField, MetricField, Policy, PolicySet, TraceField};

use crate::error::Result;
use crate::policy::CompiledPolicy;
use crate::stats::{PolicyStats, StatsReport};

/// Supplies the full desired policy set on demand.
pub trait PolicyProvider {
    /// Returns the complete policy set.
    ///
    /// # Errors
    ///
    /// Any error aborts the update; the registry keeps its prior snapshot.
    fn load(&self) -> Result<PolicySet>;
}

/// An immutable compiled policy set. Each signal's policies are stored in
/// byte-ascending ID order with disabled policies already dropped.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Compiled log policies.
    pub logs: Vec<CompiledPolicy<LogField>>,
    /// Compiled metric policies.
    pub metrics: Vec<CompiledPolicy<MetricField>>,
    /// Compiled trace policies.
    pub traces: Vec<CompiledPolicy<TraceField>>,
}

impl Snapshot {
    /// Compiles a full policy set.
    ///
    /// # Errors
    ///
    /// Returns the first compile failure; nothing of the set is kept.
    pub fn compile(set: &PolicySet) -> Result<Self> {
        Ok(Self {
            logs: compile_signal(&set.logs)?,
            metrics: compile_signal(&set.metrics)?,
            traces: compile_signal(&set.traces)?,
        })
    }

    /// Total number of compiled (enabled) policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.logs.len() + self.metrics.len() + self.traces.len()
    }

    /// True when no policies are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compile_signal<F: Copy>(policies: &[Policy<F>]) -> Result<Vec<CompiledPolicy<F>>> {
    let mut compiled = policies
        .iter()
        .filter(|policy| policy.enabled)
        .map(CompiledPolicy::compile)
        .collect::<Result<Vec<_>>>()?;
    compiled.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(compiled)
}

/// Holds the current compiled snapshot and swaps it atomically on update.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    current: RwLock<Arc<Snapshot>>,
}

impl PolicyRegistry {
    /// An empty registry; everything evaluates to no-match until an update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap reference-counted view of the current snapshot. Old snapshots
    /// stay valid until their last reader releases them.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Compiles and installs a new policy set.
    ///
    /// # Errors
    ///
    /// On any compile failure the prior snapshot stays installed.
    pub fn update(&self, set: &PolicySet) -> Result<()> {
        let snapshot = Snapshot::compile(set)?;
        tracing::debug!(policies = snapshot.len(), "installing policy snapshot");
        *self.current.write() = Arc::new(snapshot);
        Ok(())
    }

    /// Loads the full set from a provider and installs it.
    ///
    /// # Errors
    ///
    /// Provider and compile failures both leave the prior snapshot installed.
    pub fn reload(&self, provider: &dyn PolicyProvider) -> Result<()> {
        let set = provider.load().inspect_err(|error| {
            tracing::warn!(%error, "policy reload failed; keeping prior snapshot");
        })?;
        self.update(&set)
    }

    /// Snapshots every policy's counters, resetting them to zero. Entries are
    /// sorted by ascending policy ID across all signals.
    #[must_use]
    pub fn collect_stats(&self) -> StatsReport {
        let snapshot = self.snapshot();
        let mut policies: Vec<PolicyStats> = Vec::with_capacity(snapshot.len());
        collect_signal(&snapshot.logs, &mut policies);
        collect_signal(&snapshot.metrics, &mut policies);
        collect_signal(&snapshot.traces, &mut policies);
        policies.sort_by(|a, b| a.policy_id.cmp(&b.policy_id));
        StatsReport { policies }
    }
}

fn collect_signal<F: Copy>(policies: &[CompiledPolicy<F>], out: &mut Vec<PolicyStats>) {
    for policy in policies {
        let (hits, misses) = policy.counters.take();
        out.push(PolicyStats {
            policy_id: policy.id.clone(),
            hits,
            misses,
        });
    }
}

/// Loads policies from a JSON file.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    /// A provider reading the given policy document path on every load.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PolicyProvider for FileProvider {
    fn load(&self) -> Result<PolicySet> {
        let data = std::fs::read(&self.path).map_err(triage_policy::Error::from)?;
        Ok(triage_policy::parse_slice(&data)?)
    }
}
