//! Match statistics reporting.

use serde::{Deserialize, Serialize};

/// Counter snapshot for one policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStats {
    /// The policy's ID.
    pub policy_id: String,
    /// Records all matchers accepted since the last collection.
    pub hits: u64,
    /// Records at least one matcher rejected; omitted from JSON when zero.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub misses: u64,
}

/// Stats for a whole snapshot, sorted by ascending policy ID.
///
/// An empty set serializes as `{"policies":[]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// Per-policy counters.
    pub policies: Vec<PolicyStats>,
}

impl StatsReport {
    /// Drops entries that recorded no activity.
    #[must_use]
    pub fn active_only(mut self) -> Self {
        self.policies
            .retain(|stats| stats.hits > 0 || stats.misses > 0);
        self
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &u64) -> bool {
    *value == 0
}
