//! Check command implementation.

use std::fs;

use anyhow::{Context, Result};
use tracing::info;
use triage_engine::Snapshot;

/// Runs the check command: parse, validate, and compile a policy file
/// without evaluating anything.
pub fn run(policies_path: &str) -> Result<()> {
    info!("Checking policy file: {}", policies_path);

    let content = fs::read_to_string(policies_path)
        .with_context(|| format!("Failed to read policy file: {policies_path}"))?;

    let set = triage_policy::parse(&content).context("Policy document failed validation")?;
    let snapshot = Snapshot::compile(&set).context("Policy document failed compilation")?;

    info!(
        total = set.len(),
        enabled = snapshot.len(),
        logs = snapshot.logs.len(),
        metrics = snapshot.metrics.len(),
        traces = snapshot.traces.len(),
        "Policy document OK"
    );

    Ok(())
}
