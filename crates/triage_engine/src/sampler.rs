//! Consistent probability sampling.
//!
//! A span's keep decision is a pure function of its trace ID and a 56-bit
//! rejection threshold, so independent samplers agree on the same trace. The
//! threshold travels in the `ot=th:` tracestate sub-key; kept spans get the
//! effective threshold (and a randomness value, when missing) written back.

use triage_policy::{FieldRef, SampleConfig, SampleMode};
use xxhash_rust::xxh64::xxh64;

use crate::accessor::FieldAccessor;
use crate::tracestate;

/// Bits of randomness taken from the trace ID.
const RANDOM_BITS: u32 = 56;

/// Upper bound of the randomness space; the threshold for rejecting all.
const MAX_THRESHOLD: u64 = 1 << RANDOM_BITS;

/// Hex digits in a full-width threshold or randomness value.
const HEX_DIGITS: u8 = 14;

/// A compiled sampling decision source for one policy.
#[derive(Debug, Clone)]
pub struct Sampler<F> {
    threshold: u64,
    mode: SampleMode,
    fail_closed: bool,
    key: Option<FieldRef<F>>,
}

/// Outcome of consulting the sampler for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleOutcome {
    /// Whether the record survives sampling.
    pub keep: bool,
    /// Replacement tracestate to write back for kept spans.
    pub trace_state: Option<String>,
}

impl SampleOutcome {
    const fn kept_without_writeback() -> Self {
        Self {
            keep: true,
            trace_state: None,
        }
    }

    const fn dropped() -> Self {
        Self {
            keep: false,
            trace_state: None,
        }
    }
}

impl<F: Copy> Sampler<F> {
    /// Builds a sampler from a policy's sample configuration.
    #[must_use]
    pub fn new(config: &SampleConfig) -> Self {
        Self {
            threshold: rejection_threshold(config.percentage, config.precision),
            mode: config.mode,
            fail_closed: config.fail_closed,
            key: config
                .key
                .as_ref()
                .map(|key| FieldRef::record_attribute(key.clone())),
        }
    }

    /// Decides whether the record behind `accessor` survives.
    ///
    /// Pure apart from the accessor reads: no shared state, no clock, no RNG.
    /// A missing or malformed randomness source takes the fail-closed path
    /// (drop when `fail_closed`, keep without a threshold write otherwise).
    pub fn decide<A: FieldAccessor<Field = F>>(&self, accessor: &A) -> SampleOutcome {
        // A zero keep percentage rejects the whole randomness space; behave
        // exactly like a drop decision, randomness source or not.
        if self.threshold >= MAX_THRESHOLD {
            return SampleOutcome::dropped();
        }
        let Some(randomness) = self.randomness(accessor) else {
            return if self.fail_closed {
                SampleOutcome::dropped()
            } else {
                SampleOutcome::kept_without_writeback()
            };
        };

        let incoming = accessor.trace_state();
        let incoming = incoming.as_deref().unwrap_or("");

        let threshold = match self.mode {
            SampleMode::Proportional => self.threshold,
            SampleMode::Equalizing => tracestate::ot_subkey(incoming, "th")
                .and_then(|text| parse_threshold(&text))
                .map_or(self.threshold, |existing| existing.max(self.threshold)),
        };

        if randomness < threshold {
            return SampleOutcome::dropped();
        }

        let mut entries: Vec<(&str, String)> = Vec::new();
        if tracestate::ot_subkey(incoming, "rv").is_none() {
            entries.push(("rv", format!("{randomness:014x}")));
        }
        entries.push(("th", encode_threshold(threshold)));

        SampleOutcome {
            keep: true,
            trace_state: Some(tracestate::merge_ot_subkeys(incoming, &entries)),
        }
    }

    fn randomness<A: FieldAccessor<Field = F>>(&self, accessor: &A) -> Option<u64> {
        if let Some(key) = &self.key {
            let value = accessor.read(key)?;
            return Some(xxh64(value.as_bytes(), 0) & (MAX_THRESHOLD - 1));
        }
        let id = accessor.trace_id_hex()?;
        trace_id_randomness(&id)
    }
}

/// Extracts the low 56 bits of a 32-hex-digit trace ID, big-endian.
#[must_use]
pub fn trace_id_randomness(trace_id: &str) -> Option<u64> {
    if trace_id.len() != 32 || !trace_id.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(&trace_id[trace_id.len() - usize::from(HEX_DIGITS)..], 16).ok()
}

/// Computes the 56-bit rejection threshold for a keep percentage, rounded to
/// `precision` significant hex digits. A record is kept when its randomness
/// is at or above the threshold.
#[must_use]
pub fn rejection_threshold(percentage: f64, precision: u8) -> u64 {
    if percentage <= 0.0 {
        return MAX_THRESHOLD;
    }
    if percentage >= 100.0 {
        return 0;
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    let exact = ((1.0 - percentage / 100.0) * MAX_THRESHOLD as f64).round() as u64;
    round_to_precision(exact, precision)
}

fn round_to_precision(threshold: u64, precision: u8) -> u64 {
    let precision = precision.clamp(1, HEX_DIGITS);
    let shift = 4 * u32::from(HEX_DIGITS - precision);
    if shift == 0 {
        return threshold;
    }
    let unit = 1u64 << shift;
    let rounded = (threshold + unit / 2) >> shift << shift;
    rounded.min(MAX_THRESHOLD)
}

/// Encodes a threshold as `th` sub-key text: up to 14 hex digits with
/// trailing zeros trimmed, `0` for the zero threshold. Callers never encode
/// the reject-all threshold; dropped records get no write-back.
#[must_use]
pub fn encode_threshold(threshold: u64) -> String {
    let full = format!("{threshold:014x}");
    let trimmed = full.trim_end_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parses a `th` sub-key: 1 to 14 hex digits, trailing zeros implied.
#[must_use]
pub fn parse_threshold(text: &str) -> Option<u64> {
    if text.is_empty() || text.len() > usize::from(HEX_DIGITS) {
        return None;
    }
    if !text.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let value = u64::from_str_radix(text, 16).ok()?;
    Some(value << (4 * (usize::from(HEX_DIGITS) - text.len())))
}
