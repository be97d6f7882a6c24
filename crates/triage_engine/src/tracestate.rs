//! W3C `tracestate` handling for the `ot=` vendor entry.
//!
//! The tracestate header is a comma-separated list of `vendor=value` entries;
//! the OpenTelemetry vendor packs `key:value` sub-entries separated by `;`
//! inside `ot=`. Sampling rewrites individual `ot` sub-keys and must leave
//! every other vendor byte-for-byte intact and in its original order.

/// Returns the value of one `ot=` sub-key, if present.
#[must_use]
pub fn ot_subkey(tracestate: &str, key: &str) -> Option<String> {
    for vendor in tracestate.split(',') {
        let vendor = vendor.trim();
        if let Some(packed) = vendor.strip_prefix("ot=") {
            for part in packed.split(';') {
                if let Some((found, value)) = part.trim().split_once(':') {
                    if found == key {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Merges sub-keys into the `ot=` vendor entry.
///
/// Existing `ot` sub-keys are preserved except the ones being replaced; the
/// new sub-keys are appended in the order given. The `ot=` entry is emitted
/// first, followed by all other vendors verbatim in their original order.
#[must_use]
pub fn merge_ot_subkeys(tracestate: &str, entries: &[(&str, String)]) -> String {
    let mut ot_parts: Vec<String> = Vec::new();
    let mut other_vendors: Vec<&str> = Vec::new();

    for vendor in tracestate.split(',') {
        let vendor = vendor.trim();
        if vendor.is_empty() {
            continue;
        }
        if let Some(packed) = vendor.strip_prefix("ot=") {
            for part in packed.split(';') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                let key = part.split_once(':').map_or(part, |(key, _)| key);
                if entries.iter().all(|(replaced, _)| *replaced != key) {
                    ot_parts.push(part.to_string());
                }
            }
        } else {
            other_vendors.push(vendor);
        }
    }

    for (key, value) in entries {
        ot_parts.push(format!("{key}:{value}"));
    }

    let mut merged = format!("ot={}", ot_parts.join(";"));
    if !other_vendors.is_empty() {
        merged.push(',');
        merged.push_str(&other_vendors.join(","));
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subkey_lookup() {
        assert_eq!(
            ot_subkey("ot=rv:1234;th:8", "th"),
            Some("8".to_string())
        );
        assert_eq!(
            ot_subkey("vendora=x,ot=rv:1234", "rv"),
            Some("1234".to_string())
        );
        assert_eq!(ot_subkey("vendora=x", "th"), None);
        assert_eq!(ot_subkey("", "th"), None);
    }

    #[test]
    fn merge_into_empty_tracestate() {
        let merged = merge_ot_subkeys("", &[("th", "8".to_string())]);
        assert_eq!(merged, "ot=th:8");
    }

    #[test]
    fn merge_preserves_foreign_vendors_in_order() {
        let merged = merge_ot_subkeys(
            "vendora=xyz,ot=rv:1234,vendorb=p",
            &[("th", "8".to_string())],
        );
        assert_eq!(merged, "ot=rv:1234;th:8,vendora=xyz,vendorb=p");
    }

    #[test]
    fn merge_replaces_existing_subkey() {
        let merged = merge_ot_subkeys("ot=th:4;rv:abcd", &[("th", "c".to_string())]);
        assert_eq!(merged, "ot=rv:abcd;th:c");
    }

    #[test]
    fn merge_writes_multiple_subkeys() {
        let merged = merge_ot_subkeys(
            "vendora=x",
            &[("rv", "00000000000042".to_string()), ("th", "8".to_string())],
        );
        assert_eq!(merged, "ot=rv:00000000000042;th:8,vendora=x");
    }

    #[test]
    fn merge_tolerates_whitespace_and_empty_entries() {
        let merged = merge_ot_subkeys(
            " vendora=x ,, ot= rv:1 ; ;th:2 ",
            &[("th", "4".to_string())],
        );
        assert_eq!(merged, "ot=rv:1;th:4,vendora=x");
    }
}
