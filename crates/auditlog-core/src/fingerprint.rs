//! Stable fingerprints for canonical records.
//!
//! Two records share a fingerprint exactly when their legacy keys are
//! identical, which is how repeated change-log rows are collapsed.

use std::collections::HashSet;

use auditlog_domain::encode_legacy_key;
use auditlog_types::CanonicalAuditRecord;
use sha2::{Digest, Sha256};

/// SHA-256 of the record's legacy key, truncated to 16 hex characters.
pub fn compute_fingerprint(rec: &CanonicalAuditRecord) -> String {
    let hash = Sha256::digest(encode_legacy_key(rec).as_bytes());
    hex::encode(&hash[..8])
}

/// Keep the first arrival of each fingerprint. Returns the survivors and
/// the number of records dropped.
pub fn dedupe_records(records: Vec<CanonicalAuditRecord>) -> (Vec<CanonicalAuditRecord>, u32) {
    let mut seen = HashSet::with_capacity(records.len());
    let mut dropped = 0u32;
    let kept = records
        .into_iter()
        .filter(|rec| {
            let fresh = seen.insert(compute_fingerprint(rec));
            if !fresh {
                dropped += 1;
            }
            fresh
        })
        .collect();
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_types::AgeDays;

    fn test_record() -> CanonicalAuditRecord {
        CanonicalAuditRecord {
            id: "101".to_string(),
            record: Some("Invoice Sync".to_string()),
            context: Some("UI".to_string()),
            change_type: Some("Change".to_string()),
            field: Some("STATUS".to_string()),
            role: Some("Administrator".to_string()),
            record_id: Some("88".to_string()),
            record_type: Some("Script Deployment".to_string()),
            workflow_name: None,
            change_instant: None,
            actor_id: Some("5".to_string()),
            actor_name: Some("Jane Doe".to_string()),
            old_value: Some("Testing".to_string()),
            new_value: Some("Released".to_string()),
            age_days: AgeDays::Unavailable,
        }
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let fp = compute_fingerprint(&test_record());
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(
            compute_fingerprint(&test_record()),
            compute_fingerprint(&test_record())
        );
    }

    #[test]
    fn fingerprint_differs_for_different_values() {
        let mut other = test_record();
        other.new_value = Some("Not Scheduled".to_string());
        assert_ne!(compute_fingerprint(&test_record()), compute_fingerprint(&other));
    }

    #[test]
    fn fingerprint_ignores_age() {
        let mut other = test_record();
        other.age_days = AgeDays::Days(3);
        assert_eq!(compute_fingerprint(&test_record()), compute_fingerprint(&other));
    }

    #[test]
    fn dedupe_keeps_first_arrival() {
        let mut second = test_record();
        second.id = "102".to_string();
        let mut dup = test_record();
        dup.actor_name = Some("Jane Doe".to_string());

        let (kept, dropped) = dedupe_records(vec![test_record(), second.clone(), dup]);
        assert_eq!(dropped, 1);
        assert_eq!(kept, vec![test_record(), second]);
    }

    #[test]
    fn dedupe_of_nothing_is_nothing() {
        let (kept, dropped) = dedupe_records(vec![]);
        assert!(kept.is_empty());
        assert_eq!(dropped, 0);
    }
}
