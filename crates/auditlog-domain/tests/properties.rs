//! Property-based tests for auditlog-domain.
//!
//! Normalization always yields a delimiter-free record laid out for its
//! audit type, and the legacy key codec round-trips canonical records.

use proptest::prelude::*;

use auditlog_domain::{
    LEGACY_FIELD_COUNT, MILLIS_PER_DAY, NormalizationError, age_days, clean_text,
    decode_legacy_key, encode_legacy_batch, encode_legacy_key, normalize,
};
use auditlog_testkit::arb::{arb_canonical_record, arb_typed_batch};
use auditlog_testkit::{arb_audit_type, arb_raw_entry, fixed_now};
use auditlog_types::{AgeDays, AuditType, CanonicalAuditRecord, RawField};
use chrono::TimeDelta;

fn text_fields(rec: &CanonicalAuditRecord) -> Vec<Option<&str>> {
    vec![
        Some(rec.id.as_str()),
        rec.record.as_deref(),
        rec.context.as_deref(),
        rec.change_type.as_deref(),
        rec.field.as_deref(),
        rec.role.as_deref(),
        rec.record_id.as_deref(),
        rec.record_type.as_deref(),
        rec.workflow_name.as_deref(),
        rec.actor_id.as_deref(),
        rec.actor_name.as_deref(),
        rec.old_value.as_deref(),
        rec.new_value.as_deref(),
    ]
}

// ==================== Legacy Key ====================

proptest! {
    #[test]
    fn legacy_key_round_trips(rec in arb_canonical_record()) {
        let key = encode_legacy_key(&rec);
        prop_assert_eq!(key.split(';').count(), LEGACY_FIELD_COUNT);

        let decoded = decode_legacy_key(&key, fixed_now()).expect("decode");
        prop_assert_eq!(decoded, rec);
    }

    #[test]
    fn legacy_batch_is_one_line_per_record(records in prop::collection::vec(arb_canonical_record(), 0..8)) {
        let batch = encode_legacy_batch(&records);
        let lines: Vec<&str> = batch.split('\n').collect();
        prop_assert_eq!(lines.len(), records.len() + 1);
        prop_assert_eq!(lines[0], auditlog_types::LEGACY_KEY_SCHEMA_V1);
        for line in &lines[1..] {
            prop_assert!(!line.contains('\r'));
            prop_assert_eq!(line.split(';').count(), LEGACY_FIELD_COUNT);
        }
    }
}

// ==================== Normalization ====================

proptest! {
    #[test]
    fn generated_entries_always_normalize((audit_type, entries) in arb_typed_batch()) {
        for entry in &entries {
            let rec = normalize(entry, audit_type, fixed_now()).expect("normalize");
            prop_assert_eq!(&rec.id, &entry.id);
            prop_assert!(rec.actor_id.is_some() || rec.actor_name.is_some());
            prop_assert_eq!(rec.age_days, age_days(rec.change_instant, fixed_now()));
        }
    }

    #[test]
    fn field_set_follows_audit_type(
        entry in arb_audit_type().prop_flat_map(arb_raw_entry)
    ) {
        let audit_type = entry.audit_type;
        let rec = normalize(&entry, audit_type, fixed_now()).expect("normalize");
        match audit_type {
            AuditType::Workflows => {
                prop_assert!(rec.workflow_name.is_some());
                prop_assert_eq!(rec.record, None);
                prop_assert_eq!(rec.context, None);
                prop_assert_eq!(rec.change_type, None);
                prop_assert_eq!(rec.field, None);
                prop_assert_eq!(rec.role, None);
                prop_assert_eq!(rec.record_id, None);
                prop_assert_eq!(rec.record_type, None);
            }
            AuditType::Features => {
                prop_assert_eq!(rec.workflow_name, None);
                prop_assert_eq!(rec.context, None);
                prop_assert_eq!(rec.record_id, None);
                prop_assert_eq!(rec.record_type, None);
                prop_assert!(rec.field.is_some());
                prop_assert!(rec.role.is_some());
            }
            AuditType::Scripts => {
                prop_assert_eq!(rec.workflow_name, None);
                prop_assert!(rec.field.is_some());
                prop_assert!(rec.role.is_some());
            }
        }
    }

    #[test]
    fn normalized_text_never_contains_delimiter(
        entry in arb_audit_type().prop_flat_map(arb_raw_entry),
        noise in "[a-z;]{1,12}",
    ) {
        let mut entry = entry;
        for value in entry.values.values_mut() {
            if let RawField::Text(s) = value {
                s.push_str(&noise);
            }
        }
        let audit_type = entry.audit_type;
        let rec = normalize(&entry, audit_type, fixed_now()).expect("normalize");
        for field in text_fields(&rec).into_iter().flatten() {
            prop_assert!(!field.contains(';'), "field {:?} kept a delimiter", field);
            prop_assert!(!field.is_empty());
        }
    }

    #[test]
    fn mismatched_type_is_always_rejected(
        entry in arb_audit_type().prop_flat_map(arb_raw_entry),
        requested in arb_audit_type(),
    ) {
        prop_assume!(requested != entry.audit_type);
        let err = normalize(&entry, requested, fixed_now()).unwrap_err();
        let is_mismatch = matches!(err, NormalizationError::TypeMismatch { .. });
        prop_assert!(is_mismatch);
    }
}

// ==================== Age ====================

proptest! {
    #[test]
    fn age_is_whole_days_in_either_direction(
        days in 0u64..400,
        remainder in 0u64..MILLIS_PER_DAY,
        future in any::<bool>(),
    ) {
        let offset = TimeDelta::milliseconds((days * MILLIS_PER_DAY + remainder) as i64);
        let instant = if future { fixed_now() + offset } else { fixed_now() - offset };
        prop_assert_eq!(age_days(Some(instant), fixed_now()), AgeDays::Days(days));
    }

    #[test]
    fn clean_text_output_is_none_or_delimiter_free(s in ".{0,40}") {
        match clean_text(Some(s.clone())) {
            None => prop_assert!(s.chars().all(|c| c == ';')),
            Some(cleaned) => {
                prop_assert!(!cleaned.contains(';'));
                prop_assert!(!cleaned.is_empty());
            }
        }
    }
}
