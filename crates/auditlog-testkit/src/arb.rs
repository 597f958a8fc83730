//! Proptest strategies for generating valid test inputs.
//!
//! Strategies are constructive: text never contains the legacy delimiter,
//! optional text is never `Some("")`, and raw entries always carry an
//! actor in the location their audit type expects.
//!
//! # Bounds
//!
//! - Text fields: 1 to 30 chars
//! - Change instants: within 90 days of [`fixed_now`]
//! - Raw entry batches: up to [`MAX_ENTRIES`]

use std::collections::BTreeMap;

use auditlog_types::{
    AgeDays, AuditType, CanonicalAuditRecord, KEY_SYSTEM_NOTES_DATE, KEY_SYSTEM_NOTES_NAME,
    KEY_SYSTEM_NOTES_NEW_VALUE, KEY_SYSTEM_NOTES_OLD_VALUE, RawAuditEntry, RawField, RawRef,
};
use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;

use crate::fixtures::{display_date, fixed_now};

/// Maximum number of raw entries in a generated batch.
pub const MAX_ENTRIES: usize = 40;

const MILLIS_WINDOW: i64 = 90 * 86_400_000;

// =============================================================================
// Scalars
// =============================================================================

pub fn arb_audit_type() -> impl Strategy<Value = AuditType> {
    prop_oneof![
        Just(AuditType::Features),
        Just(AuditType::Scripts),
        Just(AuditType::Workflows),
    ]
}

/// Non-empty text free of the legacy delimiter. May contain commas and
/// line breaks.
pub fn arb_clean_text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,._\r\n-]{1,30}"
}

fn arb_opt_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of(arb_clean_text())
}

fn arb_id() -> impl Strategy<Value = String> {
    "[1-9][0-9]{0,6}"
}

/// An instant within 90 days either side of [`fixed_now`], millisecond precision.
pub fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (-MILLIS_WINDOW..MILLIS_WINDOW).prop_map(|ms| fixed_now() + TimeDelta::milliseconds(ms))
}

/// Minute-precision instant, as the change log's display format carries.
fn arb_display_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (-(MILLIS_WINDOW / 60_000)..(MILLIS_WINDOW / 60_000))
        .prop_map(|minutes| fixed_now() + TimeDelta::minutes(minutes))
}

fn age_relative_to_now(instant: Option<DateTime<Utc>>) -> AgeDays {
    match instant {
        Some(dt) => {
            AgeDays::Days((fixed_now() - dt).num_milliseconds().unsigned_abs() / 86_400_000)
        }
        None => AgeDays::Unavailable,
    }
}

// =============================================================================
// Canonical records
// =============================================================================

/// A canonical record whose `age_days` is consistent with [`fixed_now`].
pub fn arb_canonical_record() -> impl Strategy<Value = CanonicalAuditRecord> {
    (
        arb_id(),
        (arb_opt_text(), arb_opt_text(), arb_opt_text(), arb_opt_text()),
        (arb_opt_text(), arb_opt_text(), arb_opt_text(), arb_opt_text()),
        prop::option::of(arb_instant()),
        (arb_opt_text(), arb_clean_text(), arb_opt_text(), arb_opt_text()),
    )
        .prop_map(
            |(
                id,
                (record, context, change_type, field),
                (role, record_id, record_type, workflow_name),
                change_instant,
                (actor_id, actor_name, old_value, new_value),
            )| CanonicalAuditRecord {
                id,
                record,
                context,
                change_type,
                field,
                role,
                record_id,
                record_type,
                workflow_name,
                change_instant,
                actor_id,
                actor_name: Some(actor_name),
                old_value,
                new_value,
                age_days: age_relative_to_now(change_instant),
            },
        )
}

pub fn arb_canonical_records() -> impl Strategy<Value = Vec<CanonicalAuditRecord>> {
    prop::collection::vec(arb_canonical_record(), 0..MAX_ENTRIES)
}

// =============================================================================
// Raw entries
// =============================================================================

fn arb_ref() -> impl Strategy<Value = RawField> {
    (arb_id(), arb_clean_text()).prop_map(|(value, text)| RawField::Ref(RawRef { value, text }))
}

fn arb_opt_field() -> impl Strategy<Value = Option<RawField>> {
    prop::option::of(arb_clean_text().prop_map(RawField::Text))
}

fn insert_opt(values: &mut BTreeMap<String, RawField>, key: &str, field: Option<RawField>) {
    if let Some(field) = field {
        values.insert(key.to_string(), field);
    }
}

/// A raw entry laid out the way a query of `audit_type` returns it.
pub fn arb_raw_entry(audit_type: AuditType) -> BoxedStrategy<RawAuditEntry> {
    match audit_type {
        AuditType::Features | AuditType::Scripts => (
            arb_id(),
            arb_ref(),
            prop::option::of(arb_display_instant()),
            (arb_opt_field(), arb_opt_field(), arb_opt_field(), arb_opt_field()),
            (arb_ref(), arb_ref(), arb_opt_field(), arb_opt_field(), arb_opt_field()),
        )
            .prop_map(
                move |(
                    id,
                    actor,
                    instant,
                    (record, change_type, old_value, new_value),
                    (field, role, context, record_id, record_type),
                )| {
                    let mut values = BTreeMap::new();
                    values.insert("name".to_string(), actor);
                    insert_opt(
                        &mut values,
                        "date",
                        instant.map(|dt| RawField::Text(display_date(dt))),
                    );
                    insert_opt(&mut values, "record", record);
                    insert_opt(&mut values, "type", change_type);
                    insert_opt(&mut values, "oldvalue", old_value);
                    insert_opt(&mut values, "newvalue", new_value);
                    values.insert("field".to_string(), field);
                    values.insert("role".to_string(), role);
                    if audit_type == AuditType::Scripts {
                        insert_opt(&mut values, "context", context);
                        insert_opt(&mut values, "recordid", record_id);
                        insert_opt(&mut values, "recordtype", record_type);
                    }
                    RawAuditEntry {
                        audit_type,
                        id,
                        values,
                    }
                },
            )
            .boxed(),
        AuditType::Workflows => (
            arb_id(),
            arb_clean_text(),
            arb_ref(),
            prop::option::of(arb_display_instant()),
            arb_opt_field(),
            arb_opt_field(),
        )
            .prop_map(|(id, workflow, actor, instant, old_value, new_value)| {
                let mut values = BTreeMap::new();
                values.insert("name".to_string(), RawField::Text(workflow));
                values.insert(KEY_SYSTEM_NOTES_NAME.to_string(), actor);
                insert_opt(
                    &mut values,
                    KEY_SYSTEM_NOTES_DATE,
                    instant.map(|dt| RawField::Text(display_date(dt))),
                );
                insert_opt(&mut values, KEY_SYSTEM_NOTES_OLD_VALUE, old_value);
                insert_opt(&mut values, KEY_SYSTEM_NOTES_NEW_VALUE, new_value);
                RawAuditEntry {
                    audit_type: AuditType::Workflows,
                    id,
                    values,
                }
            })
            .boxed(),
    }
}

/// An audit type together with a batch of entries of that type.
pub fn arb_typed_batch() -> impl Strategy<Value = (AuditType, Vec<RawAuditEntry>)> {
    arb_audit_type().prop_flat_map(|t| {
        (
            Just(t),
            prop::collection::vec(arb_raw_entry(t), 0..MAX_ENTRIES),
        )
    })
}
