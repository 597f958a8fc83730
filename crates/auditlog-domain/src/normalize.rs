use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use auditlog_types::{
    AuditType, CanonicalAuditRecord, KEY_SYSTEM_NOTES_DATE, KEY_SYSTEM_NOTES_NAME,
    KEY_SYSTEM_NOTES_NEW_VALUE, KEY_SYSTEM_NOTES_OLD_VALUE, RawAuditEntry, RawField,
};

use crate::age::{age_days, parse_change_instant_in};
use crate::sanitize::clean_text;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("entry '{entry_id}' is missing required field '{field}'")]
    MissingField {
        entry_id: String,
        field: &'static str,
    },
    #[error("entry '{entry_id}' came from a {found} query, expected {expected}")]
    TypeMismatch {
        entry_id: String,
        expected: AuditType,
        found: AuditType,
    },
}

impl NormalizationError {
    pub fn entry_id(&self) -> &str {
        match self {
            NormalizationError::MissingField { entry_id, .. }
            | NormalizationError::TypeMismatch { entry_id, .. } => entry_id,
        }
    }
}

/// Where a raw entry keeps its actor, date and value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Columns sit directly on the system-note row.
    Direct,
    /// Columns come from the joined system-note group.
    SystemNotes,
}

struct ChangeKeys {
    actor: &'static str,
    date: &'static str,
    old_value: &'static str,
    new_value: &'static str,
}

const DIRECT_KEYS: ChangeKeys = ChangeKeys {
    actor: "name",
    date: "date",
    old_value: "oldvalue",
    new_value: "newvalue",
};

const SYSTEM_NOTES_KEYS: ChangeKeys = ChangeKeys {
    actor: KEY_SYSTEM_NOTES_NAME,
    date: KEY_SYSTEM_NOTES_DATE,
    old_value: KEY_SYSTEM_NOTES_OLD_VALUE,
    new_value: KEY_SYSTEM_NOTES_NEW_VALUE,
};

impl FieldSource {
    pub fn for_type(audit_type: AuditType) -> Self {
        match audit_type {
            AuditType::Features | AuditType::Scripts => FieldSource::Direct,
            AuditType::Workflows => FieldSource::SystemNotes,
        }
    }

    fn keys(self) -> &'static ChangeKeys {
        match self {
            FieldSource::Direct => &DIRECT_KEYS,
            FieldSource::SystemNotes => &SYSTEM_NOTES_KEYS,
        }
    }
}

/// Normalize one raw entry into a canonical record.
///
/// The field layout is chosen by `audit_type`, which must match the type
/// the entry was queried with. Every text field is stripped of the legacy
/// delimiter. `now` anchors the derived `age_days`. Offset-less dates are
/// read as UTC; use [`normalize_in`] for an account on another zone.
pub fn normalize(
    entry: &RawAuditEntry,
    audit_type: AuditType,
    now: DateTime<Utc>,
) -> Result<CanonicalAuditRecord, NormalizationError> {
    normalize_in(entry, audit_type, now, Tz::UTC)
}

/// [`normalize`], reading offset-less change dates in `zone`.
pub fn normalize_in(
    entry: &RawAuditEntry,
    audit_type: AuditType,
    now: DateTime<Utc>,
    zone: Tz,
) -> Result<CanonicalAuditRecord, NormalizationError> {
    if entry.audit_type != audit_type {
        return Err(NormalizationError::TypeMismatch {
            entry_id: entry.id.clone(),
            expected: audit_type,
            found: entry.audit_type,
        });
    }

    let id = clean_text(Some(entry.id.clone())).ok_or_else(|| NormalizationError::MissingField {
        entry_id: entry.id.clone(),
        field: "id",
    })?;

    let source = FieldSource::for_type(audit_type);
    let keys = source.keys();
    let text = |key: &str| clean_text(entry.get(key).and_then(RawField::text));

    let actor = entry.get(keys.actor);
    let actor_id = clean_text(actor.and_then(RawField::value));
    let actor_name = clean_text(actor.and_then(RawField::text));
    if actor_id.is_none() && actor_name.is_none() {
        return Err(NormalizationError::MissingField {
            entry_id: id,
            field: keys.actor,
        });
    }

    let change_instant = entry
        .get(keys.date)
        .and_then(RawField::text)
        .and_then(|s| parse_change_instant_in(&s, zone));

    let mut record = CanonicalAuditRecord {
        id,
        record: None,
        context: None,
        change_type: None,
        field: None,
        role: None,
        record_id: None,
        record_type: None,
        workflow_name: None,
        change_instant,
        actor_id,
        actor_name,
        old_value: text(keys.old_value),
        new_value: text(keys.new_value),
        age_days: age_days(change_instant, now),
    };

    match source {
        FieldSource::Direct => {
            record.record = text("record");
            record.context = text("context");
            record.change_type = text("type");
            record.field = clean_text(entry.get("field").and_then(RawField::value));
            record.role = text("role");
            record.record_id = text("recordid");
            record.record_type = text("recordtype");
        }
        FieldSource::SystemNotes => {
            record.workflow_name = text("name");
        }
    }

    Ok(record)
}
