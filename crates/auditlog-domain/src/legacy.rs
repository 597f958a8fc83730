//! Flat `;`-joined key encoding of a canonical record.
//!
//! Field order is fixed: id, record, context, type, field, role, recordId,
//! recordType, workflowName, date, actorId, actorName, oldValue, newValue.
//! Absent values encode as the empty string and the date as RFC 3339.
//! `age_days` is not encoded; decoding recomputes it from `now`.
//!
//! A batch is one key per line under a schema header line.

use chrono::{DateTime, SecondsFormat, Utc};

use auditlog_types::{CanonicalAuditRecord, LEGACY_DELIMITER, LEGACY_KEY_SCHEMA_V1};

use crate::age::age_days;
use crate::sanitize::strip_delimiter;

pub const LEGACY_FIELD_COUNT: usize = 14;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LegacyDecodeError {
    #[error("legacy key has {found} fields, expected {expected}")]
    FieldCount { expected: usize, found: usize },
    #[error("legacy key has an empty id")]
    MissingId,
    #[error("legacy key has an unparsable date '{0}'")]
    InvalidDate(String),
    #[error("legacy batch has schema '{found}', expected '{expected}'")]
    UnsupportedSchema { expected: &'static str, found: String },
    #[error("legacy batch line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<LegacyDecodeError>,
    },
}

/// Encode a record as a legacy key. Delimiters inside values are stripped.
pub fn encode_legacy_key(record: &CanonicalAuditRecord) -> String {
    let date = record
        .change_instant
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true));

    let fields: [Option<&str>; LEGACY_FIELD_COUNT] = [
        Some(record.id.as_str()),
        record.record.as_deref(),
        record.context.as_deref(),
        record.change_type.as_deref(),
        record.field.as_deref(),
        record.role.as_deref(),
        record.record_id.as_deref(),
        record.record_type.as_deref(),
        record.workflow_name.as_deref(),
        date.as_deref(),
        record.actor_id.as_deref(),
        record.actor_name.as_deref(),
        record.old_value.as_deref(),
        record.new_value.as_deref(),
    ];

    let mut out = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(LEGACY_DELIMITER);
        }
        if let Some(value) = field {
            out.push_str(&strip_delimiter(value));
        }
    }
    out
}

/// Decode a legacy key back into a record, deriving `age_days` from `now`.
pub fn decode_legacy_key(
    key: &str,
    now: DateTime<Utc>,
) -> Result<CanonicalAuditRecord, LegacyDecodeError> {
    let parts: Vec<&str> = key.split(LEGACY_DELIMITER).collect();
    if parts.len() != LEGACY_FIELD_COUNT {
        return Err(LegacyDecodeError::FieldCount {
            expected: LEGACY_FIELD_COUNT,
            found: parts.len(),
        });
    }

    let opt = |i: usize| -> Option<String> {
        let s = parts[i];
        if s.is_empty() { None } else { Some(s.to_string()) }
    };

    let id = opt(0).ok_or(LegacyDecodeError::MissingId)?;
    let change_instant = match opt(9) {
        None => None,
        Some(s) => Some(
            DateTime::parse_from_rfc3339(&s)
                .map_err(|_| LegacyDecodeError::InvalidDate(s.clone()))?
                .with_timezone(&Utc),
        ),
    };

    Ok(CanonicalAuditRecord {
        id,
        record: opt(1),
        context: opt(2),
        change_type: opt(3),
        field: opt(4),
        role: opt(5),
        record_id: opt(6),
        record_type: opt(7),
        workflow_name: opt(8),
        change_instant,
        actor_id: opt(10),
        actor_name: opt(11),
        old_value: opt(12),
        new_value: opt(13),
        age_days: age_days(change_instant, now),
    })
}

/// Encode records as a legacy batch: the schema header, then one key per
/// line. Line breaks inside values become spaces.
pub fn encode_legacy_batch(records: &[CanonicalAuditRecord]) -> String {
    let mut out = String::from(LEGACY_KEY_SCHEMA_V1);
    for record in records {
        out.push('\n');
        let key = encode_legacy_key(record);
        out.extend(key.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
    }
    out
}

/// Decode a legacy batch. The first non-blank line must be the schema
/// header; blank lines after it are ignored.
pub fn decode_legacy_batch(
    text: &str,
    now: DateTime<Utc>,
) -> Result<Vec<CanonicalAuditRecord>, LegacyDecodeError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let header = lines.next().map(|(_, line)| line.trim()).unwrap_or_default();
    if header != LEGACY_KEY_SCHEMA_V1 {
        return Err(LegacyDecodeError::UnsupportedSchema {
            expected: LEGACY_KEY_SCHEMA_V1,
            found: header.to_string(),
        });
    }

    lines
        .map(|(i, line)| {
            decode_legacy_key(line, now).map_err(|e| LegacyDecodeError::Line {
                line: i + 1,
                source: Box::new(e),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_types::AgeDays;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn workflow_record() -> CanonicalAuditRecord {
        CanonicalAuditRecord {
            id: "7".to_string(),
            record: None,
            context: None,
            change_type: None,
            field: None,
            role: None,
            record_id: None,
            record_type: None,
            workflow_name: Some("Approval Routing".to_string()),
            change_instant: Some(Utc.with_ymd_and_hms(2024, 3, 9, 8, 0, 0).unwrap()),
            actor_id: Some("9".to_string()),
            actor_name: Some("Sam Lee".to_string()),
            old_value: Some("F".to_string()),
            new_value: Some("T".to_string()),
            age_days: AgeDays::Days(1),
        }
    }

    #[test]
    fn encodes_fourteen_fields_in_fixed_order() {
        let key = encode_legacy_key(&workflow_record());
        assert_eq!(key, "7;;;;;;;;Approval Routing;2024-03-09T08:00:00Z;9;Sam Lee;F;T");
        assert_eq!(key.split(';').count(), LEGACY_FIELD_COUNT);
    }

    #[test]
    fn encode_strips_embedded_delimiters() {
        let mut rec = workflow_record();
        rec.old_value = Some("a;b".to_string());
        let key = encode_legacy_key(&rec);
        assert_eq!(key.split(';').count(), LEGACY_FIELD_COUNT);
        assert!(key.ends_with(";ab;T"));
    }

    #[test]
    fn decode_restores_record_and_age() {
        let rec = workflow_record();
        let decoded = decode_legacy_key(&encode_legacy_key(&rec), now()).expect("decode");
        assert_eq!(decoded, rec);
    }

    #[test]
    fn decode_missing_date_is_unavailable() {
        let decoded = decode_legacy_key("1;;;;;;;;;;5;;;", now()).expect("decode");
        assert_eq!(decoded.change_instant, None);
        assert_eq!(decoded.age_days, AgeDays::Unavailable);
        assert_eq!(decoded.actor_id.as_deref(), Some("5"));
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let err = decode_legacy_key("1;2;3", now()).unwrap_err();
        assert_eq!(
            err,
            LegacyDecodeError::FieldCount {
                expected: 14,
                found: 3
            }
        );
    }

    #[test]
    fn decode_rejects_empty_id_and_bad_date() {
        assert_eq!(
            decode_legacy_key(";;;;;;;;;;5;;;", now()).unwrap_err(),
            LegacyDecodeError::MissingId
        );
        assert_eq!(
            decode_legacy_key("1;;;;;;;;;yesterday;5;;;", now()).unwrap_err(),
            LegacyDecodeError::InvalidDate("yesterday".to_string())
        );
    }

    #[test]
    fn batch_starts_with_schema_header() {
        let mut second = workflow_record();
        second.id = "8".to_string();
        second.old_value = Some("line1\nline2".to_string());

        let batch = encode_legacy_batch(&[workflow_record(), second]);
        let lines: Vec<&str> = batch.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "auditlog.legacy_key.v1");
        assert!(lines[2].starts_with("8;"));
        assert!(lines[2].contains(";line1 line2;"));
    }

    #[test]
    fn batch_decodes_back_to_records() {
        let records = vec![workflow_record()];
        let decoded =
            decode_legacy_batch(&format!("{}\n\n", encode_legacy_batch(&records)), now()).expect("decode");
        assert_eq!(decoded, records);
        assert!(decode_legacy_batch(&encode_legacy_batch(&[]), now()).expect("decode").is_empty());
    }

    #[test]
    fn batch_rejects_unknown_schema() {
        let err = decode_legacy_batch("auditlog.legacy_key.v2\n1;;;;;;;;;;5;;;", now()).unwrap_err();
        assert_eq!(
            err,
            LegacyDecodeError::UnsupportedSchema {
                expected: LEGACY_KEY_SCHEMA_V1,
                found: "auditlog.legacy_key.v2".to_string(),
            }
        );
        assert!(matches!(
            decode_legacy_batch("", now()),
            Err(LegacyDecodeError::UnsupportedSchema { .. })
        ));
    }

    #[test]
    fn batch_errors_name_the_line() {
        let err = decode_legacy_batch("auditlog.legacy_key.v1\n1;2;3", now()).unwrap_err();
        assert_eq!(err.to_string(), "legacy batch line 2: legacy key has 3 fields, expected 14");
    }
}
