//! Common test fixtures for auditlog.
//!
//! This module provides a fixed clock, sample raw entries for each audit
//! type, and sample run configurations for use in tests across the
//! workspace.

use auditlog_types::{AuditType, EmptyReportPolicy, Environment, RunConfig};
use chrono::{DateTime, TimeZone, Utc};

/// The instant every fixture treats as "now": 2024-03-10T12:00:00Z.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0)
        .single()
        .expect("fixed clock is a valid instant")
}

/// Render an instant the way the change log displays it, e.g. `3/9/2024 8:00 am`.
pub fn display_date(instant: DateTime<Utc>) -> String {
    instant.format("%-m/%-d/%Y %-I:%M %P").to_string()
}

// =============================================================================
// Sample Raw Entries
// =============================================================================

/// Raw entries shaped like the rows each audit query returns.
pub mod sample_entries {
    use std::collections::BTreeMap;

    use auditlog_types::{
        AuditType, KEY_SYSTEM_NOTES_DATE, KEY_SYSTEM_NOTES_NAME, KEY_SYSTEM_NOTES_NEW_VALUE,
        KEY_SYSTEM_NOTES_OLD_VALUE, RawAuditEntry, RawField, RawRef,
    };
    use chrono::{DateTime, TimeDelta, Utc};

    use super::{display_date, fixed_now};

    fn text(s: &str) -> RawField {
        RawField::Text(s.to_string())
    }

    fn reference(value: &str, text: &str) -> RawField {
        RawField::Ref(RawRef {
            value: value.to_string(),
            text: text.to_string(),
        })
    }

    fn entry(audit_type: AuditType, id: &str, values: Vec<(&str, RawField)>) -> RawAuditEntry {
        RawAuditEntry {
            audit_type,
            id: id.to_string(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    /// A feature toggle change made by Jane Doe at `instant`.
    pub fn feature(id: &str, instant: DateTime<Utc>, old: &str, new: &str) -> RawAuditEntry {
        entry(
            AuditType::Features,
            id,
            vec![
                ("record", text("Advanced Shipping")),
                ("name", reference("5", "Jane Doe")),
                ("date", text(&display_date(instant))),
                ("type", text("Change")),
                ("field", reference("FEATURE_STATUS", "Status")),
                ("oldvalue", text(old)),
                ("newvalue", text(new)),
                ("role", reference("3", "Administrator")),
            ],
        )
    }

    /// A script deployment change made by Jane Doe at `instant`.
    pub fn script(id: &str, instant: DateTime<Utc>) -> RawAuditEntry {
        entry(
            AuditType::Scripts,
            id,
            vec![
                ("record", text("Invoice Sync")),
                ("name", reference("5", "Jane Doe")),
                ("date", text(&display_date(instant))),
                ("context", text("UI")),
                ("type", text("Change")),
                ("field", reference("STATUS", "Status")),
                ("oldvalue", text("Testing")),
                ("newvalue", text("Released")),
                ("role", reference("3", "Administrator")),
                ("recordid", text("88")),
                ("recordtype", text("Script Deployment")),
            ],
        )
    }

    /// A workflow change, with the actor and values on the joined system note.
    pub fn workflow(id: &str, name: &str, instant: DateTime<Utc>) -> RawAuditEntry {
        entry(
            AuditType::Workflows,
            id,
            vec![
                ("name", text(name)),
                (KEY_SYSTEM_NOTES_NAME, reference("9", "Sam Lee")),
                (KEY_SYSTEM_NOTES_DATE, text(&display_date(instant))),
                (KEY_SYSTEM_NOTES_OLD_VALUE, text("F")),
                (KEY_SYSTEM_NOTES_NEW_VALUE, text("T")),
            ],
        )
    }

    /// Three workflow changes: today, yesterday, and two days ago, oldest first.
    pub fn three_workflows() -> Vec<RawAuditEntry> {
        let now = fixed_now();
        vec![
            workflow("3", "Credit Hold", now - TimeDelta::hours(49)),
            workflow("2", "Invoice Approval", now - TimeDelta::hours(25)),
            workflow("1", "Approval Routing", now - TimeDelta::hours(1)),
        ]
    }

    /// An entry of `audit_type` whose actor column is absent.
    pub fn without_actor(audit_type: AuditType, id: &str) -> RawAuditEntry {
        let mut e = match audit_type {
            AuditType::Features => feature(id, fixed_now(), "F", "T"),
            AuditType::Scripts => script(id, fixed_now()),
            AuditType::Workflows => workflow(id, "Orphaned", fixed_now()),
        };
        e.values.remove("name");
        e.values.remove(KEY_SYSTEM_NOTES_NAME);
        e
    }
}

// =============================================================================
// Sample Configs
// =============================================================================

/// Collection of sample run configurations for testing.
pub mod sample_configs {
    use super::*;

    /// A production config with one recipient.
    pub fn minimal(audit_type: AuditType) -> RunConfig {
        RunConfig {
            restrict_to_production: true,
            environment: Environment::Production,
            folder_id: 42,
            recipients: vec!["ops@example.com".to_string()],
            author_id: 7,
            audit_type,
            empty_report: EmptyReportPolicy::Skip,
            dedupe: true,
            time_zone: "UTC".to_string(),
        }
    }

    /// A sandbox config that is still gated to production.
    pub fn sandbox_gated(audit_type: AuditType) -> RunConfig {
        RunConfig {
            environment: Environment::Sandbox,
            ..minimal(audit_type)
        }
    }

    /// A config that delivers header-only reports and keeps duplicates.
    pub fn deliver_everything(audit_type: AuditType) -> RunConfig {
        RunConfig {
            restrict_to_production: false,
            environment: Environment::Sandbox,
            empty_report: EmptyReportPolicy::Deliver,
            dedupe: false,
            recipients: vec![
                "ops@example.com".to_string(),
                "audit@example.com".to_string(),
            ],
            ..minimal(audit_type)
        }
    }

    /// A production config for an account on US Pacific time.
    pub fn pacific(audit_type: AuditType) -> RunConfig {
        RunConfig {
            time_zone: "America/Los_Angeles".to_string(),
            ..minimal(audit_type)
        }
    }

    /// The TOML form of [`minimal`] for the workflows audit.
    pub const MINIMAL_TOML: &str = r#"
folder_id = 42
recipients = ["ops@example.com"]
author_id = 7
audit_type = "workflows"
"#;
}
