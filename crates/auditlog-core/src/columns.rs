use std::borrow::Cow;

use auditlog_types::{AuditType, CanonicalAuditRecord};

/// Display layout for report timestamps (UTC).
pub const DATE_CELL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One report column: a header label and the record field it shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Record,
    Workflow,
    Who,
    Role,
    Date,
    Context,
    Type,
    Field,
    OldValue,
    NewValue,
    RecordId,
    RecordType,
    DaysSinceChange,
}

impl Column {
    pub fn header(self) -> &'static str {
        match self {
            Column::Record => "Record",
            Column::Workflow => "Workflow",
            Column::Who => "Who",
            Column::Role => "Role",
            Column::Date => "Date",
            Column::Context => "Context",
            Column::Type => "Type",
            Column::Field => "Field",
            Column::OldValue => "Old Value",
            Column::NewValue => "New Value",
            Column::RecordId => "Record ID",
            Column::RecordType => "Record Type",
            Column::DaysSinceChange => "Days Since Change",
        }
    }

    /// Unescaped cell text for `rec`. Absent values are empty.
    pub fn cell(self, rec: &CanonicalAuditRecord) -> Cow<'_, str> {
        match self {
            Column::Record => text(&rec.record),
            Column::Workflow => text(&rec.workflow_name),
            Column::Who => text(if rec.actor_name.is_some() {
                &rec.actor_name
            } else {
                &rec.actor_id
            }),
            Column::Role => text(&rec.role),
            Column::Date => match rec.change_instant {
                Some(dt) => Cow::Owned(dt.format(DATE_CELL_FORMAT).to_string()),
                None => Cow::Borrowed(""),
            },
            Column::Context => text(&rec.context),
            Column::Type => text(&rec.change_type),
            Column::Field => text(&rec.field),
            Column::OldValue => text(&rec.old_value),
            Column::NewValue => text(&rec.new_value),
            Column::RecordId => text(&rec.record_id),
            Column::RecordType => text(&rec.record_type),
            Column::DaysSinceChange => Cow::Owned(rec.age_days.to_string()),
        }
    }
}

fn text(value: &Option<String>) -> Cow<'_, str> {
    Cow::Borrowed(value.as_deref().unwrap_or(""))
}

const FEATURES_COLUMNS: &[Column] = &[
    Column::Record,
    Column::Who,
    Column::Role,
    Column::Date,
    Column::Type,
    Column::Field,
    Column::OldValue,
    Column::NewValue,
    Column::DaysSinceChange,
];

const SCRIPTS_COLUMNS: &[Column] = &[
    Column::Record,
    Column::Who,
    Column::Date,
    Column::Context,
    Column::Type,
    Column::Field,
    Column::OldValue,
    Column::NewValue,
    Column::Role,
    Column::RecordId,
    Column::RecordType,
    Column::DaysSinceChange,
];

const WORKFLOWS_COLUMNS: &[Column] = &[
    Column::Workflow,
    Column::Who,
    Column::Date,
    Column::OldValue,
    Column::NewValue,
    Column::DaysSinceChange,
];

/// The fixed, ordered column layout of one audit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    pub audit_type: AuditType,
    pub columns: &'static [Column],
}

impl ColumnMapping {
    pub fn for_type(audit_type: AuditType) -> Self {
        let columns = match audit_type {
            AuditType::Features => FEATURES_COLUMNS,
            AuditType::Scripts => SCRIPTS_COLUMNS,
            AuditType::Workflows => WORKFLOWS_COLUMNS,
        };
        Self {
            audit_type,
            columns,
        }
    }

    pub fn headers(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.header())
    }
}
