//! Data types (config, raw entries, canonical records, receipts) for auditlog.
//!
//! This crate is intentionally "dumb": pure DTOs with serde + schemars.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Schema Identifiers ─────────────────────────────────────────
pub const RUN_RECEIPT_SCHEMA_V1: &str = "auditlog.run.v1";
pub const LEGACY_KEY_SCHEMA_V1: &str = "auditlog.legacy_key.v1";

// ── Frozen Vocabulary ──────────────────────────────────────────
/// Separator of the flat legacy key. Never allowed inside a canonical text field.
pub const LEGACY_DELIMITER: char = ';';
/// Separator of CSV cells. Stripped from cell text at render time.
pub const CSV_SEPARATOR: char = ',';
/// Upper bound on notification recipients.
pub const MAX_RECIPIENTS: usize = 10;
/// Display text for [`AgeDays::Unavailable`].
pub const NOT_AVAILABLE: &str = "Not Available";

// Reason tokens (snake_case)
pub const REASON_NON_PRODUCTION: &str = "non_production";
pub const REASON_EMPTY_REPORT: &str = "empty_report";
pub const REASON_SKIPPED_ENTRIES: &str = "skipped_entries";
pub const REASON_QUERY_ERROR: &str = "query_error";
pub const REASON_STORAGE_ERROR: &str = "storage_error";
pub const REASON_NOTIFICATION_ERROR: &str = "notification_error";
pub const REASON_UNEXPECTED_ERROR: &str = "unexpected_error";
pub const REASON_INVALID_CONFIG: &str = "invalid_config";

// Joined system-note column keys (workflow searches)
pub const KEY_SYSTEM_NOTES_NAME: &str = "name.systemNotes";
pub const KEY_SYSTEM_NOTES_DATE: &str = "date.systemNotes";
pub const KEY_SYSTEM_NOTES_OLD_VALUE: &str = "oldvalue.systemNotes";
pub const KEY_SYSTEM_NOTES_NEW_VALUE: &str = "newvalue.systemNotes";

/// The category of change log being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    Features,
    Scripts,
    Workflows,
}

impl AuditType {
    pub const ALL: [AuditType; 3] = [AuditType::Features, AuditType::Scripts, AuditType::Workflows];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditType::Features => "features",
            AuditType::Scripts => "scripts",
            AuditType::Workflows => "workflows",
        }
    }

    /// Human label used in subjects and file names.
    pub fn label(self) -> &'static str {
        match self {
            AuditType::Features => "Features",
            AuditType::Scripts => "Scripts",
            AuditType::Workflows => "Workflows",
        }
    }

    /// Legacy numeric selection (1 = features, 2 = scripts, 3 = workflows).
    pub fn selection(self) -> u8 {
        match self {
            AuditType::Features => 1,
            AuditType::Scripts => 2,
            AuditType::Workflows => 3,
        }
    }

    pub fn from_selection(selection: u8) -> Option<Self> {
        match selection {
            1 => Some(AuditType::Features),
            2 => Some(AuditType::Scripts),
            3 => Some(AuditType::Workflows),
            _ => None,
        }
    }
}

impl fmt::Display for AuditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown audit type '{0}' (expected features, scripts, workflows, or 1-3)")]
pub struct ParseAuditTypeError(pub String);

impl FromStr for AuditType {
    type Err = ParseAuditTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return AuditType::from_selection(n).ok_or_else(|| ParseAuditTypeError(s.to_string()));
        }
        AuditType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseAuditTypeError(s.to_string()))
    }
}

/// A `{value, text}` pair as returned for list/record columns.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawRef {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub text: String,
}

/// One column value of a raw search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Null,
    Flag(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<RawRef>),
    Ref(RawRef),
}

impl RawField {
    /// Display text of the column. Empty values resolve to `None`.
    pub fn text(&self) -> Option<String> {
        let s = match self {
            RawField::Null => return None,
            RawField::Flag(b) => (if *b { "T" } else { "F" }).to_string(),
            RawField::Number(n) => n.to_string(),
            RawField::Text(s) => s.clone(),
            RawField::List(refs) => refs
                .iter()
                .map(|r| if r.text.is_empty() { r.value.as_str() } else { r.text.as_str() })
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            RawField::Ref(r) if r.text.is_empty() => r.value.clone(),
            RawField::Ref(r) => r.text.clone(),
        };
        non_empty(s)
    }

    /// Internal value of the column. Plain scalars resolve to their text.
    pub fn value(&self) -> Option<String> {
        match self {
            RawField::Ref(r) => non_empty(r.value.clone()),
            RawField::List(refs) => non_empty(
                refs.iter()
                    .map(|r| r.value.as_str())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => other.text(),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// A raw change-log entry, tagged with the audit type of the query that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAuditEntry {
    pub audit_type: AuditType,
    pub id: String,
    #[serde(default)]
    pub values: BTreeMap<String, RawField>,
}

impl RawAuditEntry {
    pub fn get(&self, key: &str) -> Option<&RawField> {
        self.values.get(key)
    }
}

/// Whole days elapsed since a change, or an explicit "unavailable" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgeDays {
    Days(u64),
    Unavailable,
}

impl AgeDays {
    pub fn days(self) -> Option<u64> {
        match self {
            AgeDays::Days(d) => Some(d),
            AgeDays::Unavailable => None,
        }
    }

    /// True when the change happened less than one day ago.
    pub fn is_today(self) -> bool {
        matches!(self, AgeDays::Days(0))
    }
}

impl fmt::Display for AgeDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeDays::Days(d) => write!(f, "{d}"),
            AgeDays::Unavailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

/// A change event in its source-independent shape.
///
/// Optional text fields never hold an empty string, and no text field
/// contains [`LEGACY_DELIMITER`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CanonicalAuditRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_instant: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    pub age_days: AgeDays,
}

/// Records of one run, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuditReport {
    pub audit_type: AuditType,
    pub records: Vec<CanonicalAuditRecord>,
    pub has_recent_change: bool,
}

impl AuditReport {
    pub fn empty(audit_type: AuditType) -> Self {
        Self {
            audit_type,
            records: vec![],
            has_recent_change: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn most_recent(&self) -> Option<&CanonicalAuditRecord> {
        self.records.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Production,
    Sandbox,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Sandbox => "sandbox",
        }
    }
}

/// What to do with a run that produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReportPolicy {
    /// Render, but store and send nothing.
    #[default]
    Skip,
    /// Store and send the header-only report.
    Deliver,
}

impl EmptyReportPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            EmptyReportPolicy::Skip => "skip",
            EmptyReportPolicy::Deliver => "deliver",
        }
    }
}

fn default_true() -> bool {
    true
}

/// Zone used when the config does not name one.
pub const DEFAULT_TIME_ZONE: &str = "UTC";

fn default_time_zone() -> String {
    DEFAULT_TIME_ZONE.to_string()
}

/// The on-disk run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Stop outside production unless this is cleared.
    #[serde(default = "default_true")]
    pub restrict_to_production: bool,

    #[serde(default)]
    pub environment: Environment,

    /// Folder that receives the CSV file.
    pub folder_id: u64,

    /// Notification recipients (1 to 10 addresses).
    pub recipients: Vec<String>,

    /// Identity the notification is sent as.
    pub author_id: u64,

    pub audit_type: AuditType,

    #[serde(default)]
    pub empty_report: EmptyReportPolicy,

    /// Collapse records whose legacy keys are identical.
    #[serde(default = "default_true")]
    pub dedupe: bool,

    /// IANA zone of the account. Offset-less change timestamps and the
    /// report date are read in it.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ToolMeta {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Report delivered, every entry normalized.
    Success,
    /// Report delivered, some entries were skipped.
    Partial,
    /// Nothing delivered by policy (environment gate or empty report).
    Skipped,
    /// A stage failed; nothing delivered.
    Fatal,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Skipped => "skipped",
            RunStatus::Fatal => "fatal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Query,
    Storage,
    Notification,
    Config,
    Unexpected,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Query => "query",
            FailureKind::Storage => "storage",
            FailureKind::Notification => "notification",
            FailureKind::Config => "config",
            FailureKind::Unexpected => "unexpected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub code: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunCounts {
    /// Entries yielded by the query.
    pub queried: u32,
    /// Entries that normalized successfully.
    pub normalized: u32,
    /// Entries skipped (normalization or per-entry query failures).
    pub skipped: u32,
    /// Records dropped as exact duplicates.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub duplicates: u32,
    /// Rows in the rendered report.
    pub reported: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Timing metrics for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunTiming {
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
}

/// Terminal, machine-readable summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunReceipt {
    pub schema: String,
    pub tool: ToolMeta,
    pub audit_type: AuditType,
    pub status: RunStatus,
    pub counts: RunCounts,
    pub has_recent_change: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_handle: Option<String>,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<RunTiming>,
}
