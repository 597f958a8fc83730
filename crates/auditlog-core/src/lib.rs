//! Core engine: aggregates normalized records, classifies and renders the
//! report, and drives one run through the collaborator traits.

mod aggregate;
mod classify;
mod columns;
mod config;
mod csv;
mod delivery;
mod fingerprint;
mod html;
mod pipeline;
mod render;

pub use aggregate::{aggregate, sort_newest_first};
pub use classify::classify;
pub use columns::{Column, ColumnMapping, DATE_CELL_FORMAT};
pub use config::{ConfigError, resolve_time_zone, validate_run_config};
pub use csv::render_csv;
pub use delivery::{
    Attachment, EntryStream, FileHandle, FileStore, Notification, NotificationError, Notifier,
    QueryError, QuerySelector, StorageError,
};
pub use fingerprint::{compute_fingerprint, dedupe_records};
pub use html::{GENERATOR_ID, TABLE_HEADER_CLASS, escape_html, render_email_body, render_html_table};
pub use pipeline::{AuditPipeline, AuditPlan, Assembly, RunError, RunOutcome, assemble_report};
pub use render::{
    RenderedReport, SUBJECT_ALERT_PREFIX, SUBJECT_LOG_PREFIX, local_date, render_report,
    report_file_name, report_subject,
};
