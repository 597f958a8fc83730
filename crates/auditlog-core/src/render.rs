use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use auditlog_types::{AuditReport, AuditType};

use crate::csv::render_csv;
use crate::html::render_html_table;

pub const SUBJECT_ALERT_PREFIX: &str = "New Change Alert: ";
pub const SUBJECT_LOG_PREFIX: &str = "Audit Log: ";

/// Everything delivery needs from one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub csv: String,
    pub html: String,
    pub file_name: String,
    pub subject: String,
}

/// Calendar date of `now` on the account's wall clock.
pub fn local_date(now: DateTime<Utc>, zone: Tz) -> NaiveDate {
    now.with_timezone(&zone).date_naive()
}

/// `YYYY-MM-DD-<Label>.csv` for the run date.
pub fn report_file_name(audit_type: AuditType, today: NaiveDate) -> String {
    format!("{}-{}.csv", today.format("%Y-%m-%d"), audit_type.label())
}

pub fn report_subject(report: &AuditReport) -> String {
    let prefix = if report.has_recent_change {
        SUBJECT_ALERT_PREFIX
    } else {
        SUBJECT_LOG_PREFIX
    };
    format!("{prefix}{}", report.audit_type.label())
}

/// Render a classified report. `today` dates the file name.
pub fn render_report(report: &AuditReport, today: NaiveDate) -> RenderedReport {
    RenderedReport {
        csv: render_csv(report),
        html: render_html_table(report),
        file_name: report_file_name(report.audit_type, today),
        subject: report_subject(report),
    }
}
