use auditlog_types::AuditReport;

/// Set `has_recent_change` from the top record.
///
/// A report flags a recent change only when it is non-empty and its most
/// recent record is less than a day old. Per-row emphasis is decided by
/// each record's own age at render time, not by this flag.
pub fn classify(mut report: AuditReport) -> AuditReport {
    report.has_recent_change = report
        .most_recent()
        .is_some_and(|rec| rec.age_days.is_today());
    report
}
