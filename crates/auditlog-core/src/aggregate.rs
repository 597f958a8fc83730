use std::cmp::Ordering;

use auditlog_types::{AuditReport, AuditType, CanonicalAuditRecord};

/// Newest first; records without a change instant sort after every dated one.
fn newest_first(a: &CanonicalAuditRecord, b: &CanonicalAuditRecord) -> Ordering {
    match (a.change_instant, b.change_instant) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort, newest first. Ties keep their arrival order.
pub fn sort_newest_first(records: &mut [CanonicalAuditRecord]) {
    records.sort_by(newest_first);
}

/// Merge records, in arrival order, into a report sorted newest first.
///
/// The returned report is unclassified: `has_recent_change` is `false`
/// until [`classify`](crate::classify) runs. Zero records yield an empty
/// report.
pub fn aggregate(audit_type: AuditType, mut records: Vec<CanonicalAuditRecord>) -> AuditReport {
    sort_newest_first(&mut records);
    AuditReport {
        audit_type,
        records,
        has_recent_change: false,
    }
}
