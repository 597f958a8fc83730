//! CSV report renderer.
//!
//! Unlike RFC 4180 output, separators inside values are stripped rather
//! than quoted, so the file splits cleanly on `,` in any spreadsheet.
//! Line breaks inside values collapse to a single space so every record
//! stays on one line.

use std::borrow::Cow;

use auditlog_types::{AuditReport, CSV_SEPARATOR};

use crate::columns::ColumnMapping;

/// Renders a report as CSV.
///
/// Header first, then one row per record in report order. Rows are joined
/// by `\n` with no line break after the last one; an empty report renders
/// as the header alone.
pub fn render_csv(report: &AuditReport) -> String {
    let mapping = ColumnMapping::for_type(report.audit_type);

    let mut lines = Vec::with_capacity(report.len() + 1);
    lines.push(join_row(mapping.headers().map(Cow::Borrowed)));
    for rec in &report.records {
        lines.push(join_row(mapping.columns.iter().map(|c| c.cell(rec))));
    }
    lines.join("\n")
}

fn join_row<'a>(cells: impl Iterator<Item = Cow<'a, str>>) -> String {
    let mut out = String::new();
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(CSV_SEPARATOR);
        }
        out.push_str(&clean_cell(&cell));
    }
    out
}

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Removes CSV separators from a field and folds each run of line breaks
/// into one space.
fn clean_cell(field: &str) -> Cow<'_, str> {
    if !field.contains(|c| c == CSV_SEPARATOR || is_line_break(c)) {
        return Cow::Borrowed(field);
    }

    let mut out = String::with_capacity(field.len());
    let mut in_break = false;
    for c in field.chars() {
        if is_line_break(c) {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
            continue;
        }
        in_break = false;
        if c != CSV_SEPARATOR {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_types::{AgeDays, AuditType, CanonicalAuditRecord};
    use chrono::{TimeZone, Utc};

    fn feature_record(old: &str, age: u64) -> CanonicalAuditRecord {
        CanonicalAuditRecord {
            id: "11".to_string(),
            record: Some("Advanced Shipping".to_string()),
            context: None,
            change_type: Some("Change".to_string()),
            field: Some("FEATURE_STATUS".to_string()),
            role: Some("Administrator".to_string()),
            record_id: None,
            record_type: None,
            workflow_name: None,
            change_instant: Some(Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap()),
            actor_id: Some("5".to_string()),
            actor_name: Some("Doe, Jane".to_string()),
            old_value: Some(old.to_string()),
            new_value: Some("T".to_string()),
            age_days: AgeDays::Days(age),
        }
    }

    fn report(records: Vec<CanonicalAuditRecord>) -> AuditReport {
        AuditReport {
            audit_type: AuditType::Features,
            records,
            has_recent_change: false,
        }
    }

    #[test]
    fn empty_report_is_header_only() {
        let csv = render_csv(&AuditReport::empty(AuditType::Workflows));
        assert_eq!(csv, "Workflow,Who,Date,Old Value,New Value,Days Since Change");
    }

    #[test]
    fn strips_commas_from_values() {
        let csv = render_csv(&report(vec![feature_record("A,B", 0)]));
        insta::assert_snapshot!(csv, @r"
        Record,Who,Role,Date,Type,Field,Old Value,New Value,Days Since Change
        Advanced Shipping,Doe Jane,Administrator,2024-03-10 11:00:00,Change,FEATURE_STATUS,AB,T,0
        ");
    }

    #[test]
    fn no_trailing_newline_and_one_line_per_record() {
        let csv = render_csv(&report(vec![feature_record("F", 0), feature_record("F", 2)]));
        assert!(!csv.ends_with('\n'));
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn every_row_has_the_header_width() {
        let csv = render_csv(&report(vec![feature_record("x,y,z", 1)]));
        let widths: Vec<usize> = csv.lines().map(|l| l.split(',').count()).collect();
        assert_eq!(widths, vec![9, 9]);
    }

    #[test]
    fn line_breaks_in_values_stay_on_one_row() {
        let csv = render_csv(&report(vec![
            feature_record("line1\nline2", 0),
            feature_record("a\r\nb", 1),
        ]));
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(",line1 line2,T,0"), "{}", lines[1]);
        assert!(lines[2].contains(",a b,T,1"), "{}", lines[2]);
        assert!(!csv.contains('\r'));
    }

    #[test]
    fn clean_cell_borrows_clean_values() {
        assert!(matches!(clean_cell("plain"), Cow::Borrowed("plain")));
        assert_eq!(clean_cell("x,\n\ny"), "x y");
    }
}
