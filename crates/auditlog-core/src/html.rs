//! HTML table and e-mail body renderers.

use std::borrow::Cow;

use auditlog_types::AuditReport;

use crate::columns::ColumnMapping;

/// Class carried by the header row of every report table.
pub const TABLE_HEADER_CLASS: &str = "the-table-header";

/// Job identifier named in the e-mail footer.
pub const GENERATOR_ID: &str = "auditlog";

const EMAIL_STYLE: &str = concat!(
    "body {font-family:Verdana,sans-serif;font-size:15px;line-height:1.5;background-color:#00467f;overflow-x:hidden}",
    "table {padding-left:3px;padding-right:3px;}",
    "code {font-family:monospace;font-size:1em;color:#eeeeee;}",
    ".the-main {position:relative;top:45px;transition:margin-left 0.4s;color:#fff;background-color:#000000;padding-top:25px;}",
    ".the-section {max-width:800px;margin:auto;margin-bottom:25px;background-color:#222222;padding:60px 85px 60px 85px;}",
    ".the-table-header {color:#ffffff;background-color:#00467f;font-weight:bold;}",
);

/// Entity-escape `&`, `<`, `>` and `"`.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Renders a report as an HTML table.
///
/// Each data row is bold when that record is less than a day old. Values
/// keep their commas; only markup characters are escaped.
pub fn render_html_table(report: &AuditReport) -> String {
    let mapping = ColumnMapping::for_type(report.audit_type);

    let mut out = String::new();
    out.push_str("<table><tr class=\"");
    out.push_str(TABLE_HEADER_CLASS);
    out.push_str("\">");
    for header in mapping.headers() {
        out.push_str("<td>");
        out.push_str(header);
        out.push_str("</td>");
    }
    out.push_str("</tr>");

    for rec in &report.records {
        let bold = rec.age_days.is_today();
        out.push_str("<tr>");
        for column in mapping.columns {
            let cell = column.cell(rec);
            let cell = escape_html(&cell);
            if bold {
                out.push_str("<td><b>");
                out.push_str(&cell);
                out.push_str("</b></td>");
            } else {
                out.push_str("<td>");
                out.push_str(&cell);
                out.push_str("</td>");
            }
        }
        out.push_str("</tr>");
    }

    out.push_str("</table>");
    out
}

/// Wraps a rendered table in the full notification document.
pub fn render_email_body(table: &str) -> String {
    format!(
        "<html><head><style>{EMAIL_STYLE}</style></head><body>\
         <div class=\"the-main\"><div class=\"the-section\">{table}<br/>\
         <i>This was generated by the job with ID:</i> <code>{GENERATOR_ID}</code>\
         </div></div></body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_types::{AgeDays, AuditType, CanonicalAuditRecord};

    fn workflow(name: &str, age: AgeDays) -> CanonicalAuditRecord {
        CanonicalAuditRecord {
            id: "7".to_string(),
            record: None,
            context: None,
            change_type: None,
            field: None,
            role: None,
            record_id: None,
            record_type: None,
            workflow_name: Some(name.to_string()),
            change_instant: None,
            actor_id: Some("9".to_string()),
            actor_name: Some("Sam Lee".to_string()),
            old_value: Some("A,B".to_string()),
            new_value: Some("T".to_string()),
            age_days: age,
        }
    }

    fn report(records: Vec<CanonicalAuditRecord>) -> AuditReport {
        AuditReport {
            audit_type: AuditType::Workflows,
            records,
            has_recent_change: false,
        }
    }

    #[test]
    fn empty_report_renders_header_row_only() {
        insta::assert_snapshot!(
            render_html_table(&AuditReport::empty(AuditType::Workflows)),
            @r#"<table><tr class="the-table-header"><td>Workflow</td><td>Who</td><td>Date</td><td>Old Value</td><td>New Value</td><td>Days Since Change</td></tr></table>"#
        );
    }

    #[test]
    fn emphasis_is_per_row_and_commas_survive() {
        let html = render_html_table(&report(vec![
            workflow("Fresh", AgeDays::Days(0)),
            workflow("Stale", AgeDays::Unavailable),
        ]));
        assert!(html.contains(
            "<tr><td><b>Fresh</b></td><td><b>Sam Lee</b></td><td><b></b></td><td><b>A,B</b></td>"
        ));
        assert!(html.contains(
            "<tr><td>Stale</td><td>Sam Lee</td><td></td><td>A,B</td><td>T</td><td>Not Available</td></tr>"
        ));
    }

    #[test]
    fn markup_is_escaped() {
        let html = render_html_table(&report(vec![workflow(
            "<script>\"x\" & y</script>",
            AgeDays::Days(3),
        )]));
        assert!(html.contains("<td>&lt;script&gt;&quot;x&quot; &amp; y&lt;/script&gt;</td>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn escape_borrows_clean_text() {
        assert!(matches!(escape_html("plain, text"), Cow::Borrowed(_)));
    }

    #[test]
    fn email_body_wraps_table() {
        let body = render_email_body("<table></table>");
        assert!(body.starts_with("<html><head><style>body {"));
        assert!(body.contains("<div class=\"the-section\"><table></table><br/>"));
        assert!(body.contains("<code>auditlog</code>"));
        assert!(body.ends_with("</body></html>"));
    }
}
