use std::borrow::Cow;

use auditlog_types::LEGACY_DELIMITER;

/// Removes every legacy delimiter from `s`.
pub fn strip_delimiter(s: &str) -> Cow<'_, str> {
    if s.contains(LEGACY_DELIMITER) {
        Cow::Owned(s.replace(LEGACY_DELIMITER, ""))
    } else {
        Cow::Borrowed(s)
    }
}

/// Strips the delimiter and collapses an empty result to `None`.
pub fn clean_text(value: Option<String>) -> Option<String> {
    let value = value?;
    let cleaned = if value.contains(LEGACY_DELIMITER) {
        value.replace(LEGACY_DELIMITER, "")
    } else {
        value
    };
    if cleaned.is_empty() { None } else { Some(cleaned) }
}
