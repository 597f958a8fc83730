use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use auditlog_types::AgeDays;

pub const MILLIS_PER_DAY: u64 = 86_400_000;

/// Date-time layouts accepted for offset-less timestamps, tried in order.
///
/// 12-hour layouts are matched against the upper-cased input.
const DATE_TIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// Whole days between `instant` and `now`, in either direction.
///
/// `floor(|now - instant| / 86_400_000 ms)`; a missing instant yields
/// [`AgeDays::Unavailable`].
pub fn age_days(instant: Option<DateTime<Utc>>, now: DateTime<Utc>) -> AgeDays {
    let Some(instant) = instant else {
        return AgeDays::Unavailable;
    };
    let millis = (now - instant).num_milliseconds().unsigned_abs();
    AgeDays::Days(millis / MILLIS_PER_DAY)
}

/// Parse a change timestamp, reading offset-less values as UTC.
pub fn parse_change_instant(text: &str) -> Option<DateTime<Utc>> {
    parse_change_instant_in(text, Tz::UTC)
}

/// Parse a change timestamp as the change log reports it.
///
/// Accepts RFC 3339, the `M/D/YYYY h:mm am` display format, ISO-like
/// `YYYY-MM-DD HH:MM[:SS]`, and bare dates (midnight). Values without an
/// offset are wall-clock times in `zone`. Returns `None` for anything else.
pub fn parse_change_instant_in(text: &str, zone: Tz) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let upper = trimmed.to_ascii_uppercase();
    for fmt in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&upper, fmt) {
            return resolve_local(naive, zone);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date
                .and_hms_opt(0, 0, 0)
                .and_then(|naive| resolve_local(naive, zone));
        }
    }

    None
}

/// Wall-clock time in `zone` to UTC.
///
/// Ambiguous times (DST fall-back) take the earlier instant; times inside a
/// spring-forward gap move one hour later.
fn resolve_local(naive: NaiveDateTime, zone: Tz) -> Option<DateTime<Utc>> {
    zone.from_local_datetime(&naive)
        .earliest()
        .or_else(|| zone.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}
