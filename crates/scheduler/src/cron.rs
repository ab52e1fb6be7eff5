//! Timezone-aware cron evaluation (5-field: min hour dom month dow).

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};

/// Parse an IANA timezone name, falling back to UTC.
pub fn parse_tz(tz: &str) -> chrono_tz::Tz {
    tz.parse::<chrono_tz::Tz>().unwrap_or(chrono_tz::UTC)
}

/// One field: `*`, `*/N`, or comma-separated values and `N-M` ranges.
fn field_matches(field: &str, value: u32) -> bool {
    if field == "*" {
        return true;
    }
    if let Some(step) = field.strip_prefix("*/") {
        if let Ok(n) = step.parse::<u32>() {
            return n > 0 && value % n == 0;
        }
    }
    for part in field.split(',') {
        if let Some((lo, hi)) = part.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<u32>(), hi.parse::<u32>()) {
                if value >= lo && value <= hi {
                    return true;
                }
            }
        } else if part.parse::<u32>() == Ok(value) {
            return true;
        }
    }
    false
}

/// Whether a local wall-clock minute matches the expression. Day-of-week is
/// 0 = Sunday.
fn matches_local(cron: &str, local: &NaiveDateTime) -> bool {
    let fields: Vec<&str> = cron.split_whitespace().collect();
    if fields.len() != 5 {
        return false;
    }
    field_matches(fields[0], local.minute())
        && field_matches(fields[1], local.hour())
        && field_matches(fields[2], local.day())
        && field_matches(fields[3], local.month())
        && field_matches(fields[4], local.weekday().num_days_from_sunday())
}

/// UTC shorthand for [`matches_local`].
pub fn cron_matches(cron: &str, at: &DateTime<Utc>) -> bool {
    matches_local(cron, &at.naive_utc())
}

/// Next occurrence strictly after `after`, evaluated in `tz`, as UTC.
///
/// DST: local minutes that do not exist (spring-forward gap) are skipped;
/// ambiguous minutes (fall-back overlap) resolve to the earlier instant.
/// Returns `None` when no match exists within a year (bad expression).
pub fn cron_next_tz(
    cron: &str,
    after: &DateTime<Utc>,
    tz: chrono_tz::Tz,
) -> Option<DateTime<Utc>> {
    use chrono::TimeZone;

    let local_after = after.with_timezone(&tz).naive_local();
    let to_next_minute = 60 - i64::from(local_after.second());
    let mut candidate = local_after + chrono::Duration::seconds(to_next_minute);
    candidate = candidate.with_second(0).unwrap_or(candidate);

    let max_checks = 366 * 24 * 60;
    for _ in 0..max_checks {
        if matches_local(cron, &candidate) {
            match tz.from_local_datetime(&candidate) {
                chrono::LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
                chrono::LocalResult::Ambiguous(earliest, _) => {
                    return Some(earliest.with_timezone(&Utc));
                }
                chrono::LocalResult::None => {
                    // Nonexistent local minute; keep scanning.
                }
            }
        }
        candidate += chrono::Duration::minutes(1);
    }
    None
}
