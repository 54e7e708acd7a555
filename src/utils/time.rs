use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

/// Formats accepted for timestamps without an offset
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Output format for timestamps that arrived without an offset
const NAIVE_OUTPUT: &str = "%Y-%m-%dT%H:%M:%S";

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Parse an ISO 8601 timestamp, reading naive values as wall time in `tz`
pub fn parse_timestamp(value: &str, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    let naive = parse_naive(value)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Normalize a timestamp to RFC 3339 with an explicit offset
pub fn normalize_rfc3339(value: &str, tz: &Tz) -> Option<String> {
    parse_timestamp(value, tz).map(|dt| dt.to_rfc3339())
}

/// Shift a timestamp by `delta`, keeping the offset style of the input
pub fn shift_timestamp(value: &str, delta: Duration) -> Option<String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some((dt + delta).to_rfc3339());
    }

    let naive = parse_naive(value)?;
    naive
        .checked_add_signed(delta)
        .map(|shifted| shifted.format(NAIVE_OUTPUT).to_string())
}

/// Human-readable form used in confirmation and result messages
pub fn format_for_display(value: &str, tz: &Tz) -> String {
    if let Some(dt) = parse_timestamp(value, tz) {
        return dt.with_timezone(tz).format("%d.%m.%Y %H:%M").to_string();
    }
    // All-day events only carry a date
    if let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        return date.format("%d.%m.%Y").to_string();
    }
    value.to_string()
}
