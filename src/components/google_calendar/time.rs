use super::models::{CalendarEvent, EventDateTime};
use crate::utils::time::{format_for_display, parse_timestamp};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use chrono_tz::Tz;

/// Start instant of an event; all-day events start at local midnight
pub fn event_start(event: &CalendarEvent, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    instant_of(&event.start, tz)
}

fn instant_of(value: &EventDateTime, tz: &Tz) -> Option<DateTime<FixedOffset>> {
    if let Some(date_time) = &value.date_time {
        return parse_timestamp(date_time, tz);
    }
    let date = NaiveDate::parse_from_str(value.date.as_deref()?, "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Display form of an event start, empty when the event has none
pub fn display_start(event: &CalendarEvent, tz: &Tz) -> String {
    event
        .start
        .instant()
        .map(|s| format_for_display(s, tz))
        .unwrap_or_default()
}

/// One-line description: title and start time
pub fn describe_event(event: &CalendarEvent, tz: &Tz) -> String {
    let start = display_start(event, tz);
    if start.is_empty() {
        event.title().to_string()
    } else {
        format!("{} ({})", event.title(), start)
    }
}
