use serde::{Deserialize, Serialize};

/// Start or end of an event, as the Calendar API represents it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    /// Set instead of `date_time` for all-day events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventDateTime {
    /// A timed instant with an optional IANA zone
    pub fn at(date_time: impl Into<String>, time_zone: Option<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone,
        }
    }

    /// The timestamp or date, whichever is set
    pub fn instant(&self) -> Option<&str> {
        self.date_time.as_deref().or(self.date.as_deref())
    }
}

/// Calendar event as returned by the provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub start: EventDateTime,
    #[serde(default)]
    pub end: EventDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl CalendarEvent {
    /// Title, or an empty string for untitled events
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or("")
    }
}

/// Body of an insert or a partial update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
}

impl EventPayload {
    /// Event the provider would create from this payload, used for simulated results
    pub fn into_event(self, id: String) -> CalendarEvent {
        CalendarEvent {
            id,
            summary: self.summary,
            description: self.description,
            location: self.location,
            start: self.start.unwrap_or_default(),
            end: self.end.unwrap_or_default(),
            html_link: None,
        }
    }
}

/// Sort order of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    StartTime,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::StartTime => "startTime",
        }
    }
}

/// Parameters of a listing; recurring events are always expanded to single occurrences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: String,
    pub time_max: Option<String>,
    pub max_results: u32,
    pub order_by: OrderBy,
}

impl EventQuery {
    /// Up to `max_results` events starting at `time_min`
    pub fn upcoming(time_min: impl Into<String>, max_results: u32) -> Self {
        Self {
            time_min: time_min.into(),
            time_max: None,
            max_results,
            order_by: OrderBy::StartTime,
        }
    }

    /// Every event inside `[time_min, time_max]`, capped at `max_results`
    pub fn window(time_min: impl Into<String>, time_max: impl Into<String>, max_results: u32) -> Self {
        Self {
            time_min: time_min.into(),
            time_max: Some(time_max.into()),
            max_results,
            order_by: OrderBy::StartTime,
        }
    }
}
