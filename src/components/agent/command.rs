use crate::components::google_calendar::{EventDateTime, EventPayload};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intent {
    CreateEvent,
    DeleteEvent,
    UpdateEvent,
    ListEvents,
    Unknown,
    /// Interpretation failed; never reaches the executor
    Error,
    /// A name outside the known set, kept so it can be reported back
    Unsupported(String),
}

impl Intent {
    pub fn as_str(&self) -> &str {
        match self {
            Intent::CreateEvent => "create_event",
            Intent::DeleteEvent => "delete_event",
            Intent::UpdateEvent => "update_event",
            Intent::ListEvents => "list_events",
            Intent::Unknown => "unknown",
            Intent::Error => "error",
            Intent::Unsupported(name) => name,
        }
    }

    /// Whether commands with this intent run against a calendar
    pub fn needs_calendar(&self) -> bool {
        matches!(
            self,
            Intent::CreateEvent | Intent::DeleteEvent | Intent::UpdateEvent | Intent::ListEvents
        )
    }
}

impl From<&str> for Intent {
    fn from(value: &str) -> Self {
        match value.trim() {
            "create_event" => Intent::CreateEvent,
            "delete_event" => Intent::DeleteEvent,
            "update_event" => Intent::UpdateEvent,
            "list_events" => Intent::ListEvents,
            "unknown" => Intent::Unknown,
            "error" => Intent::Error,
            other => Intent::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for Intent {
    fn from(value: String) -> Self {
        Intent::from(value.as_str())
    }
}

impl From<Intent> for String {
    fn from(intent: Intent) -> Self {
        intent.as_str().to_string()
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields of a single event extracted from the utterance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl EventFields {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
            && self.location.is_none()
    }

    /// Insert payload, if every field a new event needs is present
    pub fn to_new_event(&self) -> Option<EventPayload> {
        let summary = self.summary.clone()?;
        let start = self.start.clone().filter(|s| s.instant().is_some())?;
        let end = self.end.clone().filter(|e| e.instant().is_some())?;
        Some(EventPayload {
            summary: Some(summary),
            description: self.description.clone(),
            location: self.location.clone(),
            start: Some(start),
            end: Some(end),
        })
    }
}

/// Time window of a bulk delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteFields {
    pub delete_all: bool,
    #[serde(rename = "timeMin")]
    pub time_min: String,
    #[serde(rename = "timeMax")]
    pub time_max: String,
}

impl BulkDeleteFields {
    pub fn new(time_min: impl Into<String>, time_max: impl Into<String>) -> Self {
        Self {
            delete_all: true,
            time_min: time_min.into(),
            time_max: time_max.into(),
        }
    }
}

/// Payload of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandPayload {
    BulkDelete(BulkDeleteFields),
    Event(EventFields),
}

/// Hints for locating an existing event.
///
/// Kept apart from the payload so nothing in here is ever sent to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "timeMin", default, skip_serializing_if = "Option::is_none")]
    pub time_min: Option<String>,
}

/// Interpretation of one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredCommand {
    pub intent: Intent,
    #[serde(default)]
    pub event: Option<CommandPayload>,
    #[serde(default)]
    pub target: TargetHint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StructuredCommand {
    /// Command carrying an interpretation failure
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            intent: Intent::Error,
            event: None,
            target: TargetHint::default(),
            message: Some(message.into()),
        }
    }

    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            event: None,
            target: TargetHint::default(),
            message: None,
        }
    }

    pub fn with_event(mut self, fields: EventFields) -> Self {
        self.event = Some(CommandPayload::Event(fields));
        self
    }

    pub fn with_bulk_delete(mut self, fields: BulkDeleteFields) -> Self {
        self.event = Some(CommandPayload::BulkDelete(fields));
        self.target = TargetHint::default();
        self
    }

    pub fn with_target(mut self, target: TargetHint) -> Self {
        self.target = target;
        self
    }

    pub fn event_fields(&self) -> Option<&EventFields> {
        match &self.event {
            Some(CommandPayload::Event(fields)) => Some(fields),
            _ => None,
        }
    }

    pub fn bulk_delete(&self) -> Option<&BulkDeleteFields> {
        match &self.event {
            Some(CommandPayload::BulkDelete(fields)) if fields.delete_all => Some(fields),
            _ => None,
        }
    }

    pub fn is_bulk_delete(&self) -> bool {
        self.bulk_delete().is_some()
    }

    /// Title the command matches against, if any
    pub fn summary(&self) -> Option<&str> {
        if self.is_bulk_delete() {
            return None;
        }
        self.target
            .summary
            .as_deref()
            .or_else(|| self.event_fields().and_then(|f| f.summary.as_deref()))
    }
}
