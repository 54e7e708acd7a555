use super::command::{BulkDeleteFields, EventFields, Intent, StructuredCommand, TargetHint};
use crate::components::google_calendar::EventDateTime;
use crate::components::llm::LanguageModel;
use crate::utils::time::{normalize_rfc3339, parse_timestamp, shift_timestamp};
use chrono::{DateTime, Duration, FixedOffset};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str = "You are a helpful calendar assistant that outputs JSON.";

const USER_PROMPT_TEMPLATE: &str = r#"You are a smart calendar assistant.
Current time: {now}
Time zone: {timezone}

User input (speech transcript, may contain recognition errors): "{utterance}"

Your task:
1. Correct obvious transcription errors using the context of a calendar command.
2. Identify the intent: 'create_event', 'delete_event', 'update_event', 'list_events' or 'unknown'.
3. Extract the event details: summary, start, end (ISO 8601), description, location.
   Resolve relative dates like "heute", "morgen" or "next Friday" against the current time.
4. If no duration is given, the event lasts 1 hour.
5. For delete_event and update_event, describe the existing event in "target":
   its title or part of it in "summary", and the earliest time it can start in "timeMin".
   For update_event, "event" only holds the fields that change.
6. If the user wants to delete ALL events of a period ("lösche alle Termine heute",
   "clear my schedule tomorrow"), do not set a summary or target. Instead set
   "event": {"delete_all": true, "timeMin": "<start of period>", "timeMax": "<end of period>"}.
7. Return ONLY valid JSON. No markdown, no explanation.

Example for creating an event:
{
    "intent": "create_event",
    "event": {
        "summary": "Meeting with Tom",
        "start": { "dateTime": "2025-11-26T14:00:00", "timeZone": "{timezone}" },
        "end": { "dateTime": "2025-11-26T15:00:00", "timeZone": "{timezone}" },
        "description": "Discuss project status"
    }
}

Example for moving an event:
{
    "intent": "update_event",
    "target": { "summary": "Zahnarzt", "timeMin": "2025-11-26T00:00:00" },
    "event": {
        "start": { "dateTime": "2025-11-27T10:00:00", "timeZone": "{timezone}" }
    }
}

Example for deleting all events of a day:
{
    "intent": "delete_event",
    "event": { "delete_all": true, "timeMin": "2025-12-31T00:00:00", "timeMax": "2025-12-31T23:59:59" }
}"#;

/// Start or end as the model wrote it: the API object or a bare timestamp
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDateTime {
    Object(EventDateTime),
    Text(String),
}

impl RawDateTime {
    fn into_event_time(self, tz: &Tz) -> Option<EventDateTime> {
        let value = match self {
            RawDateTime::Object(value) => value,
            RawDateTime::Text(text) => EventDateTime::at(text, Some(tz.name().to_string())),
        };
        let has_instant = value.instant().is_some_and(|s| !s.trim().is_empty());
        has_instant.then_some(value)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    summary: Option<String>,
    start: Option<RawDateTime>,
    end: Option<RawDateTime>,
    description: Option<String>,
    location: Option<String>,
    #[serde(default)]
    delete_all: bool,
    #[serde(rename = "timeMin", alias = "time_min")]
    time_min: Option<String>,
    #[serde(rename = "timeMax", alias = "time_max")]
    time_max: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTarget {
    summary: Option<String>,
    #[serde(rename = "timeMin", alias = "time_min")]
    time_min: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInterpretation {
    intent: Option<String>,
    event: Option<RawEvent>,
    target: Option<RawTarget>,
    message: Option<String>,
}

/// Blank strings count as missing
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Turns utterances into structured commands through the language model
pub struct Interpreter {
    model: Arc<dyn LanguageModel>,
    tz: Tz,
}

impl Interpreter {
    pub fn new(model: Arc<dyn LanguageModel>, tz: Tz) -> Self {
        Self { model, tz }
    }

    fn build_prompt(&self, utterance: &str, now: &DateTime<FixedOffset>) -> String {
        USER_PROMPT_TEMPLATE
            .replace("{now}", &now.to_rfc3339())
            .replace("{timezone}", self.tz.name())
            .replace("{utterance}", utterance.trim())
    }

    /// Interpret one utterance. Never fails: every problem becomes an `error` command.
    pub async fn interpret(&self, utterance: &str, now: &DateTime<FixedOffset>) -> StructuredCommand {
        if utterance.trim().is_empty() {
            return StructuredCommand::new(Intent::Unknown);
        }

        info!("Interpreting: {}", utterance);
        let prompt = self.build_prompt(utterance, now);

        match self.model.complete_json(SYSTEM_PROMPT, &prompt).await {
            Ok(value) => {
                debug!("Raw interpretation: {}", value);
                normalize(value, &self.tz)
            }
            Err(e) => {
                warn!("Interpretation failed: {}", e);
                StructuredCommand::error(e.to_string())
            }
        }
    }
}

/// Validate and normalize the model's raw reply
pub fn normalize(value: Value, tz: &Tz) -> StructuredCommand {
    let raw: RawInterpretation = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => return StructuredCommand::error(format!("Unusable interpretation: {}", e)),
    };

    let Some(intent) = non_blank(raw.intent).map(Intent::from) else {
        return StructuredCommand::error("Interpretation has no intent");
    };

    let message = non_blank(raw.message);
    if intent == Intent::Error {
        return StructuredCommand::error(
            message.unwrap_or_else(|| "The language model reported an error".to_string()),
        );
    }

    let event = raw.event.unwrap_or_default();
    if event.delete_all {
        return bulk_delete(intent, event, tz);
    }

    let mut target = raw.target.unwrap_or_default();
    let mut target_summary = non_blank(target.summary.take());
    let mut summary = non_blank(event.summary);

    // Models sometimes put the match title into the event itself
    if target_summary.is_none() {
        match intent {
            Intent::DeleteEvent => target_summary = summary.clone(),
            Intent::UpdateEvent => target_summary = summary.take(),
            _ => {}
        }
    }

    let time_min = non_blank(target.time_min.take()).or_else(|| non_blank(event.time_min));
    let time_min = time_min.and_then(|value| {
        let normalized = normalize_rfc3339(&value, tz);
        if normalized.is_none() {
            warn!("Ignoring unparsable timeMin hint: {}", value);
        }
        normalized
    });

    let start = event.start.and_then(|s| s.into_event_time(tz));
    let mut end = event.end.and_then(|e| e.into_event_time(tz));
    // A moved event keeps its own length, which only the executor knows
    if end.is_none() && intent != Intent::UpdateEvent {
        end = start.as_ref().and_then(default_end);
    }

    let fields = EventFields {
        summary,
        start,
        end,
        description: non_blank(event.description),
        location: non_blank(event.location),
    };

    let mut command = StructuredCommand::new(intent).with_target(TargetHint {
        summary: target_summary,
        time_min,
    });
    if !fields.is_empty() {
        command = command.with_event(fields);
    }
    command.message = message;
    command
}

/// One hour after a timed start, keeping its format and zone
fn default_end(start: &EventDateTime) -> Option<EventDateTime> {
    let date_time = start.date_time.as_deref()?;
    let end = shift_timestamp(date_time, Duration::hours(1))?;
    Some(EventDateTime::at(end, start.time_zone.clone()))
}

fn bulk_delete(intent: Intent, event: RawEvent, tz: &Tz) -> StructuredCommand {
    if intent != Intent::DeleteEvent {
        return StructuredCommand::error(format!("delete_all is only valid for delete_event, got {}", intent));
    }

    let bound = |value: Option<String>, name: &str| -> Result<DateTime<FixedOffset>, String> {
        let value = non_blank(value).ok_or_else(|| format!("delete_all without {}", name))?;
        parse_timestamp(&value, tz).ok_or_else(|| format!("Unparsable {}: {}", name, value))
    };

    let (time_min, time_max) = match (bound(event.time_min, "timeMin"), bound(event.time_max, "timeMax")) {
        (Ok(min), Ok(max)) => (min, max),
        (Err(e), _) | (_, Err(e)) => return StructuredCommand::error(e),
    };

    if time_min > time_max {
        return StructuredCommand::error(format!(
            "delete_all window ends before it starts: {} > {}",
            time_min.to_rfc3339(),
            time_max.to_rfc3339()
        ));
    }

    StructuredCommand::new(intent).with_bulk_delete(BulkDeleteFields::new(
        time_min.to_rfc3339(),
        time_max.to_rfc3339(),
    ))
}
