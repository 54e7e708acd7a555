#![allow(dead_code)]

use async_trait::async_trait;
use calendar_agent::components::agent::{CalendarAgent, SubstringRanker};
use calendar_agent::components::google_calendar::{
    CalendarEvent, CalendarProvider, EventDateTime, EventPayload, EventQuery, SessionFactory,
};
use calendar_agent::components::llm::LanguageModel;
use calendar_agent::error::{google_calendar_error, llm_error, AgentResult};
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Reference time used by every scenario
pub const NOW: &str = "2025-12-31T09:00:00+01:00";

pub fn now() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(NOW).unwrap()
}

/// Timed event in Vienna local time
pub fn event(id: &str, summary: &str, start: &str, end: &str) -> CalendarEvent {
    CalendarEvent {
        id: id.to_string(),
        summary: Some(summary.to_string()),
        start: EventDateTime::at(start, Some("Europe/Vienna".to_string())),
        end: EventDateTime::at(end, Some("Europe/Vienna".to_string())),
        html_link: Some(format!("https://calendar.google.com/event?eid={}", id)),
        ..Default::default()
    }
}

/// Language model that replays canned replies in order
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<AgentResult<Value>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Value>) -> Arc<Self> {
        let model = Self::default();
        for reply in replies {
            model.push(Ok(reply));
        }
        Arc::new(model)
    }

    /// Model whose next call fails
    pub fn failing(message: &str) -> Arc<Self> {
        let model = Self::default();
        model.push(Err(llm_error(message)));
        Arc::new(model)
    }

    pub fn push(&self, reply: AgentResult<Value>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete_json(&self, _system: &str, user: &str) -> AgentResult<Value> {
        self.prompts.lock().unwrap().push(user.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(llm_error("no scripted reply left")))
    }
}

fn starts_at(event: &CalendarEvent) -> Option<DateTime<FixedOffset>> {
    event
        .start
        .date_time
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
}

/// In-memory calendar that records every call
#[derive(Default)]
pub struct RecordingCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    failing_deletes: Mutex<HashSet<String>>,
    list_failure: Mutex<Option<String>>,
    pub queries: Mutex<Vec<EventQuery>>,
    pub inserted: Mutex<Vec<EventPayload>>,
    pub patched: Mutex<Vec<(String, EventPayload)>>,
    pub delete_attempts: Mutex<Vec<String>>,
}

impl RecordingCalendar {
    pub fn with_events(events: Vec<CalendarEvent>) -> Arc<Self> {
        let calendar = Self::default();
        *calendar.events.lock().unwrap() = events;
        Arc::new(calendar)
    }

    /// Make deleting `id` fail
    pub fn fail_delete(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_string());
    }

    /// Make every listing fail
    pub fn fail_listing(&self, message: &str) {
        *self.list_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn event_ids(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.id.clone()).collect()
    }

    /// Every insert, patch and delete attempt, successful or not
    pub fn mutation_attempts(&self) -> usize {
        self.inserted.lock().unwrap().len()
            + self.patched.lock().unwrap().len()
            + self.delete_attempts.lock().unwrap().len()
    }

    pub fn list_calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl CalendarProvider for RecordingCalendar {
    async fn list(&self, query: &EventQuery) -> AgentResult<Vec<CalendarEvent>> {
        self.queries.lock().unwrap().push(query.clone());
        if let Some(message) = self.list_failure.lock().unwrap().clone() {
            return Err(google_calendar_error(&message));
        }

        let min = DateTime::parse_from_rfc3339(&query.time_min).ok();
        let max = query
            .time_max
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

        let mut events: Vec<CalendarEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                let start = starts_at(e);
                min.map_or(true, |min| start.is_some_and(|s| s >= min))
                    && max.map_or(true, |max| start.is_some_and(|s| s <= max))
            })
            .cloned()
            .collect();
        events.sort_by_key(starts_at);
        events.truncate(query.max_results as usize);
        Ok(events)
    }

    async fn insert(&self, payload: &EventPayload) -> AgentResult<CalendarEvent> {
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(payload.clone());
        let mut event = payload.clone().into_event(format!("new-{}", inserted.len()));
        event.html_link = Some(format!("https://calendar.google.com/event?eid={}", event.id));
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn patch(&self, id: &str, patch: &EventPayload) -> AgentResult<CalendarEvent> {
        self.patched.lock().unwrap().push((id.to_string(), patch.clone()));
        let mut events = self.events.lock().unwrap();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| google_calendar_error("Not Found"))?;
        if let Some(summary) = &patch.summary {
            event.summary = Some(summary.clone());
        }
        if let Some(location) = &patch.location {
            event.location = Some(location.clone());
        }
        if let Some(description) = &patch.description {
            event.description = Some(description.clone());
        }
        if let Some(start) = &patch.start {
            event.start = start.clone();
        }
        if let Some(end) = &patch.end {
            event.end = end.clone();
        }
        Ok(event.clone())
    }

    async fn delete(&self, id: &str) -> AgentResult<()> {
        self.delete_attempts.lock().unwrap().push(id.to_string());
        if self.failing_deletes.lock().unwrap().contains(id) {
            return Err(google_calendar_error("Backend Error"));
        }
        self.events.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }
}

/// Session factory that always hands out the same calendar
pub struct FixedSessions {
    calendar: Arc<RecordingCalendar>,
    pub tokens: Mutex<Vec<Option<String>>>,
}

impl FixedSessions {
    pub fn new(calendar: Arc<RecordingCalendar>) -> Arc<Self> {
        Arc::new(Self {
            calendar,
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionFactory for FixedSessions {
    async fn open(&self, auth_token: Option<&str>) -> AgentResult<Arc<dyn CalendarProvider>> {
        self.tokens
            .lock()
            .unwrap()
            .push(auth_token.map(str::to_string));
        let calendar: Arc<dyn CalendarProvider> = self.calendar.clone();
        Ok(calendar)
    }
}

/// Agent over scripted collaborators with the deterministic ranker
pub fn agent(model: Arc<ScriptedModel>, calendar: Arc<RecordingCalendar>) -> (CalendarAgent, Arc<FixedSessions>) {
    let sessions = FixedSessions::new(calendar);
    let agent = CalendarAgent::new(
        model,
        Arc::new(SubstringRanker),
        sessions.clone(),
        chrono_tz::Europe::Vienna,
        "de",
    );
    (agent, sessions)
}
