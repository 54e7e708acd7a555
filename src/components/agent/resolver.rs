use crate::components::google_calendar::time::event_start;
use crate::components::google_calendar::{CalendarEvent, CalendarProvider, EventQuery};
use crate::components::llm::LanguageModel;
use crate::error::AgentResult;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of upcoming events a reference is matched against
pub const CANDIDATE_WINDOW: u32 = 20;

/// An event as presented to a ranker
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub start: String,
    #[serde(skip)]
    pub starts_at: Option<DateTime<FixedOffset>>,
}

impl Candidate {
    pub fn from_event(event: &CalendarEvent, tz: &Tz) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title().to_string(),
            start: event.start.instant().unwrap_or_default().to_string(),
            starts_at: event_start(event, tz),
        }
    }
}

/// Picks the candidate a criterion refers to
#[async_trait]
pub trait Ranker: Send + Sync {
    /// Id of the best match, or `None`. An empty criterion asks for the next upcoming event.
    async fn rank(&self, candidates: &[Candidate], criterion: &str) -> AgentResult<Option<String>>;
}

const RANKER_SYSTEM_PROMPT: &str = "You match calendar references to events and output JSON.";

const RANKER_PROMPT_TEMPLATE: &str = r#"Here is a list of upcoming calendar events:
{candidates}

The user refers to: {criterion}

Return the id of the single event that best matches as {"id": "<id>"}.
If no event matches, return {"id": null}.
Return ONLY valid JSON."#;

/// Ranker backed by the language model
pub struct LanguageModelRanker {
    model: Arc<dyn LanguageModel>,
}

impl LanguageModelRanker {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn build_prompt(candidates: &[Candidate], criterion: &str) -> String {
        let list = candidates
            .iter()
            .map(|c| format!("- id: {} | title: {} | start: {}", c.id, c.title, c.start))
            .collect::<Vec<_>>()
            .join("\n");
        let criterion = if criterion.trim().is_empty() {
            "(nothing specific: choose the next upcoming event)"
        } else {
            criterion.trim()
        };
        RANKER_PROMPT_TEMPLATE
            .replace("{candidates}", &list)
            .replace("{criterion}", criterion)
    }
}

#[async_trait]
impl Ranker for LanguageModelRanker {
    async fn rank(&self, candidates: &[Candidate], criterion: &str) -> AgentResult<Option<String>> {
        let prompt = Self::build_prompt(candidates, criterion);
        let reply = self.model.complete_json(RANKER_SYSTEM_PROMPT, &prompt).await?;
        Ok(reply
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string))
    }
}

/// Deterministic ranker: case-insensitive title substring, or the earliest start
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringRanker;

#[async_trait]
impl Ranker for SubstringRanker {
    async fn rank(&self, candidates: &[Candidate], criterion: &str) -> AgentResult<Option<String>> {
        let criterion = criterion.trim().to_lowercase();
        if criterion.is_empty() {
            return Ok(candidates
                .iter()
                .min_by_key(|c| (c.starts_at.is_none(), c.starts_at))
                .map(|c| c.id.clone()));
        }
        Ok(candidates
            .iter()
            .find(|c| c.title.to_lowercase().contains(&criterion))
            .map(|c| c.id.clone()))
    }
}

/// Finds the single existing event a command refers to
pub struct EventResolver {
    ranker: Arc<dyn Ranker>,
    tz: Tz,
}

impl EventResolver {
    pub fn new(ranker: Arc<dyn Ranker>, tz: Tz) -> Self {
        Self { ranker, tz }
    }

    /// Resolve a reference. `Ok(None)` means nothing matched; provider failures are errors.
    pub async fn resolve(
        &self,
        provider: &dyn CalendarProvider,
        summary_fragment: Option<&str>,
        time_min: Option<&str>,
        now: &DateTime<FixedOffset>,
    ) -> AgentResult<Option<CalendarEvent>> {
        let time_min = time_min
            .map(str::to_string)
            .unwrap_or_else(|| now.to_rfc3339());
        let events = provider
            .list(&EventQuery::upcoming(time_min, CANDIDATE_WINDOW))
            .await?;

        if events.is_empty() {
            info!("No candidate events to resolve against");
            return Ok(None);
        }

        let candidates: Vec<Candidate> = events
            .iter()
            .map(|e| Candidate::from_event(e, &self.tz))
            .collect();
        let criterion = summary_fragment.unwrap_or_default();
        let chosen = self.ranker.rank(&candidates, criterion).await?;
        debug!("Ranker chose {:?} for '{}'", chosen, criterion);

        let Some(id) = chosen else {
            return Ok(None);
        };

        // Only ids from the fetched window are trusted
        let event = events.into_iter().find(|e| e.id == id);
        if event.is_none() {
            warn!("Ranker returned an id outside the candidate window: {}", id);
        }
        Ok(event)
    }
}
