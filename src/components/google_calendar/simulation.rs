use super::models::{CalendarEvent, EventPayload, EventQuery};
use super::provider::CalendarProvider;
use crate::error::AgentResult;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// Stand-in used when no credential is available.
///
/// Nothing is sent anywhere: listings are empty and mutations echo synthetic events.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedCalendar;

impl SimulatedCalendar {
    fn synthetic_id() -> String {
        format!("simulated-{}", Uuid::new_v4())
    }
}

#[async_trait]
impl CalendarProvider for SimulatedCalendar {
    async fn list(&self, _query: &EventQuery) -> AgentResult<Vec<CalendarEvent>> {
        Ok(Vec::new())
    }

    async fn insert(&self, event: &EventPayload) -> AgentResult<CalendarEvent> {
        info!("Simulating insert of {:?}", event.summary);
        Ok(event.clone().into_event(Self::synthetic_id()))
    }

    async fn patch(&self, id: &str, patch: &EventPayload) -> AgentResult<CalendarEvent> {
        info!("Simulating patch of {}", id);
        Ok(patch.clone().into_event(id.to_string()))
    }

    async fn delete(&self, id: &str) -> AgentResult<()> {
        info!("Simulating delete of {}", id);
        Ok(())
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
