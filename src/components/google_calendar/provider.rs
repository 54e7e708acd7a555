use super::models::{CalendarEvent, EventPayload, EventQuery};
use crate::error::AgentResult;
use async_trait::async_trait;

/// Operations the agent needs from a calendar backend.
///
/// Every call targets the single calendar the implementation was built for.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// List events matching the query
    async fn list(&self, query: &EventQuery) -> AgentResult<Vec<CalendarEvent>>;

    /// Create an event
    async fn insert(&self, event: &EventPayload) -> AgentResult<CalendarEvent>;

    /// Apply a partial update to an existing event
    async fn patch(&self, id: &str, patch: &EventPayload) -> AgentResult<CalendarEvent>;

    /// Delete an event
    async fn delete(&self, id: &str) -> AgentResult<()>;

    /// True when no real backend stands behind this provider
    fn is_simulated(&self) -> bool {
        false
    }
}
