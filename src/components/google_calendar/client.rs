use super::models::{CalendarEvent, EventPayload, EventQuery};
use super::provider::CalendarProvider;
use crate::error::{credential_error, google_calendar_error, AgentResult};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

/// Google Calendar v3 REST endpoint
pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

/// Where the bearer token of a client came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Supplied by the caller for a single request
    PerCall,
    /// The process-wide stored credential
    Stored,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<CalendarEvent>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Calendar provider backed by the Google Calendar REST API
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    client: Client,
    base_url: Url,
    calendar_id: String,
    access_token: String,
    source: CredentialSource,
}

impl GoogleCalendarClient {
    /// Create a client for one calendar and one bearer token
    pub fn new(
        client: Client,
        calendar_id: impl Into<String>,
        access_token: impl Into<String>,
        source: CredentialSource,
    ) -> AgentResult<Self> {
        Ok(Self {
            client,
            base_url: parse_base_url(CALENDAR_API_BASE)?,
            calendar_id: calendar_id.into(),
            access_token: access_token.into(),
            source,
        })
    }

    /// Send requests to another Calendar API root
    pub fn with_base_url(mut self, base_url: &str) -> AgentResult<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    fn list_url(&self, query: &EventQuery, page_token: Option<&str>) -> AgentResult<Url> {
        let mut url = self.events_url(None)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("timeMin", &query.time_min);
            if let Some(time_max) = &query.time_max {
                pairs.append_pair("timeMax", time_max);
            }
            pairs.append_pair("maxResults", &query.max_results.to_string());
            pairs.append_pair("singleEvents", "true");
            pairs.append_pair("orderBy", query.order_by.as_str());
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    /// URL of the events collection, or of one event when `event_id` is set
    fn events_url(&self, event_id: Option<&str>) -> AgentResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| google_calendar_error("Calendar API base URL cannot be a base"))?;
            segments.pop_if_empty();
            segments.extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(id) = event_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.access_token))
    }

    /// Turn a non-success response into the matching error
    async fn check(&self, response: Response, action: &str) -> AgentResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Could not read error response".to_string());
        error!("Calendar API {} failed: HTTP {} - {}", action, status, error_body);

        let rejected = status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN;
        if rejected && self.source == CredentialSource::PerCall {
            return Err(credential_error(&format!(
                "Google rejected the supplied token (HTTP {})",
                status
            )));
        }

        Err(google_calendar_error(&format!(
            "Failed to {}: HTTP {} - {}",
            action, status, error_body
        )))
    }
}

fn parse_base_url(base_url: &str) -> AgentResult<Url> {
    Url::parse(base_url).map_err(|e| google_calendar_error(&format!("Failed to parse URL {}: {}", base_url, e)))
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn list(&self, query: &EventQuery) -> AgentResult<Vec<CalendarEvent>> {
        let limit = query.max_results as usize;
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        // The API may split a window over several pages even below maxResults
        loop {
            let url = self.list_url(query, page_token.as_deref())?;
            debug!("Listing events: {}", url);

            let response = self
                .authorized(self.client.get(url))
                .send()
                .await
                .map_err(|e| google_calendar_error(&format!("Failed to fetch events: {}", e)))?;
            let response = self.check(response, "fetch events").await?;

            let body: EventsListResponse = response
                .json()
                .await
                .map_err(|e| google_calendar_error(&format!("Failed to parse events response: {}", e)))?;
            events.extend(body.items);

            match body.next_page_token {
                Some(token) if events.len() < limit => page_token = Some(token),
                _ => break,
            }
        }

        events.truncate(limit);
        Ok(events)
    }

    async fn insert(&self, event: &EventPayload) -> AgentResult<CalendarEvent> {
        let url = self.events_url(None)?;
        let response = self
            .authorized(self.client.post(url))
            .json(event)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to create event: {}", e)))?;
        let response = self.check(response, "create event").await?;

        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse created event: {}", e)))
    }

    async fn patch(&self, id: &str, patch: &EventPayload) -> AgentResult<CalendarEvent> {
        let url = self.events_url(Some(id))?;
        let response = self
            .authorized(self.client.patch(url))
            .json(patch)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to update event: {}", e)))?;
        let response = self.check(response, "update event").await?;

        response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse updated event: {}", e)))
    }

    async fn delete(&self, id: &str) -> AgentResult<()> {
        let url = self.events_url(Some(id))?;
        let response = self
            .authorized(self.client.delete(url))
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to delete event: {}", e)))?;
        self.check(response, "delete event").await?;
        Ok(())
    }
}
