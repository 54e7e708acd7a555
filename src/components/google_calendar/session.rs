use super::client::{CredentialSource, GoogleCalendarClient};
use super::provider::CalendarProvider;
use super::simulation::SimulatedCalendar;
use super::token::TokenManager;
use crate::config::Config;
use crate::error::{credential_error, AgentResult};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the calendar session used by exactly one request
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a session; a per-call token overrides the stored credential for this call only
    async fn open(&self, auth_token: Option<&str>) -> AgentResult<Arc<dyn CalendarProvider>>;
}

/// Reject tokens that cannot be sent as a bearer header
pub fn validate_bearer(token: &str) -> AgentResult<&str> {
    let token = token.trim();
    if token.chars().all(|c| c.is_ascii_graphic()) {
        Ok(token)
    } else {
        Err(credential_error("Token contains characters not allowed in a bearer header"))
    }
}

/// Session factory for Google Calendar with simulation fallback
pub struct GoogleSessionFactory {
    config: Arc<Config>,
    client: Client,
    tokens: TokenManager,
}

impl GoogleSessionFactory {
    pub fn new(config: Arc<Config>, client: Client) -> Self {
        let tokens = TokenManager::new(Arc::clone(&config), client.clone());
        Self {
            config,
            client,
            tokens,
        }
    }

    fn client_for(&self, token: &str, source: CredentialSource) -> AgentResult<Arc<dyn CalendarProvider>> {
        let client = GoogleCalendarClient::new(
            self.client.clone(),
            self.config.google_calendar_id.clone(),
            token,
            source,
        )?
        .with_base_url(&self.config.google_api_base_url)?;
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl SessionFactory for GoogleSessionFactory {
    async fn open(&self, auth_token: Option<&str>) -> AgentResult<Arc<dyn CalendarProvider>> {
        // An empty per-call token counts as absent
        if let Some(token) = auth_token.filter(|t| !t.trim().is_empty()) {
            let token = validate_bearer(token)?;
            info!("Using per-call token for Google Calendar");
            return self.client_for(token, CredentialSource::PerCall);
        }

        match self.tokens.get_access_token().await? {
            Some(token) => self.client_for(&token, CredentialSource::Stored),
            None => {
                warn!("No Google credential available, calendar actions will be simulated");
                Ok(Arc::new(SimulatedCalendar))
            }
        }
    }
}
