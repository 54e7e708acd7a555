use crate::components::google_calendar::CALENDAR_API_BASE;
use crate::error::{config_error, env_error, AgentResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default OpenAI-compatible endpoint (a local Ollama instance)
pub const DEFAULT_LLM_BASE_URL: &str = "http://localhost:11434/v1";
/// Default chat model
pub const DEFAULT_LLM_MODEL: &str = "llama3.2";
/// Default timezone used for prompts and naive timestamps
pub const DEFAULT_TIMEZONE: &str = "Europe/Vienna";
/// Default location of the optional override file
pub const OVERRIDES_PATH: &str = "config/agent.toml";

/// Main configuration structure for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the OpenAI-compatible chat completion API
    pub llm_base_url: String,
    /// Model name sent with every completion request
    pub llm_model: String,
    /// API key for the completion endpoint
    pub llm_api_key: String,
    /// Google OAuth client ID, only needed for refreshing the stored token
    pub google_client_id: Option<String>,
    /// Google OAuth client secret, only needed for refreshing the stored token
    pub google_client_secret: Option<String>,
    /// Calendar all operations run against
    pub google_calendar_id: String,
    /// Root of the Google Calendar REST API
    pub google_api_base_url: String,
    /// Path of the stored process-wide credential
    pub token_path: String,
    /// IANA timezone name
    pub timezone: String,
    /// Locale for user-facing messages
    pub locale: String,
    /// Interface the HTTP server binds to
    pub host: String,
    /// Port the HTTP server listens on
    pub port: u16,
    /// Upper bound for one `process` call
    pub request_timeout_secs: u64,
}

/// Partial configuration read from the override file
#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    llm_base_url: Option<String>,
    llm_model: Option<String>,
    google_calendar_id: Option<String>,
    google_api_base_url: Option<String>,
    token_path: Option<String>,
    timezone: Option<String>,
    locale: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: "ollama".to_string(),
            google_client_id: None,
            google_client_secret: None,
            google_calendar_id: "primary".to_string(),
            google_api_base_url: CALENDAR_API_BASE.to_string(),
            token_path: "token.json".to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
            locale: "de".to_string(),
            host: "0.0.0.0".to_string(),
            port: 9000,
            request_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AgentResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let mut config = Config::default();

        if let Ok(value) = env::var("LLM_BASE_URL") {
            config.llm_base_url = value;
        }
        if let Ok(value) = env::var("LLM_MODEL") {
            config.llm_model = value;
        }
        if let Ok(value) = env::var("LLM_API_KEY") {
            config.llm_api_key = value;
        }
        config.google_client_id = env::var("GOOGLE_CLIENT_ID").ok().filter(|v| !v.is_empty());
        config.google_client_secret = env::var("GOOGLE_CLIENT_SECRET").ok().filter(|v| !v.is_empty());
        if let Ok(value) = env::var("GOOGLE_CALENDAR_ID") {
            config.google_calendar_id = value;
        }
        if let Ok(value) = env::var("GOOGLE_API_BASE_URL") {
            config.google_api_base_url = value;
        }
        if let Ok(value) = env::var("GOOGLE_TOKEN_PATH") {
            config.token_path = value;
        }
        if let Ok(value) = env::var("TIMEZONE") {
            config.timezone = value;
        }
        if let Ok(value) = env::var("BOT_LOCALE") {
            config.locale = value;
        }
        if let Ok(value) = env::var("HOST") {
            config.host = value;
        }
        if let Ok(value) = env::var("PORT") {
            config.port = value
                .parse::<u16>()
                .map_err(|_| env_error("Invalid PORT format"))?;
        }
        if let Ok(value) = env::var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = value
                .parse::<u64>()
                .map_err(|_| env_error("Invalid REQUEST_TIMEOUT_SECS format"))?;
        }

        // Overrides from file win over the environment
        if Path::new(OVERRIDES_PATH).exists() {
            let content = fs::read_to_string(OVERRIDES_PATH)?;
            config.apply_overrides(&content)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply a TOML override document on top of the current values
    pub fn apply_overrides(&mut self, content: &str) -> AgentResult<()> {
        let overrides: ConfigOverrides = toml::from_str(content)?;

        if let Some(value) = overrides.llm_base_url {
            self.llm_base_url = value;
        }
        if let Some(value) = overrides.llm_model {
            self.llm_model = value;
        }
        if let Some(value) = overrides.google_calendar_id {
            self.google_calendar_id = value;
        }
        if let Some(value) = overrides.google_api_base_url {
            self.google_api_base_url = value;
        }
        if let Some(value) = overrides.token_path {
            self.token_path = value;
        }
        if let Some(value) = overrides.timezone {
            self.timezone = value;
        }
        if let Some(value) = overrides.locale {
            self.locale = value;
        }
        if let Some(value) = overrides.host {
            self.host = value;
        }
        if let Some(value) = overrides.port {
            self.port = value;
        }
        if let Some(value) = overrides.request_timeout_secs {
            self.request_timeout_secs = value;
        }
        Ok(())
    }

    /// Check values that cannot be verified while parsing
    pub fn validate(&self) -> AgentResult<()> {
        self.tz()?;
        if self.request_timeout_secs == 0 {
            return Err(config_error("request_timeout_secs must be greater than zero"));
        }
        if self.llm_base_url.trim().is_empty() {
            return Err(config_error("llm_base_url must not be empty"));
        }
        if url::Url::parse(&self.google_api_base_url).is_err() {
            return Err(config_error(&format!(
                "Invalid google_api_base_url: {}",
                self.google_api_base_url
            )));
        }
        Ok(())
    }

    /// Parsed timezone
    pub fn tz(&self) -> AgentResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| config_error(&format!("Unknown timezone: {}", self.timezone)))
    }

    /// Timeout applied around a whole `process` call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
