use miette::Diagnostic;
use thiserror::Error;

/// Main error type for the agent
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Environment error: {0}")]
    #[diagnostic(code(calendar_agent::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(calendar_agent::config))]
    Config(String),

    #[error("Language model error: {0}")]
    #[diagnostic(code(calendar_agent::language_model))]
    LanguageModel(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(calendar_agent::google_calendar))]
    GoogleCalendar(String),

    #[error("Invalid calendar credential: {0}")]
    #[diagnostic(
        code(calendar_agent::invalid_credential),
        help("The caller must sign in to Google again and resend the command")
    )]
    InvalidCredential(String),

    #[error(transparent)]
    #[diagnostic(code(calendar_agent::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(calendar_agent::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(calendar_agent::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AgentResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Missing environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create language model errors
pub fn llm_error(message: &str) -> Error {
    Error::LanguageModel(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create credential errors
pub fn credential_error(message: &str) -> Error {
    Error::InvalidCredential(message.to_string())
}
