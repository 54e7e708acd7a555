//! Natural-language calendar agent.
//!
//! One call runs the whole pipeline: the utterance is interpreted into a
//! [`StructuredCommand`], a calendar session is opened for the caller and the
//! command is previewed or executed against it. Mutations only happen when the
//! caller explicitly asks for execution; a dry run stops at
//! [`Status::ConfirmationRequired`] and the caller re-submits to proceed.

mod command;
mod executor;
mod interpreter;
mod resolver;
mod result;

pub use command::{BulkDeleteFields, CommandPayload, EventFields, Intent, StructuredCommand, TargetHint};
pub use executor::{merge_update, CommandExecutor, ExecutionMode, ExecutionState, BULK_DELETE_LIMIT, LIST_LIMIT};
pub use interpreter::{normalize, Interpreter};
pub use resolver::{Candidate, EventResolver, LanguageModelRanker, Ranker, SubstringRanker, CANDIDATE_WINDOW};
pub use result::{ExecutionResult, Status};

use crate::components::google_calendar::{GoogleSessionFactory, SessionFactory};
use crate::components::llm::{LanguageModel, OpenAiCompatibleClient};
use crate::config::Config;
use crate::error::AgentResult;
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn};

/// Entry point of the agent; cheap to share between requests
pub struct CalendarAgent {
    interpreter: Interpreter,
    executor: CommandExecutor,
    sessions: Arc<dyn SessionFactory>,
    tz: Tz,
    locale: String,
}

impl CalendarAgent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        ranker: Arc<dyn Ranker>,
        sessions: Arc<dyn SessionFactory>,
        tz: Tz,
        locale: &str,
    ) -> Self {
        Self {
            interpreter: Interpreter::new(model, tz),
            executor: CommandExecutor::new(EventResolver::new(ranker, tz), tz, locale),
            sessions,
            tz,
            locale: locale.to_string(),
        }
    }

    /// Agent wired to the configured language model and Google Calendar
    pub fn from_config(config: Arc<Config>, client: Client) -> AgentResult<Self> {
        let tz = config.tz()?;
        let model: Arc<dyn LanguageModel> =
            Arc::new(OpenAiCompatibleClient::from_config(client.clone(), &config));
        let ranker = Arc::new(LanguageModelRanker::new(Arc::clone(&model)));
        let locale = config.locale.clone();
        let sessions = Arc::new(GoogleSessionFactory::new(config, client));
        Ok(Self::new(model, ranker, sessions, tz, &locale))
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// Current time in the agent's zone
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz).fixed_offset()
    }

    /// Interpret and run one utterance
    pub async fn process(&self, text: &str, auth_token: Option<&str>, dry_run: bool) -> ExecutionResult {
        self.process_at(text, auth_token, dry_run, self.now()).await
    }

    /// Like [`CalendarAgent::process`] with a caller-supplied current time
    pub async fn process_at(
        &self,
        text: &str,
        auth_token: Option<&str>,
        dry_run: bool,
        now: DateTime<FixedOffset>,
    ) -> ExecutionResult {
        let command = self.interpreter.interpret(text, &now).await;
        info!("Interpreted as {}", command.intent);
        self.execute_command(&command, auth_token, dry_run, now).await
    }

    /// Interpretation only, for callers that confirm before executing
    pub async fn interpret(&self, text: &str, now: &DateTime<FixedOffset>) -> StructuredCommand {
        self.interpreter.interpret(text, now).await
    }

    /// Run an already interpreted command, e.g. one re-submitted after confirmation
    pub async fn execute_command(
        &self,
        command: &StructuredCommand,
        auth_token: Option<&str>,
        dry_run: bool,
        now: DateTime<FixedOffset>,
    ) -> ExecutionResult {
        // Failed interpretations never reach the executor
        if command.intent == Intent::Error {
            let detail = command.message.clone().unwrap_or_default();
            return ExecutionResult::error(t!(
                "interpretation_error",
                locale = self.locale.as_str(),
                error = detail
            ))
            .with_intent(Intent::Error);
        }

        // Nothing to do on a calendar, so no credential is checked or refreshed
        if !command.intent.needs_calendar() {
            return self.executor.refuse(command);
        }

        let session = match self.sessions.open(auth_token).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not open calendar session: {}", e);
                return self.executor.error_result(&e).with_intent(command.intent.clone());
            }
        };

        let result = self
            .executor
            .execute(command, session.as_ref(), ExecutionMode::from_dry_run(dry_run), &now)
            .await;
        if result.status == Status::ConfirmationRequired {
            return result.with_command(command.clone());
        }
        result
    }

    /// Result returned when the whole call ran out of time
    pub fn timeout_result(&self) -> ExecutionResult {
        ExecutionResult::error(t!("timeout", locale = self.locale.as_str()))
    }
}
