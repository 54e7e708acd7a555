use super::command::{Intent, StructuredCommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
    ConfirmationRequired,
}

/// The only thing a caller gets back from the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    /// The command awaiting confirmation; re-submit it unchanged to execute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<StructuredCommand>,
}

impl ExecutionResult {
    fn with_status(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            count: None,
            intent: None,
            command: None,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_status(Status::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(Status::Error, message)
    }

    pub fn confirmation(message: impl Into<String>) -> Self {
        Self::with_status(Status::ConfirmationRequired, message)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_command(mut self, command: StructuredCommand) -> Self {
        self.command = Some(command);
        self
    }
}
