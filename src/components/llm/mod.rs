mod client;

pub use client::{parse_json_object, OpenAiCompatibleClient};

use crate::error::AgentResult;
use async_trait::async_trait;
use serde_json::Value;

/// Chat completion in forced JSON mode
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a system and user prompt pair and return the reply as a JSON object
    async fn complete_json(&self, system: &str, user: &str) -> AgentResult<Value>;
}
