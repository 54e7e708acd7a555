use super::LanguageModel;
use crate::config::Config;
use crate::error::{llm_error, AgentResult};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat completion client for any OpenAI-compatible server (OpenAI, Ollama, vLLM)
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature: 0.1,
        }
    }

    /// Client configured from the agent configuration
    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(client, &config.llm_base_url, &config.llm_model, &config.llm_api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Parse the model reply, which must be a bare JSON object
pub fn parse_json_object(content: &str) -> AgentResult<Value> {
    let value: Value = serde_json::from_str(content.trim()).map_err(|e| {
        error!("Model reply is not valid JSON: {}", content);
        llm_error(&format!("Model reply is not valid JSON: {}", e))
    })?;

    if !value.is_object() {
        return Err(llm_error("Model reply is not a JSON object"));
    }
    Ok(value)
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn complete_json(&self, system: &str, user: &str) -> AgentResult<Value> {
        info!("Asking language model ({})", self.model);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| llm_error(&format!("Failed to reach language model: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| llm_error(&format!("Failed to read language model response: {}", e)))?;

        if !status.is_success() {
            error!("Language model returned HTTP {}: {}", status, text);
            return Err(llm_error(&format!("Request failed with status {}", status)));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| llm_error(&format!("Failed to parse completion: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| llm_error("No response from language model"))?;
        debug!("Model reply: {}", content);

        parse_json_object(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = OpenAiCompatibleClient::new(Client::new(), "http://localhost:11434/v1/", "llama3.2", "ollama");
        assert_eq!(client.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_parse_json_object() {
        let value = parse_json_object(" {\"intent\": \"list_events\"}\n").unwrap();
        assert_eq!(value["intent"], "list_events");

        // Prose around the object is rejected
        assert!(parse_json_object("Sure! {\"intent\": \"list_events\"}").is_err());
        assert!(parse_json_object("[1, 2]").is_err());
        assert!(parse_json_object("").is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "llama3.2",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.1,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
