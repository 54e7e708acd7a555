use super::AppState;
use crate::components::agent::{ExecutionResult, StructuredCommand};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ProcessCommandRequest {
    #[serde(default)]
    pub text: String,
    /// Previously interpreted command; skips interpretation when set
    #[serde(default)]
    pub command: Option<StructuredCommand>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
}

/// Bearer token from the Authorization header, if any
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Health check handler
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "model": state.model }))
}

/// Run one command through the agent
pub async fn process_command_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ProcessCommandRequest>,
) -> Json<ExecutionResult> {
    let ProcessCommandRequest {
        text,
        command,
        auth_token,
        dry_run,
    } = request;
    info!("Received command (dry_run={}): {}", dry_run, text);

    // A token in the body wins over the header
    let token = auth_token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| extract_bearer(&headers));

    let agent = &state.agent;
    let run = async {
        match &command {
            Some(command) => {
                agent
                    .execute_command(command, token.as_deref(), dry_run, agent.now())
                    .await
            }
            None => agent.process(&text, token.as_deref(), dry_run).await,
        }
    };
    let result = tokio::time::timeout(state.request_timeout, run).await;

    match result {
        Ok(result) => Json(result),
        Err(_) => {
            warn!("Command timed out after {:?}", state.request_timeout);
            Json(state.agent.timeout_result())
        }
    }
}
