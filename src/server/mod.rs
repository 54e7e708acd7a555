mod handlers;

pub use handlers::{extract_bearer, health_handler, process_command_handler, ProcessCommandRequest};

use crate::components::agent::CalendarAgent;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    /// Shared agent; holds no per-request state
    pub agent: Arc<CalendarAgent>,
    /// Upper bound for one command
    pub request_timeout: Duration,
    /// Model name reported by the health check
    pub model: String,
}

/// HTTP routes of the agent
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/process-command", post(process_command_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
