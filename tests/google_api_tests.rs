#![cfg(feature = "web-interface")]

mod common;

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use calendar_agent::components::agent::{CalendarAgent, Status, SubstringRanker};
use calendar_agent::components::google_calendar::{
    CalendarProvider, CredentialSource, EventQuery, GoogleCalendarClient, GoogleSessionFactory, StoredToken,
    TokenManager,
};
use calendar_agent::config::Config;
use calendar_agent::error::Error;
use chrono::Utc;
use common::{now, ScriptedModel, NOW};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve `app` on a free local port and return its base URL
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Calendar API that rejects every bearer token
fn rejecting_calendar() -> Router {
    Router::new().fallback(|| async { (StatusCode::UNAUTHORIZED, "Invalid Credentials") })
}

async fn paged_events(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let event = |id: &str, start: &str| {
        json!({"id": id, "summary": id, "start": {"dateTime": start}, "end": {"dateTime": start}})
    };
    match params.get("pageToken").map(String::as_str) {
        None => Json(json!({
            "items": [event("evt-1", "2025-12-31T08:00:00+01:00")],
            "nextPageToken": "page-2"
        })),
        Some("page-2") => Json(json!({"items": [event("evt-2", "2025-12-31T12:00:00+01:00")]})),
        Some(_) => Json(json!({"items": []})),
    }
}

/// Calendar API that splits every listing over two pages
fn paged_calendar() -> Router {
    Router::new().route("/calendars/primary/events", get(paged_events))
}

#[derive(Clone, Default)]
struct TokenEndpoint {
    requests: Arc<Mutex<Vec<HashMap<String, String>>>>,
}

impl TokenEndpoint {
    fn requests(&self) -> Vec<HashMap<String, String>> {
        self.requests.lock().unwrap().clone()
    }
}

async fn issue_token(
    State(endpoint): State<TokenEndpoint>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    endpoint.requests.lock().unwrap().push(form);
    tokio::time::sleep(Duration::from_millis(50)).await;
    Json(json!({"access_token": "ya29.fresh", "expires_in": 3600}))
}

fn temp_token_path(name: &str) -> String {
    std::env::temp_dir()
        .join(format!("calendar-agent-{}-{}.json", name, uuid::Uuid::new_v4()))
        .to_string_lossy()
        .to_string()
}

fn google_agent(config: Arc<Config>, model: Arc<ScriptedModel>) -> CalendarAgent {
    let sessions = GoogleSessionFactory::new(config, Client::new());
    CalendarAgent::new(
        model,
        Arc::new(SubstringRanker),
        Arc::new(sessions),
        chrono_tz::Europe::Vienna,
        "de",
    )
}

/// A rejected per-call token is a credential problem, a rejected stored one is not
#[tokio::test]
async fn test_rejection_depends_on_credential_source() {
    let base = serve(rejecting_calendar()).await;
    let query = EventQuery::upcoming(NOW, 10);

    let per_call = GoogleCalendarClient::new(Client::new(), "primary", "ya29.revoked", CredentialSource::PerCall)
        .unwrap()
        .with_base_url(&base)
        .unwrap();
    let err = per_call.list(&query).await.unwrap_err();
    assert!(matches!(err, Error::InvalidCredential(_)), "{}", err);

    let stored = GoogleCalendarClient::new(Client::new(), "primary", "ya29.stored", CredentialSource::Stored)
        .unwrap()
        .with_base_url(&base)
        .unwrap();
    let err = stored.list(&query).await.unwrap_err();
    assert!(matches!(err, Error::GoogleCalendar(_)), "{}", err);
}

/// The caller is asked to sign in again only when their own token was rejected
#[tokio::test]
async fn test_rejected_per_call_token_asks_for_reauthentication() {
    let base = serve(rejecting_calendar()).await;
    let config = Arc::new(Config {
        google_api_base_url: base,
        token_path: temp_token_path("rejected"),
        ..Config::default()
    });

    let model = ScriptedModel::new(vec![json!({"intent": "list_events"}), json!({"intent": "list_events"})]);
    let agent = google_agent(config.clone(), model);

    let result = agent.process_at("Zeige meine Termine", Some("ya29.revoked"), false, now()).await;
    assert_eq!(result.status, Status::Error);
    assert_eq!(result.message, "Google Login ungültig. Bitte neu anmelden.");

    let tokens = TokenManager::new(config.clone(), Client::new());
    tokens
        .set_token(&StoredToken {
            access_token: "ya29.stored".to_string(),
            expires_at: Some(Utc::now().timestamp() + 3600),
            ..Default::default()
        })
        .await
        .unwrap();

    let result = agent.process_at("Zeige meine Termine", None, false, now()).await;
    assert_eq!(result.status, Status::Error);
    assert!(result.message.starts_with("Kalenderfehler:"), "{}", result.message);

    let _ = std::fs::remove_file(&config.token_path);
}

#[tokio::test]
async fn test_listing_follows_page_tokens() {
    let base = serve(paged_calendar()).await;
    let client = GoogleCalendarClient::new(Client::new(), "primary", "ya29.stored", CredentialSource::Stored)
        .unwrap()
        .with_base_url(&base)
        .unwrap();

    let window = EventQuery::window("2025-12-31T00:00:00+01:00", "2025-12-31T23:59:59+01:00", 250);
    let ids: Vec<String> = client.list(&window).await.unwrap().into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["evt-1", "evt-2"]);

    // Enough results on the first page, the second is never fetched
    let first = client.list(&EventQuery::upcoming(NOW, 1)).await.unwrap();
    assert_eq!(first.len(), 1);
}

/// The bulk delete preview counts events from every page
#[tokio::test]
async fn test_bulk_delete_preview_counts_all_pages() {
    let base = serve(paged_calendar()).await;
    let config = Arc::new(Config {
        google_api_base_url: base,
        token_path: temp_token_path("paged"),
        ..Config::default()
    });
    let model = ScriptedModel::new(vec![json!({
        "intent": "delete_event",
        "event": {"delete_all": true, "timeMin": "2025-12-31T00:00:00", "timeMax": "2025-12-31T23:59:59"}
    })]);
    let agent = google_agent(config, model);

    let result = agent
        .process_at("Lösche alle Termine heute", Some("ya29.per-call"), true, now())
        .await;
    assert_eq!(result.status, Status::ConfirmationRequired, "{}", result.message);
    assert_eq!(result.count, Some(2));
}

/// Authorized-user token files refresh with their own client credentials
#[tokio::test]
async fn test_refresh_uses_client_credentials_from_token_file() {
    let endpoint = TokenEndpoint::default();
    let base = serve(Router::new().route("/token", post(issue_token)).with_state(endpoint.clone())).await;

    let path = temp_token_path("authorized-user");
    std::fs::write(
        &path,
        json!({
            "token": "ya29.old",
            "refresh_token": "1//refresh",
            "expiry": "2020-01-01T00:00:00Z",
            "client_id": "file-id.apps.googleusercontent.com",
            "client_secret": "file-secret",
            "token_uri": format!("{}/token", base)
        })
        .to_string(),
    )
    .unwrap();

    // No client credentials in the configuration
    let config = Arc::new(Config {
        token_path: path.clone(),
        ..Config::default()
    });
    let manager = TokenManager::new(config, Client::new());

    let token = manager.get_access_token().await.unwrap();
    assert_eq!(token.as_deref(), Some("ya29.fresh"));

    let requests = endpoint.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["client_id"], "file-id.apps.googleusercontent.com");
    assert_eq!(requests[0]["client_secret"], "file-secret");
    assert_eq!(requests[0]["refresh_token"], "1//refresh");
    assert_eq!(requests[0]["grant_type"], "refresh_token");

    // The refreshed file can be refreshed again later
    let stored = manager.load().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "ya29.fresh");
    assert_eq!(stored.client_id.as_deref(), Some("file-id.apps.googleusercontent.com"));
    assert_eq!(stored.token_uri, Some(format!("{}/token", base)));

    let _ = std::fs::remove_file(&path);
}

/// Concurrent requests with an expired token share one refresh
#[tokio::test]
async fn test_concurrent_refreshes_are_serialized() {
    let endpoint = TokenEndpoint::default();
    let base = serve(Router::new().route("/token", post(issue_token)).with_state(endpoint.clone())).await;

    let path = temp_token_path("concurrent");
    let config = Arc::new(Config {
        token_path: path.clone(),
        ..Config::default()
    });
    let manager = TokenManager::new(config, Client::new());
    manager
        .set_token(&StoredToken {
            access_token: "ya29.old".to_string(),
            refresh_token: Some("1//refresh".to_string()),
            expires_at: Some(Utc::now().timestamp() - 10),
            client_id: Some("file-id".to_string()),
            client_secret: Some("file-secret".to_string()),
            token_uri: Some(format!("{}/token", base)),
            ..Default::default()
        })
        .await
        .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.get_access_token().await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.as_deref(), Some("ya29.fresh"));
    }
    assert_eq!(endpoint.requests().len(), 1);

    let _ = std::fs::remove_file(&path);
}
