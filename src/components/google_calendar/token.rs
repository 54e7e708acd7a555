use crate::config::Config;
use crate::error::{google_calendar_error, AgentResult};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// OAuth token endpoint used for refreshing
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed early
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Process-wide credential as stored on disk.
///
/// Authorized-user files written by Google's OAuth helpers also carry the
/// client credentials and token endpoint used for refreshing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as a UNIX timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Expiry as an ISO 8601 timestamp, written by some OAuth helpers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
}

impl StoredToken {
    /// Expiry in seconds since the epoch, from whichever field is present
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at.or_else(|| {
            self.expiry
                .as_deref()
                .and_then(|e| DateTime::parse_from_rfc3339(e).ok())
                .map(|dt| dt.timestamp())
        })
    }

    /// Whether the access token can still be used at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expiry) => expiry > now.timestamp() + EXPIRY_MARGIN_SECS,
            // Without an expiry the token is tried as-is
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Loads the stored credential and refreshes it when it has expired
#[derive(Clone)]
pub struct TokenManager {
    config: Arc<Config>,
    path: PathBuf,
    client: Client,
    token_endpoint: String,
    refresh_lock: Arc<Mutex<()>>,
}

impl TokenManager {
    pub fn new(config: Arc<Config>, client: Client) -> Self {
        let path = PathBuf::from(&config.token_path);
        Self {
            config,
            path,
            client,
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current access token, or `None` when no credential is stored
    pub async fn get_access_token(&self) -> AgentResult<Option<String>> {
        let Some(token) = self.load().await? else {
            return Ok(None);
        };

        if token.is_valid_at(Utc::now()) {
            return Ok(Some(token.access_token));
        }

        let _guard = self.refresh_lock.lock().await;
        // Another request may have refreshed while this one waited
        let Some(token) = self.load().await? else {
            return Ok(None);
        };
        if token.is_valid_at(Utc::now()) {
            debug!("Stored Google token was refreshed concurrently");
            return Ok(Some(token.access_token));
        }

        info!("Stored Google token expired, refreshing");
        let refreshed = self.refresh_token(&token).await?;
        Ok(Some(refreshed.access_token))
    }

    /// Read the token file if there is one
    pub async fn load(&self) -> AgentResult<Option<StoredToken>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let token: StoredToken = serde_json::from_str(&content)
            .map_err(|e| google_calendar_error(&format!("Failed to parse token JSON: {}", e)))?;
        Ok(Some(token))
    }

    /// Exchange the refresh token for a new access token and persist it
    async fn refresh_token(&self, token: &StoredToken) -> AgentResult<StoredToken> {
        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or_else(|| google_calendar_error("No refresh token in token data"))?;

        let Some((client_id, client_secret)) = self.client_credentials(token) else {
            return Err(google_calendar_error(
                "Stored token expired and neither the token file nor GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET provide client credentials",
            ));
        };
        let endpoint = token.token_uri.as_deref().unwrap_or(&self.token_endpoint);

        let params = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token.to_string()),
            ("grant_type", "refresh_token".to_string()),
        ];

        let response = self
            .client
            .post(endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to refresh token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(google_calendar_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error_body
            )));
        }

        let new_token: RefreshResponse = response
            .json()
            .await
            .map_err(|e| google_calendar_error(&format!("Failed to parse token response: {}", e)))?;

        let expires_in = new_token.expires_in.unwrap_or(3600);
        let refreshed = StoredToken {
            access_token: new_token.access_token,
            refresh_token: Some(refresh_token.to_string()),
            expires_at: Some(Utc::now().timestamp() + expires_in),
            expiry: None,
            ..token.clone()
        };

        if let Err(e) = self.set_token(&refreshed).await {
            // The fresh token is still usable for this process
            warn!("Failed to persist refreshed token: {}", e);
        }

        Ok(refreshed)
    }

    /// Client ID and secret for refreshing; the token file wins over the config
    fn client_credentials(&self, token: &StoredToken) -> Option<(String, String)> {
        match (&token.client_id, &token.client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => self
                .config
                .google_client_id
                .clone()
                .zip(self.config.google_client_secret.clone()),
        }
    }

    /// Write a token to the token file; readers never see a partial file
    pub async fn set_token(&self, token: &StoredToken) -> AgentResult<()> {
        let json = serde_json::to_string_pretty(token)?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, json).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn manager_for(path: &std::path::Path) -> TokenManager {
        let config = Config {
            token_path: path.to_string_lossy().to_string(),
            ..Config::default()
        };
        TokenManager::new(Arc::new(config), Client::new())
    }

    #[test]
    fn test_token_validity() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 8, 0, 0).unwrap();
        let mut token = StoredToken {
            access_token: "abc".to_string(),
            expires_at: Some(now.timestamp() + 3600),
            ..Default::default()
        };
        assert!(token.is_valid_at(now));

        token.expires_at = Some(now.timestamp() + 30);
        assert!(!token.is_valid_at(now));

        token.expires_at = None;
        token.expiry = Some("2025-12-31T07:00:00Z".to_string());
        assert!(!token.is_valid_at(now));

        token.expiry = None;
        assert!(token.is_valid_at(now));
    }

    #[test]
    fn test_token_field_alias() {
        let token: StoredToken =
            serde_json::from_str(r#"{"token":"ya29.x","refresh_token":"1//r","expiry":"2030-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(token.access_token, "ya29.x");
        assert_eq!(token.refresh_token.as_deref(), Some("1//r"));
        assert!(token.expires_at().is_some());
    }

    #[test]
    fn test_client_credentials_prefer_token_file() {
        let config = Config {
            google_client_id: Some("env-id".to_string()),
            google_client_secret: Some("env-secret".to_string()),
            ..Config::default()
        };
        let manager = TokenManager::new(Arc::new(config), Client::new());

        let token: StoredToken = serde_json::from_str(
            r#"{"token":"ya29.x","refresh_token":"1//r","client_id":"file-id","client_secret":"file-secret","token_uri":"https://oauth2.googleapis.com/token"}"#,
        )
        .unwrap();
        assert_eq!(
            manager.client_credentials(&token),
            Some(("file-id".to_string(), "file-secret".to_string()))
        );

        // Half a pair in the file falls back to the configuration
        let partial = StoredToken {
            client_secret: None,
            ..token
        };
        assert_eq!(
            manager.client_credentials(&partial),
            Some(("env-id".to_string(), "env-secret".to_string()))
        );

        let bare = TokenManager::new(Arc::new(Config::default()), Client::new());
        assert_eq!(bare.client_credentials(&partial), None);
    }

    #[tokio::test]
    async fn test_missing_file_means_no_credential() {
        let path = std::env::temp_dir().join(format!("calendar-agent-missing-{}.json", uuid::Uuid::new_v4()));
        let manager = manager_for(&path);
        assert_eq!(manager.get_access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stored_token_roundtrip() {
        let path = std::env::temp_dir().join(format!("calendar-agent-token-{}.json", uuid::Uuid::new_v4()));
        let manager = manager_for(&path);
        let token = StoredToken {
            access_token: "stored".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(Utc::now().timestamp() + 3600),
            ..Default::default()
        };

        manager.set_token(&token).await.unwrap();
        assert_eq!(manager.get_access_token().await.unwrap().as_deref(), Some("stored"));
        assert!(!manager.staging_path().exists());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_expired_token_without_client_credentials_fails() {
        let path = std::env::temp_dir().join(format!("calendar-agent-expired-{}.json", uuid::Uuid::new_v4()));
        let manager = manager_for(&path);
        let token = StoredToken {
            access_token: "old".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(Utc::now().timestamp() - 10),
            ..Default::default()
        };
        manager.set_token(&token).await.unwrap();

        assert!(manager.get_access_token().await.is_err());

        let _ = std::fs::remove_file(&path);
    }
}
