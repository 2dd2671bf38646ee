//! HTTP client for the metadata sync server.
//!
//! The client discovers a local server by probing candidate addresses,
//! authenticates for a bearer token, and exchanges encrypted metadata records.
//! Exchanges run one at a time through `&mut self`; a full exchange that
//! exceeds the configured deadline fails with [`SyncError::Timeout`] rather
//! than hanging the caller.

use crate::sync::models::{
    AuthRequest, AuthResponse, ErrorResponse, FileMetadataRecord, StatusResponse, SyncExchange,
    SyncRequest, SyncStatusResponse,
};
use crate::sync::{Result, SyncError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a single candidate probe may take before moving on.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default deadline for one full sync exchange.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Ports a locally running sync server is expected on.
const DEFAULT_PORTS: [u16; 3] = [8080, 3000, 5000];

/// An authenticated session with the sync server.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub expires_at: i64,
    pub user_id: i64,
}

/// Client for the metadata sync API.
pub struct SyncClient {
    client: reqwest::Client,
    candidates: Vec<String>,
    base_url: Option<String>,
    device_id: String,
    session: Option<Session>,
    exchange_timeout: Duration,
}

impl SyncClient {
    /// Create a client probing the default localhost ports.
    pub fn new(device_id: &str) -> Self {
        let candidates = DEFAULT_PORTS
            .iter()
            .map(|port| format!("http://localhost:{}", port))
            .collect();
        Self::with_candidates(device_id, candidates)
    }

    /// Create a client with explicit candidate base URLs.
    pub fn with_candidates(device_id: &str, candidates: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            candidates: candidates
                .into_iter()
                .map(|url| url.trim_end_matches('/').to_string())
                .collect(),
            base_url: None,
            device_id: device_id.to_string(),
            session: None,
            exchange_timeout: EXCHANGE_TIMEOUT,
        }
    }

    /// Override the per-exchange deadline.
    pub fn set_exchange_timeout(&mut self, timeout: Duration) {
        self.exchange_timeout = timeout;
    }

    /// The base URL of the discovered server, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// The current session, if authenticated.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Probe the candidate addresses in order and adopt the first that
    /// answers the status endpoint. Returns false, never panics, when no
    /// server is reachable.
    pub async fn connect(&mut self) -> bool {
        for candidate in self.candidates.clone() {
            let url = format!("{}/api/status", candidate);
            let response = self
                .client
                .get(&url)
                .timeout(PROBE_TIMEOUT)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<StatusResponse>().await {
                        Ok(body) if !body.status.is_empty() => {
                            info!("Sync server found at {}", candidate);
                            self.base_url = Some(candidate);
                            return true;
                        }
                        _ => debug!("Candidate {} answered with unexpected body", candidate),
                    }
                }
                Ok(resp) => debug!("Candidate {} answered {}", candidate, resp.status()),
                Err(e) => debug!("Candidate {} unreachable: {}", candidate, e),
            }
        }

        warn!("No sync server reachable on any candidate address");
        false
    }

    /// Register a new account and adopt the returned session.
    pub async fn register(&mut self, username: &str, password: &str) -> Result<()> {
        self.authenticate("/api/auth/register", username, password)
            .await
    }

    /// Log in to an existing account and adopt the returned session.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.authenticate("/api/auth/login", username, password)
            .await
    }

    /// Drop the session. Subsequent authenticated calls fail fast.
    pub fn logout(&mut self) {
        self.session = None;
    }

    /// Upload one new metadata record.
    pub async fn upload_metadata(&self, record: &FileMetadataRecord) -> Result<()> {
        let (base, session) = self.require_session()?;
        let response = self
            .client
            .post(format!("{}/api/metadata", base))
            .bearer_auth(&session.token)
            .json(record)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Fetch all metadata records for the account.
    pub async fn fetch_metadata(&self) -> Result<Vec<FileMetadataRecord>> {
        let (base, session) = self.require_session()?;
        let response = self
            .client
            .get(format!("{}/api/metadata", base))
            .bearer_auth(&session.token)
            .send()
            .await?;
        let response = Self::expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Decoding(e.to_string()))
    }

    /// Replace one metadata record.
    pub async fn update_metadata(&self, record: &FileMetadataRecord) -> Result<()> {
        let (base, session) = self.require_session()?;
        let response = self
            .client
            .put(format!("{}/api/metadata/{}", base, record.id))
            .bearer_auth(&session.token)
            .json(record)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Delete one metadata record server-side.
    pub async fn delete_metadata(&self, id: &str) -> Result<()> {
        let (base, session) = self.require_session()?;
        let response = self
            .client
            .delete(format!("{}/api/metadata/{}", base, id))
            .bearer_auth(&session.token)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    /// Run one full sync exchange: push local records and the continuation
    /// token, receive the server's merged view.
    ///
    /// The whole exchange runs under the configured deadline. The response is
    /// decoded defensively; an explicit server `error` field always wins.
    pub async fn push_metadata(
        &mut self,
        items: Vec<FileMetadataRecord>,
        sync_token: &str,
    ) -> Result<SyncExchange> {
        let (base, session) = self.require_session()?;
        let request = SyncRequest {
            device_id: self.device_id.clone(),
            items,
            sync_token: sync_token.to_string(),
        };

        let url = format!("{}/api/sync", base);
        let exchange = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&session.token)
                .json(&request)
                .send()
                .await?;
            let response = Self::expect_success(response).await?;
            let value: serde_json::Value = response
                .json()
                .await
                .map_err(|e| SyncError::Decoding(e.to_string()))?;
            SyncExchange::from_value(&value)
        };

        match tokio::time::timeout(self.exchange_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout),
        }
    }

    /// Fetch account-level sync status.
    pub async fn sync_status(&self) -> Result<SyncStatusResponse> {
        let (base, session) = self.require_session()?;
        let response = self
            .client
            .get(format!("{}/api/sync/status", base))
            .bearer_auth(&session.token)
            .send()
            .await?;
        let response = Self::expect_success(response).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Decoding(e.to_string()))
    }

    async fn authenticate(&mut self, path: &str, username: &str, password: &str) -> Result<()> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(SyncError::ServerUnavailable)?;
        let request = AuthRequest {
            username: username.to_string(),
            password: password.to_string(),
            device_id: self.device_id.clone(),
        };

        let response = self
            .client
            .post(format!("{}{}", base, path))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(SyncError::Authentication(message));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Decoding(e.to_string()))?;

        info!("Authenticated with sync server");
        self.session = Some(Session {
            token: auth.token,
            expires_at: auth.expires_at,
            user_id: auth.user_id,
        });
        Ok(())
    }

    fn require_session(&self) -> Result<(&str, &Session)> {
        let session = self.session.as_ref().ok_or(SyncError::NotAuthenticated)?;
        let base = self
            .base_url
            .as_deref()
            .ok_or(SyncError::ServerUnavailable)?;
        Ok((base, session))
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| format!("{}: {}", status, body));
        Err(SyncError::Server(message))
    }
}
