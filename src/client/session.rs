//! Session Manager
//!
//! Owns the credential pair and its whole lifecycle: login, registration,
//! transparent refresh of an expired access token, and logout. Every other
//! component reaches the API through [`SessionManager::authorized_request`]
//! and never sees the tokens directly.
//!
//! ## Refresh
//!
//! A request answered with 401 triggers exactly one refresh followed by
//! exactly one retry. Refreshes are serialized through a gate: a request
//! that hits 401 while another request is refreshing waits for it and then
//! retries with the token that refresh produced. A failed refresh ends the
//! session and surfaces [`RequestError::SessionExpired`].
//!
//! ## Persistence
//!
//! Token mutations are written to durable storage while the credential lock
//! is held, before the in-memory copy changes, so memory and storage never
//! disagree once a call returns.

use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use url::Url;

use crate::client::config::Config;
use crate::client::storage::KeyValueStore;
use crate::client::token_store::{Credentials, TokenStore};
use crate::client::types::{
    AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest,
};
use crate::shared::error::{extract_detail, AuthError, RequestError};

pub const LOGIN_PATH: &str = "/users/auth/login/";
pub const REGISTER_PATH: &str = "/users/auth/register/";
pub const LOGOUT_PATH: &str = "/users/auth/logout/";
pub const REFRESH_PATH: &str = "/users/auth/refresh/";

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out
    UserRequested,
    /// The refresh token was rejected
    SessionExpired,
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    Refreshed,
    /// Observers should return to the unauthenticated view
    LoggedOut(LogoutReason),
}

/// A successful API response with its body already read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: String,
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_str(&self.body).map_err(|e| RequestError::Decode(e.to_string()))
    }

    fn into_result(self) -> Result<Self, RequestError> {
        if (200..300).contains(&self.status) {
            return Ok(self);
        }
        let reason = reason_phrase(self.status);
        Err(RequestError::ServerError {
            status: self.status,
            detail: extract_detail(&self.body, reason),
        })
    }
}

fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Request failed")
}

pub struct SessionManager {
    config: Config,
    client: Client,
    tokens: TokenStore,
    credentials: RwLock<Option<Credentials>>,
    refresh_gate: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api_base", &self.config.api_base())
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Create a session manager, rehydrating any persisted credentials.
    pub fn new(config: Config, store: Arc<dyn KeyValueStore>) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        let tokens = TokenStore::new(store);
        let credentials = match tokens.load() {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!("Ignoring unreadable persisted credentials: {}", e);
                None
            }
        };
        if credentials.is_some() {
            tracing::info!("Resumed persisted session");
        }
        let (events, _) = broadcast::channel(16);
        Self {
            config,
            client,
            tokens,
            credentials: RwLock::new(credentials),
            refresh_gate: Mutex::new(()),
            events,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credentials.read().await.is_some()
    }

    /// Exchange username and password for a credential pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials, AuthError> {
        let url = self.config.api_url(LOGIN_PATH);
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Login request failed: {}", e);
                AuthError::Unreachable(e.to_string())
            })?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            tracing::info!(status = status.as_u16(), "Login rejected");
            return Err(AuthError::InvalidCredentials(extract_detail(
                &body,
                "Invalid credentials",
            )));
        }

        let auth: AuthResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::UnexpectedResponse(e.to_string()))?;
        let credentials = auth.tokens;
        if credentials.access.is_empty() || credentials.refresh.is_empty() {
            return Err(AuthError::UnexpectedResponse("empty token in response".to_string()));
        }

        {
            let mut guard = self.credentials.write().await;
            self.tokens.save(&credentials)?;
            *guard = Some(credentials.clone());
        }

        tracing::info!(username, "Logged in");
        let _ = self.events.send(SessionEvent::LoggedIn {
            username: username.to_string(),
        });
        Ok(credentials)
    }

    /// Create an account. The password confirmation is checked locally and
    /// a mismatch never reaches the network.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        if password != confirm {
            return Err(AuthError::PasswordMismatch);
        }

        let url = self.config.api_url(REGISTER_PATH);
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Registration request failed: {}", e);
                AuthError::Unreachable(e.to_string())
            })?;
        let status = response.status();
        if status.is_success() {
            tracing::info!(username, "Registered");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        let details = match body.trim() {
            "" => reason_phrase(status.as_u16()).to_string(),
            text => text.to_string(),
        };
        Err(AuthError::Validation(details))
    }

    /// Send a request carrying the current access token.
    ///
    /// A 401 answer triggers one refresh and one retry; the caller observes
    /// the retry's outcome. Non-success statuses map to
    /// [`RequestError::ServerError`].
    pub async fn authorized_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, RequestError> {
        let access = self
            .current_access()
            .await
            .ok_or(RequestError::NotAuthenticated)?;

        let response = self.send(&method, path, body, &access).await?;
        if response.status != StatusCode::UNAUTHORIZED.as_u16() {
            return response.into_result();
        }

        tracing::debug!(path, "Access token rejected, refreshing");
        let access = self.refresh_after(&access).await?;
        self.send(&method, path, body, &access).await?.into_result()
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, RequestError> {
        self.authorized_request(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<ApiResponse, RequestError> {
        let value = serde_json::to_value(body).map_err(|e| RequestError::Invalid(e.to_string()))?;
        self.authorized_request(Method::POST, path, Some(&value)).await
    }

    /// Streaming endpoint for a chat with the current access token in the
    /// query string.
    pub async fn chat_stream_url(&self, chat_id: u64) -> Result<Url, RequestError> {
        let access = self
            .current_access()
            .await
            .ok_or(RequestError::NotAuthenticated)?;
        self.config
            .chat_stream_url(chat_id, &access)
            .map_err(|e| RequestError::Invalid(e.to_string()))
    }

    /// End the session. The server is notified on a best-effort basis; local
    /// credentials are always cleared. Calling this without a session does
    /// nothing.
    pub async fn logout(&self) {
        self.end_session(LogoutReason::UserRequested).await;
    }

    async fn current_access(&self) -> Option<String> {
        self.credentials
            .read()
            .await
            .as_ref()
            .map(|c| c.access.clone())
    }

    async fn send(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
        access: &str,
    ) -> Result<ApiResponse, RequestError> {
        let url = self.config.api_url(path);
        let mut request = self.client.request(method.clone(), &url).bearer_auth(access);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        tracing::debug!(%method, path, status, "API request completed");
        Ok(ApiResponse { status, body })
    }

    /// Obtain a fresh access token after `rejected` was refused.
    async fn refresh_after(&self, rejected: &str) -> Result<String, RequestError> {
        let _gate = self.refresh_gate.lock().await;

        let refresh = match self.credentials.read().await.as_ref() {
            None => return Err(RequestError::SessionExpired),
            // Refreshed by another request while this one waited.
            Some(current) if current.access != rejected => return Ok(current.access.clone()),
            Some(current) => current.refresh.clone(),
        };

        match self.refresh(&refresh).await {
            Ok(access) => Ok(access),
            Err(reason) => {
                tracing::warn!("Token refresh failed, ending session: {}", reason);
                self.end_session(LogoutReason::SessionExpired).await;
                Err(RequestError::SessionExpired)
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, String> {
        let url = self.config.api_url(REFRESH_PATH);
        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh: refresh_token.to_string() })
            .send()
            .await
            .map_err(|e| format!("network: {}", e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| format!("network: {}", e))?;
        if !status.is_success() {
            return Err(format!("http {}: {}", status.as_u16(), extract_detail(&body, "")));
        }
        let refreshed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| format!("decode: {}", e))?;

        let mut guard = self.credentials.write().await;
        let Some(current) = guard.as_mut() else {
            return Err("session ended during refresh".to_string());
        };
        let persisted = match &refreshed.refresh {
            Some(rotated) => self.tokens.save(&Credentials {
                access: refreshed.access.clone(),
                refresh: rotated.clone(),
            }),
            None => self.tokens.save_access(&refreshed.access),
        };
        persisted.map_err(|e| format!("storage: {}", e))?;
        current.access = refreshed.access.clone();
        if let Some(rotated) = refreshed.refresh {
            current.refresh = rotated;
        }
        drop(guard);

        tracing::info!("Access token refreshed");
        let _ = self.events.send(SessionEvent::Refreshed);
        Ok(refreshed.access)
    }

    async fn end_session(&self, reason: LogoutReason) {
        let mut guard = self.credentials.write().await;
        let Some(credentials) = guard.take() else {
            tracing::debug!("Logout requested with no active session");
            return;
        };
        if let Err(e) = self.tokens.clear() {
            tracing::error!("Failed to clear persisted credentials: {}", e);
        }
        drop(guard);

        tracing::info!(?reason, "Session ended");
        let _ = self.events.send(SessionEvent::LoggedOut(reason));

        // Best effort; local state is already gone if this is cancelled.
        if let Err(e) = self.notify_logout(&credentials).await {
            tracing::warn!("Logout notification failed: {}", e);
        }
    }

    async fn notify_logout(&self, credentials: &Credentials) -> Result<(), String> {
        let url = self.config.api_url(LOGOUT_PATH);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&credentials.access)
            .json(&RefreshRequest { refresh: credentials.refresh.clone() })
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("server answered {}", response.status()))
        }
    }
}
