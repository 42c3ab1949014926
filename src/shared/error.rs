//! Shared Error Types
//!
//! Error taxonomy for the client. Every failure a caller can observe is one
//! of these enums; realtime transport failures are recovered inside the
//! channel and only show up here as [`ChannelError`] in logs.
//!
//! # Error Categories
//!
//! - [`AuthError`] - login / registration failures
//! - [`RequestError`] - failures of authorized API calls
//! - [`ChannelError`] - streaming transport failures (never fatal)
//! - [`StorageError`] - durable key-value store failures
//! - [`NavigationError`] - invalid view transitions
//!
//! # Usage
//!
//! ```rust
//! use xffeed::shared::error::AuthError;
//!
//! let error = AuthError::PasswordMismatch;
//! assert_eq!(error.user_message(), "Passwords do not match");
//! ```
use thiserror::Error;

/// Text shown to the user whenever the backend cannot be reached.
pub const CONNECTIVITY_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";

/// Authentication errors surfaced by login and registration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The server rejected the credentials
    #[error("Login failed: {0}")]
    InvalidCredentials(String),

    /// Password and confirmation differ; detected before any request
    #[error("Passwords do not match")]
    PasswordMismatch,

    /// Server-side validation errors, verbatim
    #[error("Registration failed: {0}")]
    Validation(String),

    /// The backend could not be reached
    #[error("Network error: {0}")]
    Unreachable(String),

    /// A success response whose body did not contain the expected tokens
    #[error("Unexpected response from server: {0}")]
    UnexpectedResponse(String),

    /// Tokens could not be mirrored to durable storage
    #[error("Failed to persist credentials: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Message suitable for display to the user
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials(detail) | AuthError::Validation(detail) => detail.clone(),
            AuthError::Unreachable(_) => CONNECTIVITY_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Errors from requests made through the session manager
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The refresh token was rejected; the session has been terminated
    #[error("Session expired")]
    SessionExpired,

    /// No credentials are present, nothing was sent
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("Server returned {status}: {detail}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Detail text extracted from the response body
        detail: String,
    },

    /// Success status but the body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Input rejected locally before any request
    #[error("{0}")]
    Invalid(String),
}

impl RequestError {
    /// Status code of a server error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::ServerError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for display to the user.
    ///
    /// Session expiry has no message: the UI returns to the login view.
    pub fn user_message(&self) -> Option<String> {
        match self {
            RequestError::SessionExpired | RequestError::NotAuthenticated => None,
            RequestError::Network(_) => Some(CONNECTIVITY_MESSAGE.to_string()),
            RequestError::ServerError { detail, .. } => Some(detail.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Streaming transport failures. Always recovered by falling back to polling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Streaming transport failed: {0}")]
    TransportFailed(String),
}

/// Durable storage failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Corrupt(err.to_string())
    }
}

/// Navigation transition errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// The ids supplied do not belong to the requested view
    #[error("Invalid ids for view {view}: {reason}")]
    InvalidIds { view: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Pull a human-readable detail out of an error response body.
///
/// Prefers a `detail` field, then `error`, then the raw body text.
pub fn extract_detail(body: &str, fallback: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                if !text.trim().is_empty() {
                    return text.to_string();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
