//! Request and response bodies of the auth endpoints.

use serde::{Deserialize, Serialize};

use crate::client::token_store::Credentials;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Body of the logout and refresh requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// User information returned alongside the tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<u64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Successful login response: `{message, user, tokens: {access, refresh}}`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub tokens: Credentials,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

/// Successful refresh response. Some backends rotate the refresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
