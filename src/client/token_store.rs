//! Credential persistence
//!
//! [`TokenStore`] mirrors the access/refresh pair into durable storage. It
//! holds no state of its own and makes no decisions; the session manager is
//! its only writer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::storage::{keys, KeyValueStore};
use crate::shared::error::StorageError;

/// The access/refresh token pair. Both are always present together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access: String,
    pub refresh: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load persisted credentials. A lone access or refresh token is treated
    /// as no credentials at all.
    pub fn load(&self) -> Result<Option<Credentials>, StorageError> {
        let access = self.store.get(keys::ACCESS_TOKEN)?;
        let refresh = self.store.get(keys::REFRESH_TOKEN)?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(Credentials { access, refresh }),
            _ => None,
        })
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), StorageError> {
        self.store.apply(&[
            (keys::ACCESS_TOKEN, Some(credentials.access.as_str())),
            (keys::REFRESH_TOKEN, Some(credentials.refresh.as_str())),
        ])
    }

    pub fn save_access(&self, access: &str) -> Result<(), StorageError> {
        self.store.set(keys::ACCESS_TOKEN, access)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store
            .apply(&[(keys::ACCESS_TOKEN, None), (keys::REFRESH_TOKEN, None)])
    }
}
