//! XFFeed - Client Library
//!
//! Client-side session and realtime messaging layer for the XFFeed social
//! feed: posts, comments, likes and one-to-one chats served by a REST
//! backend with a WebSocket endpoint per chat thread.
//!
//! # Overview
//!
//! - Token-based sessions with transparent refresh of expired access tokens
//! - Navigation state that survives restarts
//! - Realtime chat delivery over a WebSocket, with permanent fallback to
//!   periodic polling when the socket is unavailable
//! - A terminal client (`xffeed` binary) built on the above
//!
//! # Module Structure
//!
//! - **`shared`** - Wire types, configuration and the error taxonomy
//!   - Posts, comments, chats and messages
//!   - `AppConfig` with TOML and environment overrides
//!   - `AuthError`, `RequestError`, `StorageError`, ...
//!
//! - **`client`** - Everything with I/O
//!   - `SessionManager`: login, register, authorized requests, logout
//!   - `NavigationState`: current view and its persisted copy
//!   - `RealtimeChannel`: one chat thread's message feed
//!   - `ViewController`: user actions in, screens out
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xffeed::client::{Config, FileStore, KeyValueStore, SessionManager, ViewController};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open_default()?);
//! let config = Config::resolve(store.as_ref())?;
//! let session = Arc::new(SessionManager::new(config, store.clone()));
//!
//! let mut views = ViewController::new(session, store);
//! let screen = views.start().await?;
//! println!("showing {}", screen.name());
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! - `SessionManager` is shared behind an `Arc`; refreshes are serialized
//!   so concurrent 401s cause a single refresh request
//! - Each `RealtimeChannel` owns one background task; `close()` waits for
//!   it to finish
//!
//! # Error Handling
//!
//! All fallible operations return `Result` with an error type from
//! `shared::error`. Session expiry surfaces as
//! `RequestError::SessionExpired` exactly once; the view layer turns it
//! into the login screen.

/// Shared types and data structures
pub mod shared;

/// Session, navigation, realtime and view layers
pub mod client;
