//! Client Module
//!
//! Everything that talks to the backend or touches durable state.
//!
//! - [`session`] - credential lifecycle and authorized requests
//! - [`navigation`] - current view, persisted across restarts
//! - [`realtime`] - per-thread message delivery (stream, then polling)
//! - [`view`] - glue that turns user actions into screens
//!
//! Supporting pieces: [`config`] resolves endpoints, [`storage`] and
//! [`token_store`] persist state, [`feed_api`] wraps the REST endpoints.

pub mod config;
pub mod feed_api;
pub mod navigation;
pub mod realtime;
pub mod session;
pub mod storage;
pub mod token_store;
pub mod types;
pub mod view;

pub use config::Config;
pub use feed_api::FeedApi;
pub use navigation::{ChatId, NavigationSnapshot, NavigationState, PostId, View, ViewIds};
pub use realtime::{active_channels, ChannelState, RealtimeChannel, SendRoute};
pub use session::{ApiResponse, LogoutReason, SessionEvent, SessionManager};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use token_store::{Credentials, TokenStore};
pub use view::{Screen, ViewController};
