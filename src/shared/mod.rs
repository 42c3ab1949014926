//! Shared Module
//!
//! Types that describe the backend contract: wire shapes for the feed and
//! chat endpoints, the error taxonomy and application configuration. None
//! of these types perform I/O.

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Chat wire types
pub mod messaging;

/// Feed wire types
pub mod feed;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::{AuthError, ChannelError, NavigationError, RequestError, StorageError};
pub use feed::{Comment, Listing, Post};
pub use messaging::{Chat, ChatMessage, OutgoingFrame};
