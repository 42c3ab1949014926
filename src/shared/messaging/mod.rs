//! Chat wire types
//!
//! Shapes exchanged with the chat REST endpoints and the streaming
//! endpoint. Message history and streamed frames share [`ChatMessage`].

pub mod chat;
pub mod message;

pub use chat::{Chat, CreateChatRequest};
pub use message::{ChatMessage, OutgoingFrame};
