//! Chat Message Data Structure
//!
//! Represents a message in a chat thread, as delivered either in a history
//! listing or as a single streamed frame.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message.
///
/// Streamed frames carry only `sender_username`, `content` and `timestamp`;
/// history listings additionally carry the ids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// Server id, absent on streamed frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Chat this message belongs to, absent on streamed frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<u64>,
    /// Display name of the sender
    pub sender_username: String,
    /// Message text
    pub content: String,
    /// When the message was sent, as sent by the server
    #[serde(alias = "created_at")]
    pub timestamp: String,
}

impl ChatMessage {
    /// Parse the server timestamp, if it is RFC 3339
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// One-line rendering used by the terminal client
    pub fn display_line(&self) -> String {
        let when = self
            .sent_at()
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| self.timestamp.clone());
        format!("[{}] {}: {}", when, self.sender_username, self.content)
    }
}

/// Outbound frame sent over the streaming transport
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub content: String,
}
