//! Chat thread metadata

use serde::{Deserialize, Serialize};

/// A chat thread as listed by `/chats/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: u64,
    #[serde(default)]
    pub members_usernames: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl Chat {
    /// Title shown above a thread
    pub fn title(&self) -> String {
        if self.members_usernames.is_empty() {
            format!("Chat #{}", self.id)
        } else {
            format!("Chat with {}", self.members_usernames.join(", "))
        }
    }
}

/// Body of `POST /chats/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatRequest {
    pub member_username: String,
}
