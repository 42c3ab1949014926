//! Navigation state
//!
//! Tracks which screen is showing and which post or chat it is about, and
//! persists that after every transition so a restart resumes in place.
//!
//! Persisted form (all strings, absent or empty means unset):
//!
//! | view | `currentView` | `currentPostId` | `currentChatId` |
//! |---|---|---|---|
//! | posts | `posts` | - | - |
//! | post detail | `post-detail` | id | - |
//! | chats | `chats` | - | - |
//! | chat thread | `chats` | - | id |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::storage::{keys, KeyValueStore};
use crate::shared::error::{NavigationError, StorageError};

pub type PostId = u64;
pub type ChatId = u64;

/// Top-level screens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    #[default]
    Posts,
    Chats,
    PostDetail,
    ChatThread,
}

impl View {
    fn storage_value(self) -> &'static str {
        match self {
            View::Posts => "posts",
            View::PostDetail => "post-detail",
            View::Chats | View::ChatThread => "chats",
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            View::Posts => "posts",
            View::Chats => "chats",
            View::PostDetail => "post_detail",
            View::ChatThread => "chat_thread",
        };
        f.write_str(name)
    }
}

/// Ids accompanying a view transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewIds {
    pub post: Option<PostId>,
    pub chat: Option<ChatId>,
}

impl ViewIds {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn post(id: PostId) -> Self {
        Self { post: Some(id), chat: None }
    }

    pub fn chat(id: ChatId) -> Self {
        Self { post: None, chat: Some(id) }
    }
}

/// Where the user is. A post id is present only on the post detail view and
/// a chat id only on a chat thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationSnapshot {
    pub view: View,
    pub active_post_id: Option<PostId>,
    pub active_chat_id: Option<ChatId>,
}

impl NavigationSnapshot {
    /// Build a snapshot, rejecting ids that do not belong to `view`.
    pub fn new(view: View, ids: ViewIds) -> Result<Self, NavigationError> {
        let invalid = |reason: &str| NavigationError::InvalidIds {
            view: view.to_string(),
            reason: reason.to_string(),
        };
        match view {
            View::Posts | View::Chats => {
                if ids.post.is_some() || ids.chat.is_some() {
                    return Err(invalid("takes no ids"));
                }
            }
            View::PostDetail => {
                if ids.post.is_none() {
                    return Err(invalid("requires a post id"));
                }
                if ids.chat.is_some() {
                    return Err(invalid("cannot carry a chat id"));
                }
            }
            View::ChatThread => {
                if ids.chat.is_none() {
                    return Err(invalid("requires a chat id"));
                }
                if ids.post.is_some() {
                    return Err(invalid("cannot carry a post id"));
                }
            }
        }
        Ok(Self {
            view,
            active_post_id: ids.post,
            active_chat_id: ids.chat,
        })
    }

    pub fn posts() -> Self {
        Self::default()
    }

    pub fn chats() -> Self {
        Self { view: View::Chats, ..Self::default() }
    }

    pub fn post_detail(id: PostId) -> Self {
        Self { view: View::PostDetail, active_post_id: Some(id), active_chat_id: None }
    }

    pub fn chat_thread(id: ChatId) -> Self {
        Self { view: View::ChatThread, active_post_id: None, active_chat_id: Some(id) }
    }

    /// Decode the persisted form. `None` for anything structurally invalid.
    fn decode(view: Option<&str>, post: Option<&str>, chat: Option<&str>) -> Option<Self> {
        let post = post.map(|s| s.trim().parse::<PostId>()).transpose().ok()?;
        let chat = chat.map(|s| s.trim().parse::<ChatId>()).transpose().ok()?;
        let view = match view? {
            "posts" => View::Posts,
            "post-detail" => View::PostDetail,
            "chats" if chat.is_some() => View::ChatThread,
            "chats" => View::Chats,
            _ => return None,
        };
        Self::new(view, ViewIds { post, chat }).ok()
    }
}

/// Owns the current [`NavigationSnapshot`] and its persisted copy.
pub struct NavigationState {
    store: Arc<dyn KeyValueStore>,
    current: NavigationSnapshot,
}

impl NavigationState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, current: NavigationSnapshot::default() }
    }

    pub fn current(&self) -> NavigationSnapshot {
        self.current
    }

    /// Validate, persist and adopt a new view.
    pub fn set_view(&mut self, view: View, ids: ViewIds) -> Result<NavigationSnapshot, NavigationError> {
        let snapshot = NavigationSnapshot::new(view, ids)?;
        self.persist(&snapshot)?;
        self.current = snapshot;
        tracing::debug!(view = %snapshot.view, post = ?snapshot.active_post_id, chat = ?snapshot.active_chat_id, "View changed");
        Ok(snapshot)
    }

    /// Read the persisted snapshot. Missing, unreadable or invalid data
    /// yields the posts view.
    pub fn restore(&mut self) -> NavigationSnapshot {
        let snapshot = match self.read_persisted() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => NavigationSnapshot::default(),
            Err(e) => {
                tracing::warn!("Navigation state unreadable, starting at posts: {}", e);
                NavigationSnapshot::default()
            }
        };
        self.current = snapshot;
        tracing::info!(view = %snapshot.view, "Navigation restored");
        snapshot
    }

    /// Forget the persisted view and return to posts.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.current = NavigationSnapshot::default();
        self.store.apply(&[
            (keys::CURRENT_VIEW, None),
            (keys::CURRENT_POST_ID, None),
            (keys::CURRENT_CHAT_ID, None),
        ])
    }

    fn read_persisted(&self) -> Result<Option<NavigationSnapshot>, StorageError> {
        let view = self.store.get(keys::CURRENT_VIEW)?;
        let post = self.store.get(keys::CURRENT_POST_ID)?;
        let chat = self.store.get(keys::CURRENT_CHAT_ID)?;
        if view.is_none() {
            return Ok(None);
        }
        let decoded = NavigationSnapshot::decode(view.as_deref(), post.as_deref(), chat.as_deref());
        if decoded.is_none() {
            tracing::warn!(?view, ?post, ?chat, "Discarding invalid persisted navigation");
        }
        Ok(decoded)
    }

    fn persist(&self, snapshot: &NavigationSnapshot) -> Result<(), StorageError> {
        let post = snapshot.active_post_id.map(|id| id.to_string());
        let chat = snapshot.active_chat_id.map(|id| id.to_string());
        self.store.apply(&[
            (keys::CURRENT_VIEW, Some(snapshot.view.storage_value())),
            (keys::CURRENT_POST_ID, post.as_deref()),
            (keys::CURRENT_CHAT_ID, chat.as_deref()),
        ])
    }
}
