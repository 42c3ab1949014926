//! Typed wrappers over the feed and chat endpoints.
//!
//! Every call goes through [`SessionManager`], so an expired access token is
//! refreshed transparently. Blank user input is rejected locally with
//! [`RequestError::Invalid`] and never reaches the network.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::client::navigation::{ChatId, PostId};
use crate::client::session::SessionManager;
use crate::shared::error::RequestError;
use crate::shared::feed::{Comment, ContentRequest, CreatePostRequest, Listing, Post};
use crate::shared::messaging::{Chat, ChatMessage, CreateChatRequest};

/// Feed and chat API
#[derive(Debug, Clone)]
pub struct FeedApi {
    session: Arc<SessionManager>,
}

impl FeedApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// One page of the feed, newest first. Pages start at 1.
    pub async fn posts(&self, page: u32) -> Result<Vec<Post>, RequestError> {
        self.list(&format!("/posts/?page={}", page.max(1))).await
    }

    pub async fn post(&self, id: PostId) -> Result<Post, RequestError> {
        self.session.get(&format!("/posts/{}/", id)).await?.json()
    }

    pub async fn create_post(&self, title: &str, content: &str) -> Result<(), RequestError> {
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(RequestError::Invalid("Please fill in all fields".to_string()));
        }
        let request = CreatePostRequest {
            title: title.trim().to_string(),
            content: content.trim().to_string(),
        };
        self.session.post("/posts/", &request).await?;
        tracing::info!("Post created");
        Ok(())
    }

    /// Toggle the current user's like on a post.
    pub async fn like_post(&self, id: PostId) -> Result<(), RequestError> {
        self.session
            .post(&format!("/posts/{}/like/", id), &serde_json::json!({}))
            .await?;
        Ok(())
    }

    pub async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>, RequestError> {
        self.list(&format!("/posts/{}/comments/", post_id)).await
    }

    pub async fn add_comment(&self, post_id: PostId, content: &str) -> Result<(), RequestError> {
        if content.trim().is_empty() {
            return Err(RequestError::Invalid("Please enter a comment".to_string()));
        }
        let request = ContentRequest { content: content.trim().to_string() };
        self.session
            .post(&format!("/posts/{}/comment/", post_id), &request)
            .await?;
        Ok(())
    }

    pub async fn chats(&self) -> Result<Vec<Chat>, RequestError> {
        self.list("/chats/").await
    }

    pub async fn chat(&self, id: ChatId) -> Result<Chat, RequestError> {
        self.session.get(&format!("/chats/{}/", id)).await?.json()
    }

    /// Start a chat with another user.
    pub async fn create_chat(&self, member_username: &str) -> Result<(), RequestError> {
        let member = member_username.trim();
        if member.is_empty() {
            return Err(RequestError::Invalid("Please enter a username".to_string()));
        }
        let request = CreateChatRequest { member_username: member.to_string() };
        self.session.post("/chats/", &request).await?;
        tracing::info!(member, "Chat created");
        Ok(())
    }

    /// Full message history of a chat in server order.
    pub async fn messages(&self, chat_id: ChatId) -> Result<Vec<ChatMessage>, RequestError> {
        self.list(&format!("/chats/{}/messages/", chat_id)).await
    }

    pub async fn send_message(&self, chat_id: ChatId, content: &str) -> Result<(), RequestError> {
        if content.trim().is_empty() {
            return Err(RequestError::Invalid("Please enter a message".to_string()));
        }
        let request = ContentRequest { content: content.to_string() };
        self.session
            .post(&format!("/chats/{}/messages/", chat_id), &request)
            .await?;
        Ok(())
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, RequestError> {
        let listing: Listing<T> = self.session.get(path).await?.json()?;
        Ok(listing.into_vec())
    }
}
