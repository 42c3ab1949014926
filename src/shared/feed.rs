//! Feed wire types
//!
//! Posts and comments as returned by the `/posts/` endpoints.

use serde::{Deserialize, Serialize};

/// A post in the feed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author_username: String,
    #[serde(default)]
    pub liked_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A comment on a post
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub author_username: String,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body of `POST /posts/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
}

/// Body of `POST /posts/{id}/comment/` and `POST /chats/{id}/messages/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

/// A list endpoint body. The backend answers either with a paginated
/// envelope or a bare array depending on the view.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Paged { results: Vec<T> },
    Bare(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Paged { results } => results,
            Listing::Bare(items) => items,
        }
    }
}
