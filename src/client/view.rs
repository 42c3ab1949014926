//! View controller
//!
//! Drives the session, navigation and realtime layers in response to user
//! actions and returns the [`Screen`] to render. It holds at most one
//! [`RealtimeChannel`]; every transition closes the current channel, and
//! waits for it, before anything else happens.
//!
//! A request that fails with [`RequestError::SessionExpired`] is not an
//! error at this level: the controller tears down the thread, forgets the
//! persisted view and returns [`Screen::Login`].

use std::sync::Arc;

use crate::client::feed_api::FeedApi;
use crate::client::navigation::{ChatId, NavigationSnapshot, NavigationState, PostId, View, ViewIds};
use crate::client::realtime::{ChannelState, RealtimeChannel, SendRoute};
use crate::client::session::SessionManager;
use crate::client::storage::KeyValueStore;
use crate::shared::error::{AuthError, RequestError};
use crate::shared::feed::{Comment, Post};
use crate::shared::messaging::{Chat, ChatMessage};

/// What the user should be looking at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Login,
    Posts { page: u32, posts: Vec<Post> },
    PostDetail { post: Post, comments: Vec<Comment> },
    Chats(Vec<Chat>),
    ChatThread { chat: Chat, history: Vec<ChatMessage> },
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Login => "login",
            Screen::Posts { .. } => "posts",
            Screen::PostDetail { .. } => "post_detail",
            Screen::Chats(_) => "chats",
            Screen::ChatThread { .. } => "chat_thread",
        }
    }
}

pub struct ViewController {
    api: FeedApi,
    navigation: NavigationState,
    channel: Option<RealtimeChannel>,
}

impl ViewController {
    pub fn new(session: Arc<SessionManager>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api: FeedApi::new(session),
            navigation: NavigationState::new(store),
            channel: None,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        self.api.session()
    }

    pub fn api(&self) -> &FeedApi {
        &self.api
    }

    pub fn navigation(&self) -> NavigationSnapshot {
        self.navigation.current()
    }

    /// The open chat channel, if a thread is showing
    pub fn channel_mut(&mut self) -> Option<&mut RealtimeChannel> {
        self.channel.as_mut()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel
            .as_ref()
            .map(RealtimeChannel::state)
            .unwrap_or(ChannelState::Idle)
    }

    /// Resume where the previous run left off.
    pub async fn start(&mut self) -> Result<Screen, RequestError> {
        if !self.session().is_authenticated().await {
            return Ok(Screen::Login);
        }
        let snapshot = self.navigation.restore();
        match (snapshot.view, snapshot.active_post_id, snapshot.active_chat_id) {
            (View::PostDetail, Some(id), _) => self.open_post(id).await,
            (View::ChatThread, _, Some(id)) => self.open_chat(id).await,
            (View::Chats, _, _) => self.show_chats().await,
            _ => self.show_posts(1).await,
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Screen, AuthError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Username and password are required".to_string()));
        }
        self.session().login(username.trim(), password).await?;
        match self.show_posts(1).await {
            Ok(screen) => Ok(screen),
            Err(e) => {
                tracing::warn!("Feed unavailable after login: {}", e);
                Ok(Screen::Posts { page: 1, posts: Vec::new() })
            }
        }
    }

    /// Create an account. The user still has to log in afterwards.
    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
        confirm: &str,
    ) -> Result<(), AuthError> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Please fill in all fields".to_string()));
        }
        self.session()
            .register(username.trim(), email.trim(), password, confirm)
            .await
    }

    pub async fn show_posts(&mut self, page: u32) -> Result<Screen, RequestError> {
        self.enter(View::Posts, ViewIds::none()).await;
        let result = self
            .api
            .posts(page)
            .await
            .map(|posts| Screen::Posts { page: page.max(1), posts });
        self.settle(result).await
    }

    pub async fn open_post(&mut self, id: PostId) -> Result<Screen, RequestError> {
        self.enter(View::PostDetail, ViewIds::post(id)).await;
        let result = self.load_post(id).await;
        self.settle(result).await
    }

    pub async fn show_chats(&mut self) -> Result<Screen, RequestError> {
        self.enter(View::Chats, ViewIds::none()).await;
        let result = self.api.chats().await.map(Screen::Chats);
        self.settle(result).await
    }

    /// Show a chat thread: load its history, then subscribe for new
    /// messages.
    ///
    /// The thread is only recorded as the current view once its history has
    /// loaded; a failed load leaves the chat list recorded instead.
    pub async fn open_chat(&mut self, id: ChatId) -> Result<Screen, RequestError> {
        self.close_channel().await;
        let result = self.load_chat(id).await;
        match &result {
            Ok(_) => {
                self.record(View::ChatThread, ViewIds::chat(id));
                self.channel = Some(RealtimeChannel::open(id, self.api.clone()).await);
            }
            Err(_) => self.record(View::Chats, ViewIds::none()),
        }
        self.settle(result).await
    }

    pub async fn leave_chat(&mut self) -> Result<Screen, RequestError> {
        self.show_chats().await
    }

    /// Send into the open thread.
    pub async fn send_message(&mut self, content: &str) -> Result<SendRoute, RequestError> {
        let Some(channel) = self.channel.as_ref() else {
            return Err(RequestError::Invalid("No chat is open".to_string()));
        };
        let result = channel.send(content).await;
        if matches!(result, Err(RequestError::SessionExpired)) {
            self.expire().await;
        }
        result
    }

    /// Create a post, then show the first page of the feed.
    pub async fn create_post(&mut self, title: &str, content: &str) -> Result<Screen, RequestError> {
        let result = self.api.create_post(title, content).await;
        if let Some(screen) = self.interrupted(result).await? {
            return Ok(screen);
        }
        self.show_posts(1).await
    }

    /// Toggle a like and reload whatever view is showing.
    pub async fn like_post(&mut self, id: PostId) -> Result<Screen, RequestError> {
        let result = self.api.like_post(id).await;
        if let Some(screen) = self.interrupted(result).await? {
            return Ok(screen);
        }
        match self.navigation.current().active_post_id {
            Some(current) => self.open_post(current).await,
            None => self.show_posts(1).await,
        }
    }

    /// Comment on the post being viewed.
    pub async fn add_comment(&mut self, content: &str) -> Result<Screen, RequestError> {
        let Some(post_id) = self.navigation.current().active_post_id else {
            return Err(RequestError::Invalid("No post is open".to_string()));
        };
        let result = self.api.add_comment(post_id, content).await;
        if let Some(screen) = self.interrupted(result).await? {
            return Ok(screen);
        }
        self.open_post(post_id).await
    }

    pub async fn create_chat(&mut self, member_username: &str) -> Result<Screen, RequestError> {
        let result = self.api.create_chat(member_username).await;
        if let Some(screen) = self.interrupted(result).await? {
            return Ok(screen);
        }
        self.show_chats().await
    }

    pub async fn logout(&mut self) -> Screen {
        self.close_channel().await;
        self.session().logout().await;
        if let Err(e) = self.navigation.reset() {
            tracing::warn!("Failed to clear navigation state: {}", e);
        }
        Screen::Login
    }

    /// React to a session that ended outside a controller call, such as a
    /// refresh failure during background polling.
    pub async fn session_ended(&mut self) -> Screen {
        self.expire().await;
        Screen::Login
    }

    /// Close the open thread, if any, keeping the persisted view so the next
    /// start resumes there.
    pub async fn release(&mut self) {
        self.close_channel().await;
    }

    async fn load_post(&self, id: PostId) -> Result<Screen, RequestError> {
        let post = self.api.post(id).await?;
        let comments = self.api.comments(id).await?;
        Ok(Screen::PostDetail { post, comments })
    }

    async fn load_chat(&self, id: ChatId) -> Result<Screen, RequestError> {
        let chat = self.api.chat(id).await?;
        let history = self.api.messages(id).await?;
        Ok(Screen::ChatThread { chat, history })
    }

    /// Close any open thread and record the new view.
    async fn enter(&mut self, view: View, ids: ViewIds) {
        self.close_channel().await;
        self.record(view, ids);
    }

    fn record(&mut self, view: View, ids: ViewIds) {
        if let Err(e) = self.navigation.set_view(view, ids) {
            tracing::warn!(%view, "Failed to persist navigation: {}", e);
        }
    }

    async fn close_channel(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
    }

    /// Map session loss to the login screen.
    async fn settle(&mut self, result: Result<Screen, RequestError>) -> Result<Screen, RequestError> {
        match result {
            Err(RequestError::SessionExpired | RequestError::NotAuthenticated) => {
                self.expire().await;
                Ok(Screen::Login)
            }
            other => other,
        }
    }

    /// `Some(Login)` when a mutation ended the session, `None` to continue.
    async fn interrupted(&mut self, result: Result<(), RequestError>) -> Result<Option<Screen>, RequestError> {
        match result {
            Ok(()) => Ok(None),
            Err(RequestError::SessionExpired | RequestError::NotAuthenticated) => {
                self.expire().await;
                Ok(Some(Screen::Login))
            }
            Err(e) => Err(e),
        }
    }

    async fn expire(&mut self) {
        tracing::info!("Session no longer valid, returning to login");
        self.close_channel().await;
        if let Err(e) = self.navigation.reset() {
            tracing::warn!("Failed to clear navigation state: {}", e);
        }
    }
}
