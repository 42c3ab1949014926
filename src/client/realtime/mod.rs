//! # Realtime Chat Channel
//!
//! Delivers new messages for one open chat thread, whatever the transport.
//!
//! ## State machine
//!
//! ```text
//! idle --open()--> streaming --transport closed/failed--> polling
//!                      |                                     |
//!                      +--------------close()----------------+--> closed
//! ```
//!
//! - **streaming**: a WebSocket to `/ws/chat/{id}/?token=<access>`. Every
//!   inbound frame is one message.
//! - **polling**: entered the first time the socket closes or fails to
//!   connect, and never left until `close()`. Every tick fetches the full
//!   history and delivers it message by message in server order; consumers
//!   must tolerate redelivery.
//! - **closed**: `close()` signals the worker and waits for it to exit, so
//!   no message or poll tick can be observed once it returns.
//!
//! Only one channel should be open at a time; the view layer closes the
//! current channel before opening another. [`active_channels`] reports how
//! many workers are alive.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use xffeed::client::{FeedApi, RealtimeChannel};
//!
//! # async fn example(api: FeedApi) {
//! let mut channel = RealtimeChannel::open(42, api).await;
//! while let Some(message) = channel.recv().await {
//!     println!("{}", message.display_line());
//! }
//! channel.close().await;
//! # }
//! ```

mod poll;
mod stream;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::client::feed_api::FeedApi;
use crate::client::navigation::ChatId;
use crate::shared::error::RequestError;
use crate::shared::messaging::{ChatMessage, OutgoingFrame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Outbound = Arc<Mutex<Option<SplitSink<Socket, Message>>>>;

static ACTIVE_CHANNELS: AtomicUsize = AtomicUsize::new(0);

/// Number of channel workers currently alive in this process
pub fn active_channels() -> usize {
    ACTIVE_CHANNELS.load(Ordering::SeqCst)
}

/// Transport state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// No channel open
    Idle,
    /// Using (or connecting) the WebSocket
    Streaming,
    /// Fallback polling of the full history
    Polling,
    /// Released
    Closed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Streaming => "streaming",
            ChannelState::Polling => "polling",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How an outbound message left the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRoute {
    /// Written to the open WebSocket
    Streamed,
    /// Posted through the REST endpoint
    Posted,
}

/// A realtime subscription to one chat thread.
pub struct RealtimeChannel {
    chat_id: ChatId,
    api: FeedApi,
    messages: mpsc::UnboundedReceiver<ChatMessage>,
    state: Arc<watch::Sender<ChannelState>>,
    outbound: Outbound,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("chat_id", &self.chat_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RealtimeChannel {
    /// Open a channel for `chat_id`, starting with the streaming transport.
    ///
    /// If no stream URL can be formed (no session) the channel starts
    /// directly in polling.
    pub async fn open(chat_id: ChatId, api: FeedApi) -> Self {
        let url = match api.session().chat_stream_url(chat_id).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(chat_id, "No stream URL for chat: {}", e);
                None
            }
        };
        let poll_interval = api.session().config().poll_interval();
        Self::spawn(chat_id, api, url, poll_interval)
    }

    fn spawn(chat_id: ChatId, api: FeedApi, url: Option<Url>, poll_interval: Duration) -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ChannelState::Streaming);
        let state = Arc::new(state_tx);
        let outbound: Outbound = Arc::new(Mutex::new(None));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            chat_id,
            api: api.clone(),
            messages: message_tx,
            state: state.clone(),
            outbound: outbound.clone(),
            poll_interval,
        };
        ACTIVE_CHANNELS.fetch_add(1, Ordering::SeqCst);
        let task = tokio::spawn(worker.run(url, shutdown_rx));

        Self {
            chat_id,
            api,
            messages: message_rx,
            state,
            outbound,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Watch transport changes
    pub fn state_updates(&self) -> watch::Receiver<ChannelState> {
        self.state.subscribe()
    }

    /// Wait for the next message. Returns `None` once the worker has stopped
    /// and every delivered message has been read.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        self.messages.recv().await
    }

    /// Take every message delivered so far without waiting
    pub fn drain(&mut self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.messages.try_recv() {
            messages.push(message);
        }
        messages
    }

    /// Send a message: over the socket when it is open, otherwise through
    /// the REST endpoint. Nothing is queued or retried.
    pub async fn send(&self, content: &str) -> Result<SendRoute, RequestError> {
        if content.trim().is_empty() {
            return Err(RequestError::Invalid("Please enter a message".to_string()));
        }

        let mut outbound = self.outbound.lock().await;
        if let Some(sink) = outbound.as_mut() {
            let frame = serde_json::to_string(&OutgoingFrame { content: content.to_string() })
                .map_err(|e| RequestError::Invalid(e.to_string()))?;
            sink.send(Message::text(frame))
                .await
                .map_err(|e| RequestError::Network(e.to_string()))?;
            tracing::debug!(chat_id = self.chat_id, "Message sent over stream");
            return Ok(SendRoute::Streamed);
        }
        drop(outbound);

        self.api.send_message(self.chat_id, content).await?;
        tracing::debug!(chat_id = self.chat_id, "Message posted over HTTP");
        Ok(SendRoute::Posted)
    }

    /// Tear the channel down. Returns once the socket is closed, timers are
    /// cancelled and the worker has exited.
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(chat_id = self.chat_id, "Channel worker failed: {}", e);
            }
        }
        self.state.send_replace(ChannelState::Closed);
        tracing::info!(chat_id = self.chat_id, "Channel closed");
    }
}

/// Decrements the live-channel count when the worker exits, however it exits.
struct LiveGuard;

impl Drop for LiveGuard {
    fn drop(&mut self) {
        ACTIVE_CHANNELS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Background half of a channel
struct Worker {
    chat_id: ChatId,
    api: FeedApi,
    messages: mpsc::UnboundedSender<ChatMessage>,
    state: Arc<watch::Sender<ChannelState>>,
    outbound: Outbound,
    poll_interval: Duration,
}

impl Worker {
    async fn run(self, url: Option<Url>, mut shutdown: oneshot::Receiver<()>) {
        let _live = LiveGuard;

        if let Some(url) = url {
            match stream::run(&self, url, &mut shutdown).await {
                stream::StreamEnd::Shutdown => return,
                stream::StreamEnd::Failed(e) => {
                    tracing::warn!(chat_id = self.chat_id, "{}; falling back to polling", e);
                }
            }
        }

        self.state.send_replace(ChannelState::Polling);
        poll::run(&self, &mut shutdown).await;
    }

    fn deliver(&self, message: ChatMessage) {
        // The receiver only goes away with the channel itself.
        let _ = self.messages.send(message);
    }
}
