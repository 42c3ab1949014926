//! Streaming phase: one WebSocket, one message per text frame.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::Worker;
use crate::shared::error::ChannelError;
use crate::shared::messaging::ChatMessage;

pub(super) enum StreamEnd {
    Shutdown,
    Failed(ChannelError),
}

pub(super) async fn run(worker: &Worker, url: Url, shutdown: &mut oneshot::Receiver<()>) -> StreamEnd {
    let chat_id = worker.chat_id;
    tracing::info!(chat_id, host = url.host_str().unwrap_or_default(), "Opening message stream");

    // A peer that accepts TCP but never finishes the upgrade counts as a failure.
    let deadline = worker.api.session().config().request_timeout();
    let connected = tokio::select! {
        biased;
        _ = &mut *shutdown => return StreamEnd::Shutdown,
        result = timeout(deadline, connect_async(url.as_str())) => result,
    };
    let socket = match connected {
        Ok(Ok((socket, _response))) => socket,
        Ok(Err(e)) => return StreamEnd::Failed(ChannelError::TransportFailed(e.to_string())),
        Err(_) => {
            return StreamEnd::Failed(ChannelError::TransportFailed(format!(
                "handshake timed out after {:?}",
                deadline
            )))
        }
    };

    let (sink, mut frames) = socket.split();
    *worker.outbound.lock().await = Some(sink);
    tracing::info!(chat_id, "Message stream connected");

    let end = loop {
        tokio::select! {
            biased;
            _ = &mut *shutdown => break StreamEnd::Shutdown,
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(worker, text.as_str()),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("closed by server ({})", f.code))
                        .unwrap_or_else(|| "closed by server".to_string());
                    break StreamEnd::Failed(ChannelError::TransportFailed(reason));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break StreamEnd::Failed(ChannelError::TransportFailed(e.to_string())),
                None => break StreamEnd::Failed(ChannelError::TransportFailed("stream ended".to_string())),
            }
        }
    };

    // Later sends go over HTTP from here on.
    if let Some(mut sink) = worker.outbound.lock().await.take() {
        if matches!(end, StreamEnd::Shutdown) {
            if let Err(e) = sink.close().await {
                tracing::debug!(chat_id, "Error closing stream: {}", e);
            }
        }
    }
    end
}

fn handle_frame(worker: &Worker, text: &str) {
    match serde_json::from_str::<ChatMessage>(text) {
        Ok(message) => worker.deliver(message),
        Err(e) => tracing::warn!(chat_id = worker.chat_id, "Ignoring malformed frame: {}", e),
    }
}
