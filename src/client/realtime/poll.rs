//! Polling phase: fetch the full history on a fixed interval.

use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{ChannelState, Worker};
use crate::shared::error::RequestError;

pub(super) async fn run(worker: &Worker, shutdown: &mut oneshot::Receiver<()>) {
    let chat_id = worker.chat_id;
    let period = worker.poll_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(chat_id, interval_ms = period.as_millis() as u64, "Polling for messages");

    loop {
        tokio::select! {
            biased;
            _ = &mut *shutdown => return,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            _ = &mut *shutdown => return,
            result = worker.api.messages(chat_id) => result,
        };

        match fetched {
            Ok(messages) => {
                tracing::debug!(chat_id, count = messages.len(), "Poll returned messages");
                for message in messages {
                    worker.deliver(message);
                }
            }
            Err(RequestError::SessionExpired | RequestError::NotAuthenticated) => {
                tracing::info!(chat_id, "Session ended, polling stopped");
                worker.state.send_replace(ChannelState::Closed);
                return;
            }
            Err(e) => tracing::warn!(chat_id, "Message poll failed: {}", e),
        }
    }
}
