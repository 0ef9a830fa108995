//! Notification stream assembly.
//!
//! Server notifications arrive as SSE `message` events; logging
//! notifications are forwarded by the client session through an in-process
//! channel. Both are merged into one stream that ends with a single
//! `notifications/stream_end` sentinel once both sources are exhausted.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use mcp_relay_core::notification::RawNotification;

use crate::sse::SseEvent;

/// The notification producer consumed by the relay.
pub type NotificationStream = Pin<Box<dyn Stream<Item = anyhow::Result<RawNotification>> + Send>>;

/// Keep only SSE `message` events whose JSON payload is a `notifications/*`
/// message. Malformed payloads are skipped; transport errors pass through.
pub fn server_notifications<S>(sse: S) -> impl Stream<Item = anyhow::Result<RawNotification>> + Send
where
    S: Stream<Item = anyhow::Result<SseEvent>> + Send,
{
    sse.filter_map(|event| async move {
        let event = match event {
            Ok(event) => event,
            Err(e) => return Some(Err(e)),
        };
        if event.event_type() != "message" {
            return None;
        }
        match serde_json::from_str::<RawNotification>(&event.data) {
            Ok(notification) if notification.is_relevant() => Some(Ok(notification)),
            Ok(other) => {
                debug!(method = %other.method, "Dropping non-notification message");
                None
            }
            Err(e) => {
                debug!(%e, "Skipping malformed SSE payload");
                None
            }
        }
    })
}

/// Sending half of the logging notification channel.
///
/// This is the hook for embedders: whatever receives logging or other
/// `notifications/*` messages outside the SSE stream (an MCP client
/// session's logging callback, or the CLI's `--inject` file) forwards them
/// here. Dropping every sender ends the logging side of the merge.
#[derive(Debug, Clone)]
pub struct LoggingSender {
    tx: mpsc::UnboundedSender<RawNotification>,
}

impl LoggingSender {
    /// Forward logging parameters as a `notifications/logging` message.
    ///
    /// Returns `false` once the receiving side is gone.
    pub fn forward(&self, params: serde_json::Value) -> bool {
        self.tx.send(RawNotification::logging(params)).is_ok()
    }

    /// Forward any notification received by the session. Messages outside
    /// the `notifications/` namespace are dropped.
    pub fn forward_notification(&self, notification: RawNotification) -> bool {
        if !notification.is_relevant() {
            return false;
        }
        self.tx.send(notification).is_ok()
    }
}

/// Create the channel logging notifications travel through.
pub fn logging_channel() -> (LoggingSender, UnboundedReceiverStream<RawNotification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (LoggingSender { tx }, UnboundedReceiverStream::new(rx))
}

/// Interleave server and logging notifications, then emit the sentinel.
pub fn merge_notifications<S, L>(server: S, logging: L) -> NotificationStream
where
    S: Stream<Item = anyhow::Result<RawNotification>> + Send + 'static,
    L: Stream<Item = RawNotification> + Send + 'static,
{
    let merged = futures::stream::select(server, logging.map(Ok));
    Box::pin(merged.chain(futures::stream::once(async {
        debug!("Notification sources exhausted");
        Ok(RawNotification::stream_end())
    })))
}
