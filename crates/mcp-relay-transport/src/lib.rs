//! Notification transport.
//!
//! Opens a server's SSE stream, keeps the `notifications/*` messages, merges
//! in logging notifications forwarded by the client session, and terminates
//! the result with an in-band end-of-stream sentinel.

pub mod client;
pub mod notifications;
pub mod sse;

pub use client::SseClient;
pub use notifications::{
    logging_channel, merge_notifications, server_notifications, LoggingSender, NotificationStream,
};
pub use sse::{parse_sse_bytes, parse_sse_stream, SseEvent, SseStream};
