//! Raw server notifications as delivered by the transport.

use serde::{Deserialize, Serialize};

/// Namespace every relayed notification method must carry.
pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// In-band sentinel meaning no further notifications will arrive.
pub const STREAM_END_METHOD: &str = "notifications/stream_end";

/// Method used for logging notifications forwarded from the client session.
pub const LOGGING_METHOD: &str = "notifications/logging";

/// A JSON-RPC notification: a method name plus an opaque parameter object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNotification {
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: serde_json::Value,
}

fn empty_params() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl RawNotification {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// The end-of-stream sentinel.
    pub fn stream_end() -> Self {
        Self::new(STREAM_END_METHOD, empty_params())
    }

    /// Wrap logging parameters as a `notifications/logging` notification.
    pub fn logging(params: serde_json::Value) -> Self {
        Self::new(LOGGING_METHOD, params)
    }

    pub fn is_relevant(&self) -> bool {
        self.method.starts_with(NOTIFICATION_PREFIX)
    }

    pub fn is_stream_end(&self) -> bool {
        self.method == STREAM_END_METHOD
    }
}
