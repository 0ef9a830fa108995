//! HTTP SSE client for a notification server.

use std::time::Duration;

use futures::Stream;
use tracing::{debug, info};

use mcp_relay_core::config::ServerConfig;
use mcp_relay_core::notification::RawNotification;

use crate::notifications::{merge_notifications, server_notifications, NotificationStream};
use crate::sse::{parse_sse_stream, SseStream};

/// Opens the SSE stream a notification server pushes on.
#[derive(Debug, Clone)]
pub struct SseClient {
    client: reqwest::Client,
    url: String,
    name: String,
}

impl SseClient {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> anyhow::Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            name: url.clone(),
            url,
        })
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let mut client = Self::new(
            config.url.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )?;
        if let Some(name) = &config.name {
            client.name = name.clone();
        }
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the raw SSE event stream.
    pub async fn connect(&self) -> anyhow::Result<SseStream> {
        debug!(server = %self.name, url = %self.url, "Opening SSE stream");

        let response = self
            .client
            .get(&self.url)
            .header("accept", "text/event-stream")
            .header("cache-control", "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("SSE server {} returned {status}: {body}", self.name);
        }

        info!(server = %self.name, "Connected to notification stream");
        Ok(Box::pin(parse_sse_stream(response)))
    }

    /// Open the notification stream, merged with forwarded logging
    /// notifications and terminated by the end-of-stream sentinel.
    pub async fn notifications<L>(&self, logging: L) -> anyhow::Result<NotificationStream>
    where
        L: Stream<Item = RawNotification> + Send + 'static,
    {
        let sse = self.connect().await?;
        Ok(merge_notifications(server_notifications(sse), logging))
    }
}
