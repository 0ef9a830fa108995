//! Merges the primary run stream with the notification stream.
//!
//! Both producers are pulled through independently owned [`StreamFuture`]
//! handles that are re-issued after every completion. Each round waits for
//! either handle with a short timeout. Once the primary stream has ended, a
//! run of consecutive empty rounds closes the notification stream and commits
//! whatever text was buffered.

use std::collections::VecDeque;
use std::time::Duration;

use futures::future::{self, Either};
use futures::stream::{Stream, StreamExt, StreamFuture};
use futures::FutureExt;
use tracing::{debug, info};

use mcp_relay_core::config::{HistoryMode, RelaySettings};
use mcp_relay_core::error::RelayError;
use mcp_relay_core::notification::RawNotification;
use mcp_relay_core::types::ResponseEvent;

use crate::extract::extract_text_fragments;
use crate::run_state::RunState;
use crate::splicer::Splicer;
use crate::translator::Translator;

/// Tuning and history policy for one relay.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Upper bound on a single wait for either producer.
    pub poll_interval: Duration,
    /// Consecutive idle polls, after the primary stream ends, before the
    /// notification stream is treated as finished.
    pub idle_grace_ticks: u32,
    pub history_mode: HistoryMode,
    /// Call [`RunState::advance_one_step`] after every history commit.
    pub advance_after_commit: bool,
    pub synthetic_item_id: String,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self::from(&RelaySettings::default())
    }
}

impl From<&RelaySettings> for RelayOptions {
    fn from(settings: &RelaySettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            idle_grace_ticks: settings.idle_grace_ticks,
            history_mode: settings.history_mode,
            advance_after_commit: settings.advance_after_commit,
            synthetic_item_id: settings.synthetic_item_id.clone(),
        }
    }
}

/// One item of the merged output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent<E> {
    /// An event from the primary stream (or from advancing the run), verbatim.
    Primary(E),
    /// A UI event synthesized from notification text.
    Notification(ResponseEvent),
}

impl<E> RelayEvent<E> {
    pub fn as_primary(&self) -> Option<&E> {
        match self {
            RelayEvent::Primary(event) => Some(event),
            RelayEvent::Notification(_) => None,
        }
    }

    pub fn as_notification(&self) -> Option<&ResponseEvent> {
        match self {
            RelayEvent::Primary(_) => None,
            RelayEvent::Notification(event) => Some(event),
        }
    }
}

/// Relay `primary` and `notifications` into one ordered stream.
///
/// Primary events pass through unchanged and in order. Notification text is
/// streamed as synthetic assistant-message events and spliced into
/// `run_state`'s history. The first producer or advance failure is yielded
/// as the last item of the stream.
pub fn relay<'a, P, N, R>(
    primary: P,
    notifications: N,
    run_state: &'a mut R,
    options: RelayOptions,
) -> impl Stream<Item = Result<RelayEvent<R::Event>, RelayError>> + 'a
where
    R: RunState,
    P: Stream<Item = anyhow::Result<R::Event>> + Unpin + 'a,
    N: Stream<Item = anyhow::Result<RawNotification>> + Unpin + 'a,
{
    let mux = Multiplexer::new(primary, notifications, run_state, options);
    futures::stream::unfold(mux, |mut mux| async move {
        let item = mux.next_event().await?;
        Some((item, mux))
    })
}

/// Completions collected in one round.
struct Ready<P: Stream, N: Stream> {
    primary: Option<(Option<P::Item>, P)>,
    notifications: Option<(Option<N::Item>, N)>,
}

/// Wait for the first pending pull to complete, then collect the other one
/// too if it is already done. Completed handles are taken out of their slot.
async fn next_completion<P, N>(
    primary: &mut Option<StreamFuture<P>>,
    notifications: &mut Option<StreamFuture<N>>,
) -> Ready<P, N>
where
    P: Stream + Unpin,
    N: Stream + Unpin,
{
    let first = match (primary.as_mut(), notifications.as_mut()) {
        (Some(p), Some(n)) => match future::select(p, n).await {
            Either::Left((out, _)) => Either::Left(out),
            Either::Right((out, _)) => Either::Right(out),
        },
        (Some(p), None) => Either::Left(p.await),
        (None, Some(n)) => Either::Right(n.await),
        (None, None) => future::pending().await,
    };

    match first {
        Either::Left(out) => {
            *primary = None;
            let other = notifications.as_mut().and_then(|n| n.now_or_never());
            if other.is_some() {
                *notifications = None;
            }
            Ready {
                primary: Some(out),
                notifications: other,
            }
        }
        Either::Right(out) => {
            *notifications = None;
            let other = primary.as_mut().and_then(|p| p.now_or_never());
            if other.is_some() {
                *primary = None;
            }
            Ready {
                primary: other,
                notifications: Some(out),
            }
        }
    }
}

struct Multiplexer<'a, P, N, R: RunState> {
    primary: Option<StreamFuture<P>>,
    notifications: Option<StreamFuture<N>>,
    primary_done: bool,
    notifications_done: bool,
    idle_ticks: u32,
    translator: Translator,
    splicer: Splicer,
    run_state: &'a mut R,
    options: RelayOptions,
    pending: VecDeque<RelayEvent<R::Event>>,
    error: Option<RelayError>,
    failed: bool,
}

impl<'a, P, N, R> Multiplexer<'a, P, N, R>
where
    R: RunState,
    P: Stream<Item = anyhow::Result<R::Event>> + Unpin,
    N: Stream<Item = anyhow::Result<RawNotification>> + Unpin,
{
    fn new(primary: P, notifications: N, run_state: &'a mut R, options: RelayOptions) -> Self {
        Self {
            primary: Some(primary.into_future()),
            notifications: Some(notifications.into_future()),
            primary_done: false,
            notifications_done: false,
            idle_ticks: 0,
            translator: Translator::new(options.synthetic_item_id.clone()),
            splicer: Splicer::new(options.synthetic_item_id.clone()),
            run_state,
            options,
            pending: VecDeque::new(),
            error: None,
            failed: false,
        }
    }

    async fn next_event(&mut self) -> Option<Result<RelayEvent<R::Event>, RelayError>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if let Some(err) = self.error.take() {
                return Some(Err(err));
            }
            if self.failed || (self.primary_done && self.notifications_done) {
                return None;
            }
            if let Err(err) = self.round().await {
                self.abort();
                self.error = Some(err);
            }
        }
    }

    async fn round(&mut self) -> Result<(), RelayError> {
        let waited = tokio::time::timeout(
            self.options.poll_interval,
            next_completion(&mut self.primary, &mut self.notifications),
        )
        .await;

        let Ok(ready) = waited else {
            return self.on_idle().await;
        };
        self.idle_ticks = 0;

        if let Some((item, stream)) = ready.primary {
            self.on_primary(item, stream)?;
        }
        if let Some((item, stream)) = ready.notifications {
            self.on_notification(item, stream).await?;
        }
        Ok(())
    }

    async fn on_idle(&mut self) -> Result<(), RelayError> {
        if !self.primary_done || self.notifications.is_none() {
            return Ok(());
        }

        self.idle_ticks += 1;
        debug!(idle_ticks = self.idle_ticks, "Notification stream idle after primary ended");
        if self.idle_ticks < self.options.idle_grace_ticks {
            return Ok(());
        }

        info!(
            idle_ticks = self.idle_ticks,
            "Notification grace period elapsed, closing notification stream"
        );
        // Dropping the pull cancels it and releases the underlying stream.
        self.notifications = None;
        self.notifications_done = true;
        self.finalize().await
    }

    fn on_primary(&mut self, item: Option<anyhow::Result<R::Event>>, stream: P) -> Result<(), RelayError> {
        match item {
            Some(Ok(event)) => {
                self.pending.push_back(RelayEvent::Primary(event));
                self.primary = Some(stream.into_future());
                Ok(())
            }
            Some(Err(err)) => Err(RelayError::Primary(err)),
            None => {
                debug!("Primary stream ended");
                self.primary_done = true;
                Ok(())
            }
        }
    }

    async fn on_notification(
        &mut self,
        item: Option<anyhow::Result<RawNotification>>,
        stream: N,
    ) -> Result<(), RelayError> {
        match item {
            Some(Ok(notification)) if notification.is_stream_end() => {
                debug!("Notification stream signalled end");
                self.notifications_done = true;
                self.finalize().await
            }
            Some(Ok(notification)) => {
                if notification.is_relevant() {
                    self.handle_notification(&notification).await?;
                } else {
                    debug!(method = %notification.method, "Ignoring non-notification message");
                }
                self.notifications = Some(stream.into_future());
                Ok(())
            }
            Some(Err(err)) => Err(RelayError::Notification(err)),
            None => {
                debug!("Notification stream closed");
                self.notifications_done = true;
                self.finalize().await
            }
        }
    }

    async fn handle_notification(&mut self, notification: &RawNotification) -> Result<(), RelayError> {
        let fragments = extract_text_fragments(notification);
        debug!(method = %notification.method, fragments = fragments.len(), "Relaying notification");

        for fragment in fragments {
            let events = self.translator.translate(std::slice::from_ref(&fragment));
            self.pending
                .extend(events.into_iter().map(RelayEvent::Notification));

            match self.options.history_mode {
                HistoryMode::Burst => self.splicer.record(fragment),
                HistoryMode::PerFragment => {
                    self.splicer.commit_fragment(&mut *self.run_state, &fragment);
                    self.advance().await?;
                }
            }
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), RelayError> {
        let committed = self.splicer.finalize(&mut *self.run_state);
        self.translator.reset();
        if committed {
            self.advance().await?;
        }
        Ok(())
    }

    async fn advance(&mut self) -> Result<(), RelayError> {
        if !self.options.advance_after_commit {
            return Ok(());
        }
        match self.run_state.advance_one_step().await {
            Ok(Some(event)) => {
                debug!("Run advanced one step");
                self.pending.push_back(RelayEvent::Primary(event));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => Err(RelayError::Advance(err)),
        }
    }

    /// Stop both producers after a failure.
    fn abort(&mut self) {
        self.primary = None;
        self.notifications = None;
        self.primary_done = true;
        self.notifications_done = true;
        self.failed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_state::InMemoryRunState;
    use serde_json::json;

    fn text_notification(text: &str) -> anyhow::Result<RawNotification> {
        Ok(RawNotification::new(
            "notifications/message",
            json!({"data": {"type": "text", "text": text}}),
        ))
    }

    #[test]
    fn test_options_from_settings() {
        let options = RelayOptions::default();
        assert_eq!(options.poll_interval, Duration::from_millis(100));
        assert_eq!(options.idle_grace_ticks, 5);
        assert_eq!(options.history_mode, HistoryMode::Burst);
        assert!(!options.advance_after_commit);
        assert_eq!(options.synthetic_item_id, "stream_notification");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_notification_methods_are_ignored() {
        let (mut run, _rx) = InMemoryRunState::<u32>::new();
        let primary = futures::stream::iter(vec![Ok(1u32)]);
        let notifications = futures::stream::iter(vec![
            Ok(RawNotification::new(
                "tools/call",
                json!({"data": {"type": "text", "text": "nope"}}),
            )),
            text_notification("yes"),
        ]);

        let out: Vec<_> = relay(primary, notifications, &mut run, RelayOptions::default())
            .collect()
            .await;
        let deltas: Vec<_> = out
            .iter()
            .filter_map(|r| match r.as_ref().unwrap() {
                RelayEvent::Notification(ResponseEvent::OutputTextDelta { delta, .. }) => Some(delta.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(deltas, vec!["yes"]);
        assert_eq!(run.history().len(), 1);
        assert_eq!(run.history()[0].message().text(), "yes");
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_error_ends_stream() {
        let (mut run, _rx) = InMemoryRunState::<u32>::new();
        let primary = futures::stream::iter(vec![Ok(1u32), Err(anyhow::anyhow!("boom")), Ok(2)]);
        let notifications = futures::stream::pending();

        let out: Vec<_> = relay(primary, notifications, &mut run, RelayOptions::default())
            .collect()
            .await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), &RelayEvent::Primary(1));
        assert!(matches!(out[1], Err(RelayError::Primary(_))));
        assert!(run.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notification_error_is_fatal() {
        let (mut run, _rx) = InMemoryRunState::<u32>::new();
        let primary = futures::stream::pending();
        let notifications = futures::stream::iter(vec![
            text_notification("a"),
            Err(anyhow::anyhow!("transport closed")),
        ]);

        let out: Vec<_> = relay(primary, notifications, &mut run, RelayOptions::default())
            .collect()
            .await;
        let last = out.last().unwrap();
        assert!(matches!(last, Err(RelayError::Notification(_))));
        // The four UI events for "a" were already delivered.
        assert_eq!(out.iter().filter(|r| r.is_ok()).count(), 4);
        // The burst never finished, so nothing was committed.
        assert!(run.history().is_empty());
    }
}
