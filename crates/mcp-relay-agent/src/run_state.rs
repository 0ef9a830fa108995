//! The narrow contract the relay needs from a live agent run.

use async_trait::async_trait;
use mcp_relay_core::types::{RunItem, RunItemStreamEvent};
use tokio::sync::mpsc;

/// A live, externally owned agent run that the relay splices history into.
///
/// The relay only appends completed items, pushes lifecycle events, and
/// optionally asks the run to advance by one step. Nothing else on the run
/// is touched.
#[async_trait]
pub trait RunState: Send {
    /// Event type produced by the primary execution stream.
    type Event: Send;

    fn append_history_item(&mut self, item: RunItem);

    fn push_event(&mut self, event: RunItemStreamEvent);

    /// Continue execution by one step, surfacing the event it produced.
    async fn advance_one_step(&mut self) -> anyhow::Result<Option<Self::Event>>;
}

/// Run state with no execution engine attached.
///
/// History lives in memory and lifecycle events go to an unbounded channel.
/// Advancing is a no-op.
#[derive(Debug)]
pub struct InMemoryRunState<E> {
    history: Vec<RunItem>,
    event_tx: mpsc::UnboundedSender<RunItemStreamEvent>,
    _event: std::marker::PhantomData<fn() -> E>,
}

impl<E> InMemoryRunState<E> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RunItemStreamEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                history: Vec::new(),
                event_tx,
                _event: std::marker::PhantomData,
            },
            event_rx,
        )
    }

    pub fn history(&self) -> &[RunItem] {
        &self.history
    }
}

#[async_trait]
impl<E: Send> RunState for InMemoryRunState<E> {
    type Event = E;

    fn append_history_item(&mut self, item: RunItem) {
        self.history.push(item);
    }

    fn push_event(&mut self, event: RunItemStreamEvent) {
        // A dropped receiver just means nobody is listening.
        let _ = self.event_tx.send(event);
    }

    async fn advance_one_step(&mut self) -> anyhow::Result<Option<E>> {
        Ok(None)
    }
}
