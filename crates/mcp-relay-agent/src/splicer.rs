//! Commits relayed notification text into a run's history.

use mcp_relay_core::types::{OutputMessage, RunItem, RunItemStreamEvent};
use tracing::debug;

use crate::run_state::RunState;

/// Accumulates streamed fragments and splices them into run history.
#[derive(Debug, Clone)]
pub struct Splicer {
    item_id: String,
    buffer: Vec<String>,
}

impl Splicer {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            buffer: Vec::new(),
        }
    }

    /// Buffer one fragment for the next [`finalize`](Self::finalize).
    pub fn record(&mut self, fragment: impl Into<String>) {
        self.buffer.push(fragment.into());
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Commit everything buffered as one completed message.
    ///
    /// Returns `false` without touching the run when nothing is buffered, so
    /// repeated calls are safe.
    pub fn finalize<R: RunState + ?Sized>(&mut self, run_state: &mut R) -> bool {
        if self.buffer.is_empty() {
            return false;
        }

        let text = self.buffer.concat();
        let fragments = self.buffer.len();
        self.buffer.clear();

        commit(run_state, OutputMessage::completed(&self.item_id, text));
        debug!(item_id = %self.item_id, fragments, "Spliced notification burst into history");
        true
    }

    /// Commit a single fragment immediately as its own message.
    pub fn commit_fragment<R: RunState + ?Sized>(&self, run_state: &mut R, fragment: &str) {
        let id = format!("notif_{}", uuid::Uuid::new_v4().simple());
        debug!(item_id = %id, "Spliced notification fragment into history");
        commit(run_state, OutputMessage::completed(id, fragment));
    }
}

fn commit<R: RunState + ?Sized>(run_state: &mut R, message: OutputMessage) {
    let item = RunItem::MessageOutput {
        message,
        agent: None,
    };
    run_state.append_history_item(item.clone());
    run_state.push_event(RunItemStreamEvent::message_output_created(item));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_state::InMemoryRunState;
    use mcp_relay_core::types::MessageStatus;

    #[tokio::test]
    async fn test_finalize_concatenates_buffer() {
        let (mut run, mut rx) = InMemoryRunState::<()>::new();
        let mut splicer = Splicer::new("stream_notification");
        splicer.record("4");
        splicer.record("2");

        assert!(splicer.finalize(&mut run));
        assert!(splicer.is_empty());

        let history = run.history();
        assert_eq!(history.len(), 1);
        let msg = history[0].message();
        assert_eq!(msg.id, "stream_notification");
        assert_eq!(msg.status, MessageStatus::Completed);
        assert_eq!(msg.content.len(), 1);
        assert_eq!(msg.text(), "42");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.name, RunItemStreamEvent::MESSAGE_OUTPUT_CREATED);
        assert_eq!(event.item, history[0]);
    }

    #[test]
    fn test_finalize_twice_appends_once() {
        let (mut run, _rx) = InMemoryRunState::<()>::new();
        let mut splicer = Splicer::new("m");
        splicer.record("x");

        assert!(splicer.finalize(&mut run));
        assert!(!splicer.finalize(&mut run));
        assert_eq!(run.history().len(), 1);
    }

    #[test]
    fn test_finalize_empty_is_noop() {
        let (mut run, mut rx) = InMemoryRunState::<()>::new();
        let mut splicer = Splicer::new("m");
        assert!(!splicer.finalize(&mut run));
        assert!(run.history().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_commit_fragment_uses_unique_ids() {
        let (mut run, _rx) = InMemoryRunState::<()>::new();
        let splicer = Splicer::new("m");
        splicer.commit_fragment(&mut run, "a");
        splicer.commit_fragment(&mut run, "b");

        let ids: Vec<_> = run.history().iter().map(|i| i.message().id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert!(ids.iter().all(|id| id.starts_with("notif_")));
        assert!(splicer.is_empty());
    }
}
