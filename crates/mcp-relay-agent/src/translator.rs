//! Turns notification text fragments into streaming UI events.

use mcp_relay_core::types::{OutputMessage, OutputText, ResponseEvent};

/// Only one synthetic message is in flight at a time.
const OUTPUT_INDEX: u32 = 0;

/// Streams notification fragments as a synthetic assistant message.
///
/// The first fragment of a burst announces the message and its first content
/// part. Every fragment then gets its own content slot: a text delta followed
/// by a `content_part.done` carrying the same text.
#[derive(Debug, Clone)]
pub struct Translator {
    item_id: String,
    started: bool,
    next_content_index: u32,
}

impl Translator {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            started: false,
            next_content_index: 0,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn next_content_index(&self) -> u32 {
        self.next_content_index
    }

    /// Translate a batch of fragments. An empty batch produces no events.
    pub fn translate(&mut self, fragments: &[String]) -> Vec<ResponseEvent> {
        let mut events = Vec::with_capacity(fragments.len() * 2 + 2);
        for fragment in fragments {
            self.translate_fragment(fragment, &mut events);
        }
        events
    }

    fn translate_fragment(&mut self, fragment: &str, events: &mut Vec<ResponseEvent>) {
        if !self.started {
            self.started = true;
            self.next_content_index = 0;
            events.push(ResponseEvent::OutputItemAdded {
                item: OutputMessage::in_progress(&self.item_id),
                output_index: OUTPUT_INDEX,
            });
            events.push(ResponseEvent::ContentPartAdded {
                item_id: self.item_id.clone(),
                output_index: OUTPUT_INDEX,
                content_index: 0,
                part: OutputText::new(""),
            });
        }

        let content_index = self.next_content_index;
        events.push(ResponseEvent::OutputTextDelta {
            item_id: self.item_id.clone(),
            output_index: OUTPUT_INDEX,
            content_index,
            delta: fragment.to_string(),
        });
        events.push(ResponseEvent::ContentPartDone {
            item_id: self.item_id.clone(),
            output_index: OUTPUT_INDEX,
            content_index,
            part: OutputText::new(fragment),
        });
        self.next_content_index += 1;
    }

    /// Close the current message; the next fragment starts a fresh one.
    pub fn reset(&mut self) {
        self.started = false;
        self.next_content_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_batch_emits_nothing() {
        let mut t = Translator::new("stream_notification");
        assert!(t.translate(&[]).is_empty());
        assert!(!t.is_started());
    }

    #[test]
    fn test_event_order_for_two_fragments() {
        let mut t = Translator::new("stream_notification");
        let events = t.translate(&frags(&["a", "b"]));

        let kinds: Vec<_> = events.iter().map(|e| (e.kind(), e.content_index())).collect();
        assert_eq!(
            kinds,
            vec![
                ("response.output_item.added", None),
                ("response.content_part.added", Some(0)),
                ("response.output_text.delta", Some(0)),
                ("response.content_part.done", Some(0)),
                ("response.output_text.delta", Some(1)),
                ("response.content_part.done", Some(1)),
            ]
        );

        match &events[0] {
            ResponseEvent::OutputItemAdded { item, .. } => {
                assert_eq!(item.id, "stream_notification");
                assert!(item.content.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match &events[4] {
            ResponseEvent::OutputTextDelta { delta, .. } => assert_eq!(delta, "b"),
            other => panic!("unexpected event: {other:?}"),
        }
        match &events[5] {
            ResponseEvent::ContentPartDone { part, .. } => assert_eq!(part.text, "b"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_start_is_announced_once_across_batches() {
        let mut t = Translator::new("m");
        let first = t.translate(&frags(&["a"]));
        let second = t.translate(&frags(&["b"]));

        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].content_index(), Some(1));
        assert_eq!(t.next_content_index(), 2);
    }

    #[test]
    fn test_reset_starts_a_fresh_message() {
        let mut t = Translator::new("m");
        t.translate(&frags(&["a", "b"]));
        t.reset();

        let events = t.translate(&frags(&["c"]));
        assert_eq!(events[0].kind(), "response.output_item.added");
        assert_eq!(events[2].content_index(), Some(0));
    }
}
