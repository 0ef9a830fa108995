//! Server-Sent Events line parser.
//!
//! Converts a byte stream (usually a `reqwest::Response` body) into a
//! `Stream<Item = SseEvent>`.

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use tokio_stream::StreamExt;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Events without an explicit `event:` field default to `message`.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>;

/// A boxed, owned SSE event stream.
pub type SseStream = Pin<Box<dyn Stream<Item = anyhow::Result<SseEvent>> + Send>>;

/// Parse a reqwest response body as an SSE stream.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = anyhow::Result<SseEvent>> + Send {
    parse_sse_bytes(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| anyhow::anyhow!("SSE stream error: {e}"))),
    )
}

/// Parse any byte stream as SSE.
pub fn parse_sse_bytes<S>(byte_stream: S) -> impl Stream<Item = anyhow::Result<SseEvent>> + Send
where
    S: Stream<Item = anyhow::Result<Bytes>> + Send + 'static,
{
    futures::stream::unfold(
        SseState {
            byte_stream: Box::pin(byte_stream),
            buffer: String::new(),
            incomplete_utf8: Vec::new(),
            current_event: None,
            current_data: Vec::new(),
            current_id: None,
            finished: false,
        },
        |mut state| async move {
            loop {
                if let Some(newline_pos) = state.buffer.find('\n') {
                    let line = state.buffer[..newline_pos].trim_end_matches('\r').to_string();
                    state.buffer.drain(..=newline_pos);

                    if line.is_empty() {
                        // Empty line = dispatch event
                        if let Some(event) = state.take_event() {
                            return Some((Ok(event), state));
                        }
                        continue;
                    }

                    if line.starts_with(':') {
                        // Comment / keep-alive
                        continue;
                    }

                    if let Some(value) = line.strip_prefix("event:") {
                        state.current_event = Some(value.trim_start().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        state.current_data.push(value.trim_start().to_string());
                    } else if let Some(value) = line.strip_prefix("id:") {
                        state.current_id = Some(value.trim_start().to_string());
                    }
                    continue;
                }

                if state.finished {
                    return state.take_event().map(|event| (Ok(event), state));
                }

                match state.byte_stream.next().await {
                    Some(Ok(chunk)) => state.push_chunk(&chunk),
                    Some(Err(e)) => {
                        return Some((Err(e), state));
                    }
                    None => {
                        state.finished = true;
                        if !state.incomplete_utf8.is_empty() {
                            let tail = std::mem::take(&mut state.incomplete_utf8);
                            state.buffer.push_str(&String::from_utf8_lossy(&tail));
                        }
                        // A trailing line without a newline still counts.
                        if !state.buffer.is_empty() {
                            state.buffer.push('\n');
                        }
                    }
                }
            }
        },
    )
}

struct SseState {
    byte_stream: ByteStream,
    buffer: String,
    /// Bytes of a UTF-8 sequence split across chunk boundaries.
    incomplete_utf8: Vec<u8>,
    current_event: Option<String>,
    current_data: Vec<String>,
    current_id: Option<String>,
    finished: bool,
}

impl SseState {
    /// Append the decodable prefix of `chunk` and keep a trailing partial
    /// character for the next chunk.
    fn push_chunk(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.incomplete_utf8);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to() guarantees this prefix is UTF-8.
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            self.incomplete_utf8 = after.to_vec();
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                    }
                }
            }
        }
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            self.current_event = None;
            return None;
        }
        let event = SseEvent {
            event: self.current_event.take(),
            data: self.current_data.join("\n"),
            id: self.current_id.take(),
        };
        self.current_data.clear();
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &'static [&'static str]) -> impl Stream<Item = anyhow::Result<Bytes>> + Send + 'static {
        let owned: Vec<anyhow::Result<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        futures::stream::iter(owned)
    }

    async fn collect(parts: &'static [&'static str]) -> Vec<SseEvent> {
        let stream = parse_sse_bytes(chunks(parts));
        let mut stream = std::pin::pin!(stream);
        let mut out = Vec::new();
        while let Some(event) = stream.next().await {
            out.push(event.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_parses_split_chunks() {
        let events = collect(&["event: mess", "age\ndata: {\"a\":", "1}\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "message");
        assert_eq!(events[0].data, r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_multiline_data_and_comments() {
        let events = collect(&[": keep-alive\r\n", "data: one\r\ndata: two\r\nid: 7\r\n\r\n"]).await;
        assert_eq!(
            events,
            vec![SseEvent {
                event: None,
                data: "one\ntwo".into(),
                id: Some("7".into()),
            }]
        );
    }

    #[tokio::test]
    async fn test_event_type_defaults_to_message() {
        let events = collect(&["event: endpoint\ndata: /messages?session=1\n\ndata: x\n\n"]).await;
        assert_eq!(events[0].event_type(), "endpoint");
        assert_eq!(events[1].event_type(), "message");
    }

    #[tokio::test]
    async fn test_flushes_pending_event_at_end() {
        let events = collect(&["data: tail"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "tail");
    }

    fn raw_chunks(parts: Vec<&'static [u8]>) -> impl Stream<Item = anyhow::Result<Bytes>> + Send + 'static {
        futures::stream::iter(parts.into_iter().map(|p| Ok(Bytes::from_static(p))).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        let stream = parse_sse_bytes(raw_chunks(vec![&b"data: caf\xC3"[..], &b"\xA9 \xE2\x82"[..], &b"\xAC\n\n"[..]]));
        let events: Vec<_> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "café €");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let stream = parse_sse_bytes(raw_chunks(vec![&b"data: a\xFFb\n\n"[..], &b"data: end\xC3"[..]]));
        let events: Vec<_> = stream.map(|e| e.unwrap()).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "a\u{FFFD}b");
        assert_eq!(events[1].data, "end\u{FFFD}");
    }

    #[tokio::test]
    async fn test_transport_error_is_surfaced() {
        let stream = parse_sse_bytes(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"data: a\n\n")),
            Err(anyhow::anyhow!("connection reset")),
        ]));
        let mut stream = std::pin::pin!(stream);
        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());
    }
}
