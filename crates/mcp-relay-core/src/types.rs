use serde::{Deserialize, Serialize};

/// Role of a synthesized message. The relay only ever speaks as the assistant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Assistant,
}

/// Lifecycle status of an output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    InProgress,
    Completed,
}

/// A single text content part of an output message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "output_text")]
pub struct OutputText {
    pub text: String,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

impl OutputText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            annotations: Vec::new(),
        }
    }
}

/// An assistant output message, either streaming or completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "message")]
pub struct OutputMessage {
    pub id: String,
    pub role: Role,
    pub status: MessageStatus,
    pub content: Vec<OutputText>,
}

impl OutputMessage {
    /// An empty in-progress message, announced before any text arrives.
    pub fn in_progress(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            status: MessageStatus::InProgress,
            content: Vec::new(),
        }
    }

    /// A completed message holding a single text part.
    pub fn completed(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            status: MessageStatus::Completed,
            content: vec![OutputText::new(text)],
        }
    }

    /// Concatenated text of all content parts.
    pub fn text(&self) -> String {
        self.content.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Typed UI events synthesized from notification text.
///
/// Wire names follow the Responses API streaming events so a UI that already
/// renders model output can render relayed notifications unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseEvent {
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        item: OutputMessage,
        output_index: u32,
    },

    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        item_id: String,
        output_index: u32,
        content_index: u32,
        part: OutputText,
    },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        item_id: String,
        output_index: u32,
        content_index: u32,
        delta: String,
    },

    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        item_id: String,
        output_index: u32,
        content_index: u32,
        part: OutputText,
    },
}

impl ResponseEvent {
    /// Wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseEvent::OutputItemAdded { .. } => "response.output_item.added",
            ResponseEvent::ContentPartAdded { .. } => "response.content_part.added",
            ResponseEvent::OutputTextDelta { .. } => "response.output_text.delta",
            ResponseEvent::ContentPartDone { .. } => "response.content_part.done",
        }
    }

    /// Content index, for the events that address a content part.
    pub fn content_index(&self) -> Option<u32> {
        match self {
            ResponseEvent::OutputItemAdded { .. } => None,
            ResponseEvent::ContentPartAdded { content_index, .. }
            | ResponseEvent::OutputTextDelta { content_index, .. }
            | ResponseEvent::ContentPartDone { content_index, .. } => Some(*content_index),
        }
    }
}

/// An entry in a run's item history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunItem {
    #[serde(rename = "message_output_item")]
    MessageOutput {
        message: OutputMessage,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent: Option<String>,
    },
}

impl RunItem {
    pub fn message(&self) -> &OutputMessage {
        match self {
            RunItem::MessageOutput { message, .. } => message,
        }
    }
}

/// Lifecycle event announcing a new run item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunItemStreamEvent {
    pub name: String,
    pub item: RunItem,
}

impl RunItemStreamEvent {
    pub const MESSAGE_OUTPUT_CREATED: &'static str = "message_output_created";

    pub fn message_output_created(item: RunItem) -> Self {
        Self {
            name: Self::MESSAGE_OUTPUT_CREATED.into(),
            item,
        }
    }
}
