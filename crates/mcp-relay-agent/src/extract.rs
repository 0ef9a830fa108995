//! Pull plain-text fragments out of a notification payload.

use mcp_relay_core::notification::RawNotification;
use serde_json::Value;

/// Extract text fragments from a `notifications/*` payload.
///
/// Two payload shapes are recognised:
///
/// 1. An assistant-style content array, `params.content = [{type: "text", text}, ...]`.
///    Every text part contributes one fragment; other parts are skipped.
/// 2. A flat part, `params.data = {type: "text", text}`.
///
/// The content array wins whenever it yields at least one fragment. Anything
/// else produces an empty result, which is not an error.
pub fn extract_text_fragments(notification: &RawNotification) -> Vec<String> {
    let params = &notification.params;

    let fragments: Vec<String> = params
        .get("content")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| is_text_part(part))
                .map(|part| {
                    part.get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();
    if !fragments.is_empty() {
        return fragments;
    }

    let Some(data) = params.get("data") else {
        return Vec::new();
    };
    match data.get("text").and_then(Value::as_str) {
        Some(text) if is_text_part(data) && !text.is_empty() => vec![text.to_string()],
        _ => Vec::new(),
    }
}

fn is_text_part(part: &Value) -> bool {
    part.get("type").and_then(Value::as_str) == Some("text")
}
