//! Tool-call extraction from model output
//!
//! Models request tools by embedding fenced JSON blocks in their reply:
//!
//! ````text
//! Let me check your calendar.
//! ```json
//! {"tool": "calendar_read", "arguments": {"date": "2024-05-02"}}
//! ```
//! ````
//!
//! A block may also hold an array of such objects. [`extract`] returns every
//! recognised call in textual order together with the reply text that remains
//! once the recognised blocks are cut out.
//!
//! Arrays are all-or-nothing: if one element is not a well-formed call, the
//! whole block is treated as ordinary text. Blocks that fail to parse are also
//! left in place.

use crate::json::JsonObject;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// Opening fence with a case-insensitive `json` tag, non-greedy body, closing fence.
static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json(.*?)```").expect("BUG: fence pattern must compile"));

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub arguments: JsonObject,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: JsonObject) -> Self {
        Self {
            tool: tool.into(),
            arguments,
        }
    }

    /// Arguments as a JSON value, for event payloads.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// Result of scanning one model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Recognised calls, in the order they appear in the text
    pub calls: Vec<ToolCall>,
    /// Text with recognised blocks removed
    pub visible_text: String,
}

impl Extraction {
    pub fn has_calls(&self) -> bool {
        !self.calls.is_empty()
    }
}

/// Scan `text` for fenced JSON tool calls.
///
/// Without any fenced block the text is returned untouched. Otherwise the
/// remaining fragments are concatenated and trimmed.
pub fn extract(text: &str) -> Extraction {
    let mut calls = Vec::new();
    let mut visible = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut saw_block = false;

    for captures in FENCED_JSON.captures_iter(text) {
        saw_block = true;
        let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
            continue;
        };

        match parse_block(body.as_str()) {
            Some(block_calls) => {
                visible.push_str(&text[cursor..whole.start()]);
                cursor = whole.end();
                calls.extend(block_calls);
            }
            None => {
                log::debug!(
                    "leaving fenced block at byte {} in place: not a tool call",
                    whole.start()
                );
            }
        }
    }

    if !saw_block {
        return Extraction {
            calls,
            visible_text: text.to_string(),
        };
    }

    visible.push_str(&text[cursor..]);
    Extraction {
        calls,
        visible_text: visible.trim().to_string(),
    }
}

/// Parse one block body into calls; `None` rejects the whole block.
fn parse_block(body: &str) -> Option<Vec<ToolCall>> {
    let value: Value = match serde_json::from_str(body.trim()) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("fenced block is not valid JSON: {}", e);
            return None;
        }
    };

    match value {
        Value::Array(items) if !items.is_empty() => items.iter().map(parse_call).collect(),
        Value::Object(_) => parse_call(&value).map(|call| vec![call]),
        _ => None,
    }
}

fn parse_call(value: &Value) -> Option<ToolCall> {
    let obj = value.as_object()?;
    let tool = obj.get("tool")?.as_str()?;
    let arguments = obj.get("arguments")?.as_object()?;
    Some(ToolCall::new(tool, arguments.clone()))
}
