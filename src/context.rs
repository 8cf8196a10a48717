//! Context window helpers
//!
//! Only the most recent messages of a conversation are sent with a request;
//! [`recent_messages`] selects them. Tool steps never leave the process, and
//! messages without content are not worth a slot in the window.
//!
//! Token counts here are character-based approximations (1 token ≈ 4
//! characters). They are good enough for logging and for warning before a
//! server's context limit is hit, not for billing.
//!
//! ```rust
//! use agentloop::{estimate_tokens, recent_messages, Conversation, Message};
//!
//! let mut conversation = Conversation::new();
//! for i in 0..15 {
//!     conversation.push(Message::user(format!("message {}", i)));
//! }
//!
//! let window = recent_messages(&conversation, 10);
//! assert_eq!(window.len(), 10);
//! assert_eq!(window[0].content, "message 5");
//! assert!(estimate_tokens(conversation.items()) > 0);
//! ```

use crate::conversation::{Conversation, ConversationItem, Message};
use crate::types::ChatMessage;

/// Approximate per-message overhead for role formatting, in characters
const MESSAGE_OVERHEAD: usize = 8;
/// Approximate per-request overhead, in characters
const REQUEST_OVERHEAD: usize = 16;

fn chars_to_tokens(chars: usize) -> usize {
    chars.div_ceil(4)
}

/// Estimate the token count of conversation items.
///
/// Tool steps are counted by their name and details, which is what a caller
/// would pay for if it chose to serialise them into a prompt.
pub fn estimate_tokens(items: &[ConversationItem]) -> usize {
    if items.is_empty() {
        return 0;
    }

    let mut total_chars = REQUEST_OVERHEAD;
    for item in items {
        total_chars += MESSAGE_OVERHEAD;
        match item {
            ConversationItem::Message(message) => total_chars += message.content.len(),
            ConversationItem::ToolStep(step) => {
                total_chars += step.tool_name.len();
                total_chars += step
                    .details
                    .iter()
                    .map(|(k, v)| k.len() + v.len())
                    .sum::<usize>();
            }
        }
    }

    chars_to_tokens(total_chars)
}

/// Estimate the token count of an outgoing request's messages.
pub fn estimate_request_tokens(messages: &[ChatMessage]) -> usize {
    if messages.is_empty() {
        return 0;
    }
    let chars: usize = messages
        .iter()
        .map(|m| MESSAGE_OVERHEAD + m.content.len())
        .sum();
    chars_to_tokens(chars + REQUEST_OVERHEAD)
}

/// The last `window` messages that carry content, oldest first.
pub fn recent_messages(conversation: &Conversation, window: usize) -> Vec<&Message> {
    let mut recent: Vec<&Message> = conversation
        .messages()
        .rev()
        .filter(|m| !m.content.trim().is_empty())
        .take(window)
        .collect();
    recent.reverse();
    recent
}

/// Whether the estimate exceeds `margin` (e.g. 0.9) of `limit` tokens.
pub fn is_approaching_limit(items: &[ConversationItem], limit: usize, margin: f32) -> bool {
    let threshold = (limit as f32 * margin) as usize;
    estimate_tokens(items) > threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{ToolStep, ToolStepStatus};
    use std::collections::BTreeMap;

    #[test]
    fn test_estimate_tokens_empty() {
        assert_eq!(estimate_tokens(&[]), 0);
        assert_eq!(estimate_request_tokens(&[]), 0);
    }

    #[test]
    fn test_estimate_tokens_simple() {
        let items = vec![ConversationItem::from(Message::user("Hello world"))];
        // 11 chars + 8 + 16 = 35 chars
        assert_eq!(estimate_tokens(&items), 9);
    }

    #[test]
    fn test_estimate_tokens_counts_tool_steps() {
        let mut details = BTreeMap::new();
        details.insert("date".to_string(), "2024-05-02".to_string());
        let with_step = vec![
            ConversationItem::from(Message::user("hi")),
            ToolStep::new(ToolStepStatus::Result, "calendar_read", details).into(),
        ];
        assert!(estimate_tokens(&with_step) > estimate_tokens(&with_step[..1]));
    }

    #[test]
    fn test_recent_messages_window() {
        let mut conv = Conversation::new();
        for i in 0..12 {
            conv.push(Message::user(format!("m{}", i)));
            conv.push(ToolStep::new(ToolStepStatus::Result, "t", BTreeMap::new()));
        }
        conv.push(Message::assistant("   "));

        let window = recent_messages(&conv, 10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "m2");
        assert_eq!(window[9].content, "m11");

        assert_eq!(recent_messages(&conv, 100).len(), 12);
        assert!(recent_messages(&Conversation::new(), 10).is_empty());
    }

    #[test]
    fn test_is_approaching_limit() {
        let items = vec![ConversationItem::from(Message::user("x".repeat(1000)))];
        assert!(!is_approaching_limit(&items, 1000, 0.9));
        assert!(is_approaching_limit(&items, 200, 0.9));
    }
}
