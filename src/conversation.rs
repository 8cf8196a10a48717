//! Conversation model
//!
//! A conversation is an ordered, append-only list of [`ConversationItem`]s:
//! either a chat [`Message`] or a [`ToolStep`] describing one tool execution.
//! Only messages are ever sent to the completion endpoint; tool steps exist for
//! observers that render progress.
//!
//! The single permitted mutation of a past item is extending the *open*
//! assistant message, i.e. the last item when it is an assistant message that
//! is still being streamed. [`Conversation`] enforces this by exposing no
//! other mutators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Author of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    /// Parse a role name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "system" => Some(Role::System),
            _ => None,
        }
    }
}

/// A chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    /// Set while an assistant message is still receiving streamed text
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub open: bool,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
            open: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// An empty assistant message that streamed text can be appended to.
    pub fn open_assistant() -> Self {
        Self {
            open: true,
            ..Self::assistant("")
        }
    }
}

/// Lifecycle of a tool execution step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolStepStatus {
    Scheduled,
    Executing,
    Result,
    Error,
    Final,
}

/// Record of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolStep {
    pub id: Uuid,
    pub status: ToolStepStatus,
    pub tool_name: String,
    pub details: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl ToolStep {
    pub fn new(
        status: ToolStepStatus,
        tool_name: impl Into<String>,
        details: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status,
            tool_name: tool_name.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// One entry of a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationItem {
    Message(Message),
    ToolStep(ToolStep),
}

impl ConversationItem {
    pub fn id(&self) -> Uuid {
        match self {
            ConversationItem::Message(m) => m.id,
            ConversationItem::ToolStep(s) => s.id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ConversationItem::Message(m) => m.timestamp,
            ConversationItem::ToolStep(s) => s.timestamp,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            ConversationItem::Message(m) => Some(m),
            ConversationItem::ToolStep(_) => None,
        }
    }
}

impl From<Message> for ConversationItem {
    fn from(message: Message) -> Self {
        ConversationItem::Message(message)
    }
}

impl From<ToolStep> for ConversationItem {
    fn from(step: ToolStep) -> Self {
        ConversationItem::ToolStep(step)
    }
}

/// Append-only list of conversation items
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    items: Vec<ConversationItem>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<ConversationItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationItem> {
        self.items.last()
    }

    /// Append an item. Any open assistant message is closed first.
    pub fn push(&mut self, item: impl Into<ConversationItem>) {
        self.close_open_assistant();
        self.items.push(item.into());
    }

    pub fn push_message(&mut self, role: Role, content: impl Into<String>) {
        self.push(Message::new(role, content));
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ConversationItem>) {
        for item in items {
            self.push(item);
        }
    }

    /// The last item, if it is an assistant message still being streamed.
    pub fn open_assistant(&self) -> Option<&Message> {
        match self.items.last() {
            Some(ConversationItem::Message(m)) if m.open && m.role == Role::Assistant => Some(m),
            _ => None,
        }
    }

    /// Append streamed text to the open assistant message, opening one if needed.
    pub fn extend_open_assistant(&mut self, text: &str) {
        if self.open_assistant().is_none() {
            self.items.push(Message::open_assistant().into());
        }
        if let Some(ConversationItem::Message(m)) = self.items.last_mut() {
            m.content.push_str(text);
        }
    }

    /// Mark the open assistant message as complete, optionally replacing its text.
    ///
    /// Returns `false` when there was no open message.
    pub fn close_open_assistant_with(&mut self, final_text: Option<&str>) -> bool {
        if self.open_assistant().is_none() {
            return false;
        }
        if let Some(ConversationItem::Message(m)) = self.items.last_mut() {
            if let Some(text) = final_text {
                m.content = text.to_string();
            }
            m.open = false;
        }
        true
    }

    pub fn close_open_assistant(&mut self) -> bool {
        self.close_open_assistant_with(None)
    }

    /// Iterate over messages only, oldest first.
    pub fn messages(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.items.iter().filter_map(ConversationItem::as_message)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
