//! Committed conversation history and its display projection.
//!
//! History only grows by [`commit`]. [`clear`] and [`restore`] replace it
//! wholesale. Every mutation keeps `display_messages[i]` derived from
//! `history[i]`.

use agent_provider::{HistoryMessage, RequestPart, ResponsePart, Usage};
use serde_json::Value;

use crate::session::AgentSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRole {
    User,
    Assistant,
    Tool,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayBlock {
    Text(String),
    ToolCall {
        tool_name: String,
        arguments: String,
    },
    ToolReturn {
        tool_name: String,
        content: String,
    },
    RetryPrompt {
        tool_name: Option<String>,
        content: String,
    },
    Thinking(String),
    SystemPrompt(String),
}

impl DisplayBlock {
    /// Plain conversational text, shown even when full context is hidden.
    #[must_use]
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// Static chat bubble derived from exactly one [`HistoryMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    role: DisplayRole,
    blocks: Vec<DisplayBlock>,
}

impl DisplayMessage {
    #[must_use]
    pub fn from_history(message: &HistoryMessage) -> Self {
        match message {
            HistoryMessage::Request { parts } => Self {
                role: request_role(parts),
                blocks: parts.iter().map(request_block).collect(),
            },
            HistoryMessage::Response { parts } => Self {
                role: DisplayRole::Assistant,
                blocks: parts.iter().map(response_block).collect(),
            },
        }
    }

    #[must_use]
    pub fn role(&self) -> DisplayRole {
        self.role
    }

    #[must_use]
    pub fn blocks(&self) -> &[DisplayBlock] {
        &self.blocks
    }

    pub fn visible_blocks(&self, show_function_calls: bool) -> impl Iterator<Item = &DisplayBlock> {
        self.blocks
            .iter()
            .filter(move |block| show_function_calls || block.is_conversational())
    }

    #[must_use]
    pub fn is_visible(&self, show_function_calls: bool) -> bool {
        self.visible_blocks(show_function_calls).next().is_some()
    }

    /// Concatenated text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|block| match block {
                DisplayBlock::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

fn request_role(parts: &[RequestPart]) -> DisplayRole {
    if parts
        .iter()
        .any(|part| matches!(part, RequestPart::UserPrompt { .. }))
    {
        DisplayRole::User
    } else if parts.iter().any(|part| {
        matches!(
            part,
            RequestPart::ToolReturn { .. } | RequestPart::RetryPrompt { .. }
        )
    }) {
        DisplayRole::Tool
    } else {
        DisplayRole::System
    }
}

fn request_block(part: &RequestPart) -> DisplayBlock {
    match part {
        RequestPart::SystemPrompt { content } => DisplayBlock::SystemPrompt(content.clone()),
        RequestPart::UserPrompt { content } => DisplayBlock::Text(content.clone()),
        RequestPart::ToolReturn {
            tool_name, content, ..
        } => DisplayBlock::ToolReturn {
            tool_name: tool_name.clone(),
            content: render_json(content),
        },
        RequestPart::RetryPrompt {
            tool_name, content, ..
        } => DisplayBlock::RetryPrompt {
            tool_name: tool_name.clone(),
            content: content.clone(),
        },
    }
}

fn response_block(part: &ResponsePart) -> DisplayBlock {
    match part {
        ResponsePart::Text { content } => DisplayBlock::Text(content.clone()),
        ResponsePart::ToolCall {
            tool_name,
            arguments,
            ..
        } => DisplayBlock::ToolCall {
            tool_name: tool_name.clone(),
            arguments: render_json(arguments),
        },
        ResponsePart::Thinking { content } => DisplayBlock::Thinking(content.clone()),
    }
}

fn render_json(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Appends a finished run's messages, one display message per history entry.
pub fn commit(session: &mut AgentSession, new_messages: Vec<HistoryMessage>) {
    session
        .display_messages
        .extend(new_messages.iter().map(DisplayMessage::from_history));
    session.history.extend(new_messages);
}

/// Empties history and display messages and zeroes token usage.
pub fn clear(session: &mut AgentSession) {
    session.history.clear();
    session.display_messages.clear();
    session.token_usage = Usage::default();
}

/// Replaces history with a restored conversation. Token usage is kept.
pub fn restore(session: &mut AgentSession, messages: Vec<HistoryMessage>) {
    session.display_messages = messages.iter().map(DisplayMessage::from_history).collect();
    session.history = messages;
}
