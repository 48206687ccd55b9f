use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of model-facing conversation history.
///
/// Order is significant: the full sequence is replayed as context on the
/// next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryMessage {
    Request { parts: Vec<RequestPart> },
    Response { parts: Vec<ResponsePart> },
}

impl HistoryMessage {
    /// Request carrying a single user prompt.
    #[must_use]
    pub fn user_prompt(content: impl Into<String>) -> Self {
        Self::Request {
            parts: vec![RequestPart::UserPrompt {
                content: content.into(),
            }],
        }
    }

    /// Response carrying a single text part.
    #[must_use]
    pub fn text_response(content: impl Into<String>) -> Self {
        Self::Response {
            parts: vec![ResponsePart::Text {
                content: content.into(),
            }],
        }
    }

    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request { .. })
    }

    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response { .. })
    }

    /// Concatenated text of user-prompt parts (requests) or text parts (responses).
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Request { parts } => parts
                .iter()
                .filter_map(|part| match part {
                    RequestPart::UserPrompt { content } => Some(content.as_str()),
                    _ => None,
                })
                .collect(),
            Self::Response { parts } => parts
                .iter()
                .filter_map(|part| match part {
                    ResponsePart::Text { content } => Some(content.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "snake_case")]
pub enum RequestPart {
    SystemPrompt {
        content: String,
    },
    UserPrompt {
        content: String,
    },
    ToolReturn {
        call_id: String,
        tool_name: String,
        content: Value,
    },
    /// Asks the model to try again, e.g. after a tool argument validation failure.
    RetryPrompt {
        call_id: Option<String>,
        tool_name: Option<String>,
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "snake_case")]
pub enum ResponsePart {
    Text {
        content: String,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    Thinking {
        content: String,
    },
}

/// Running token usage counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub requests: u64,
    pub request_tokens: u64,
    pub response_tokens: u64,
}

impl Usage {
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.request_tokens.saturating_add(self.response_tokens)
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Adds `other` into `self`; counters saturate instead of wrapping.
    pub fn absorb(&mut self, other: Usage) {
        self.requests = self.requests.saturating_add(other.requests);
        self.request_tokens = self.request_tokens.saturating_add(other.request_tokens);
        self.response_tokens = self.response_tokens.saturating_add(other.response_tokens);
    }
}
