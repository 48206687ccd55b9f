use std::fmt;

use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::messages::{HistoryMessage, ResponsePart, Usage};
use crate::AgentRuntimeError;

/// Top-level node stream of one run.
pub type NodeStream = BoxStream<'static, Result<RunNode, AgentRuntimeError>>;

/// Low-level part events streamed while a model request is in flight.
pub type PartEventStream = BoxStream<'static, Result<PartEvent, AgentRuntimeError>>;

/// Tool lifecycle events streamed while a call-tools node executes.
pub type ToolEventStream = BoxStream<'static, Result<ToolEvent, AgentRuntimeError>>;

/// A top-level phase of a run.
pub enum RunNode {
    UserPrompt { prompt: String },
    ModelRequest { events: PartEventStream },
    CallTools { events: ToolEventStream },
    End { outcome: RunOutcome },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    UserPrompt,
    ModelRequest,
    CallTools,
    End,
}

impl NodeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserPrompt => "user_prompt",
            Self::ModelRequest => "model_request",
            Self::CallTools => "call_tools",
            Self::End => "end",
        }
    }
}

impl RunNode {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::UserPrompt { .. } => NodeKind::UserPrompt,
            Self::ModelRequest { .. } => NodeKind::ModelRequest,
            Self::CallTools { .. } => NodeKind::CallTools,
            Self::End { .. } => NodeKind::End,
        }
    }
}

impl fmt::Debug for RunNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserPrompt { prompt } => f
                .debug_struct("UserPrompt")
                .field("prompt", prompt)
                .finish(),
            Self::ModelRequest { .. } => f.write_str("ModelRequest { .. }"),
            Self::CallTools { .. } => f.write_str("CallTools { .. }"),
            Self::End { outcome } => f.debug_struct("End").field("outcome", outcome).finish(),
        }
    }
}

/// Final result of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Messages produced by this run, in runtime order.
    pub new_messages: Vec<HistoryMessage>,
    /// Usage incurred by this run alone.
    pub usage: Usage,
}

/// Part-level event inside a model-request node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartEvent {
    /// A new content part begins at `index`, possibly with initial content.
    Start { index: usize, part: ResponsePart },
    /// Incremental update to the part at `index`.
    Delta { index: usize, delta: PartDelta },
}

impl PartEvent {
    #[must_use]
    pub fn text_start(index: usize, content: impl Into<String>) -> Self {
        Self::Start {
            index,
            part: ResponsePart::Text {
                content: content.into(),
            },
        }
    }

    #[must_use]
    pub fn text_delta(index: usize, content: impl Into<String>) -> Self {
        Self::Delta {
            index,
            delta: PartDelta::Text {
                content: content.into(),
            },
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Start { index, .. } | Self::Delta { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartDelta {
    Text {
        content: String,
    },
    /// Raw JSON fragment of tool-call arguments.
    ToolCallArgs {
        call_id: Option<String>,
        tool_name: Option<String>,
        args: String,
    },
    Thinking {
        content: String,
    },
}

/// Tool lifecycle event inside a call-tools node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolEvent {
    CallStarted {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ResultReceived {
        call_id: String,
        tool_name: String,
        content: Value,
    },
}

impl ToolEvent {
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::CallStarted { tool_name, .. } | Self::ResultReceived { tool_name, .. } => {
                tool_name
            }
        }
    }

    #[must_use]
    pub fn call_id(&self) -> &str {
        match self {
            Self::CallStarted { call_id, .. } | Self::ResultReceived { call_id, .. } => call_id,
        }
    }
}
