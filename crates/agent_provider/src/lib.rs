//! Provider-neutral contract for driving one agent run.
//!
//! This crate defines the message history model fed back into an agent, the
//! nested streaming shape a run produces (top-level nodes, each optionally
//! carrying its own sub-stream), and the [`AgentRuntime`] trait implemented
//! by concrete agents. It contains no transport, rendering or persistence.

mod accumulator;
mod events;
mod messages;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use accumulator::PartAccumulator;
pub use events::{
    NodeKind, NodeStream, PartDelta, PartEvent, PartEventStream, RunNode, RunOutcome, ToolEvent,
    ToolEventStream,
};
pub use messages::{HistoryMessage, RequestPart, ResponsePart, Usage};

/// Opaque, agent-specific state handed to every run (tool backends, caches).
pub type DependencyContext = Arc<dyn Any + Send + Sync>;

/// Returns an empty dependency context for agents that need none.
#[must_use]
pub fn no_dependencies() -> DependencyContext {
    Arc::new(())
}

/// Error produced by an agent runtime while starting or streaming a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRuntimeError {
    message: String,
}

impl AgentRuntimeError {
    /// Creates a new runtime error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AgentRuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AgentRuntimeError {}

impl From<String> for AgentRuntimeError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for AgentRuntimeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Input required to start one run.
#[derive(Clone)]
pub struct RunInput {
    pub prompt: String,
    pub deps: DependencyContext,
    /// Prior conversation, replayed verbatim as model context.
    pub history: Vec<HistoryMessage>,
    /// Usage accumulated by the session before this run.
    pub usage: Usage,
}

impl fmt::Debug for RunInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunInput")
            .field("prompt", &self.prompt)
            .field("history", &self.history.len())
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

/// Immutable metadata describing an agent runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProfile {
    pub runtime_id: String,
    pub model_id: String,
}

/// Agent runtime interface.
pub trait AgentRuntime: Send + Sync + 'static {
    /// Returns runtime/model identity metadata.
    fn profile(&self) -> RuntimeProfile;

    /// Starts a run and returns its top-level node stream.
    ///
    /// Nodes are produced in execution order. Model-request and call-tools
    /// nodes carry a nested sub-stream that must be drained before the next
    /// node is polled. The final node is [`RunNode::End`], which carries the
    /// messages produced by this run.
    fn start_run(&self, input: RunInput) -> Result<NodeStream, AgentRuntimeError>;
}
