use std::path::PathBuf;

use agent_provider::AgentRuntimeError;
use session_store::{ShareError, StoreError};
use thiserror::Error;

/// Invalid or unreadable application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("at least one agent must be configured")]
    NoAgents,

    #[error("agent names must not be empty")]
    EmptyAgentName,

    #[error("agent '{0}' is configured more than once")]
    DuplicateAgent(String),

    #[error("menu item '{0}' is not one of \"Get Help\", \"Report a Bug\", \"About\"")]
    UnknownMenuItem(String),

    #[error("share_chat_ttl_seconds must be greater than zero")]
    ZeroShareTtl,
}

impl ConfigError {
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}

/// Every failure an orchestrator operation can report to the host.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("agent run failed: {0}")]
    RunExecution(#[source] AgentRuntimeError),

    #[error("failed to encode or decode shared session: {0}")]
    Serialization(#[source] ShareError),

    #[error("shared session store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("shared session '{key}' is missing or expired")]
    SessionNotFound { key: String },

    #[error("shared session '{key}' requires agent '{agent}', which is not configured")]
    AgentBinding { key: String, agent: String },

    #[error("agent '{agent}' is still running")]
    SessionLocked { agent: String },

    #[error("unknown UI session '{0}'")]
    UnknownSession(String),

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("session sharing is disabled")]
    ShareDisabled,
}

impl SessionError {
    #[must_use]
    pub fn locked(agent: impl Into<String>) -> Self {
        Self::SessionLocked {
            agent: agent.into(),
        }
    }

    #[must_use]
    pub fn unknown_session(ui_session: impl Into<String>) -> Self {
        Self::UnknownSession(ui_session.into())
    }

    /// Classifies a share-layer failure.
    ///
    /// Records that exist but cannot be decoded count as serialization
    /// failures; only a missing key is reported as not found.
    #[must_use]
    pub fn from_share(error: ShareError) -> Self {
        match error {
            ShareError::NotFound { key } => Self::SessionNotFound { key },
            ShareError::Store(source) => Self::StoreUnavailable(source),
            other => Self::Serialization(other),
        }
    }

    /// True only when the operation cannot fall back to a usable session.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AgentBinding { .. })
    }

    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Short, user-facing notification text.
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::RunExecution(error) => format!("The agent stopped with an error: {error}"),
            Self::Serialization(_) => "This conversation could not be shared or restored.".to_string(),
            Self::StoreUnavailable(_) => {
                "Sharing is unavailable right now; chat continues normally.".to_string()
            }
            Self::SessionNotFound { .. } => {
                "This shared link has expired. Starting a new conversation.".to_string()
            }
            Self::AgentBinding { agent, .. } => {
                format!("This shared conversation needs the agent '{agent}', which is not available here.")
            }
            Self::SessionLocked { .. } => "Please wait for the current response to finish.".to_string(),
            Self::UnknownSession(_) => "This session is no longer active.".to_string(),
            Self::UnknownAgent(name) => format!("There is no agent named '{name}'."),
            Self::ShareDisabled => "Sharing is not enabled for this session.".to_string(),
        }
    }
}
