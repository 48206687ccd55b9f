//! Session orchestration for streaming chat agents.
//!
//! # Public API Overview
//! - Drive one agent run and drain its ordered [`RenderEvent`]s synchronously
//!   through [`RunLoopDriver`] and [`RunStream`].
//! - Keep per-agent history and its [`DisplayMessage`] projection in
//!   [`AgentSession`]; commit, clear and restore through [`history`].
//! - Route UI sessions, agent selection, sharing and rehydration through
//!   [`SessionCoordinator`].
//!
//! Runs execute on a tokio runtime supplied by the host. Stream consumption
//! blocks the calling thread, so hosts drain [`RunStream`] from a plain
//! thread, never from inside an async task.

pub mod config;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod history;
pub mod normalizer;
pub mod session;
pub mod share;

pub use crate::config::{
    AgentConfig, AppConfig, AppSettings, SidebarHook, CONFIG_PATH_ENV_VAR,
    DEFAULT_SHARE_CHAT_TTL_SECONDS, MENU_ITEM_KEYS,
};
pub use crate::coordinator::SessionCoordinator;
pub use crate::driver::{RunLoopDriver, RunOptions, RunStream, RunSummary};
pub use crate::error::{ConfigError, SessionError};
pub use crate::history::{DisplayBlock, DisplayMessage, DisplayRole};
pub use crate::normalizer::{RenderEvent, ANSWERING_STATUS, RUN_FAILED_STATUS};
pub use crate::session::{AgentSession, ChatSession, DisplayPreferences};

pub use agent_provider;
pub use session_store;
