//! Per-agent conversation state, the session lock, and per-UI-session state.

use std::fmt;

use agent_provider::{HistoryMessage, Usage};

use crate::config::{AgentConfig, AppConfig, AppSettings};
use crate::driver::RunOptions;
use crate::error::SessionError;
use crate::history::DisplayMessage;

/// Conversation with one configured agent.
///
/// `locked` is true exactly while a run is in flight.
pub struct AgentSession {
    agent: AgentConfig,
    pub(crate) history: Vec<HistoryMessage>,
    pub(crate) display_messages: Vec<DisplayMessage>,
    pub(crate) token_usage: Usage,
    locked: bool,
}

impl AgentSession {
    #[must_use]
    pub fn new(agent: &AgentConfig) -> Self {
        Self {
            agent: agent.clone(),
            history: Vec::new(),
            display_messages: Vec::new(),
            token_usage: Usage::default(),
            locked: false,
        }
    }

    #[must_use]
    pub fn agent(&self) -> &AgentConfig {
        &self.agent
    }

    #[must_use]
    pub fn agent_name(&self) -> &str {
        &self.agent.name
    }

    #[must_use]
    pub fn history(&self) -> &[HistoryMessage] {
        &self.history
    }

    #[must_use]
    pub fn display_messages(&self) -> &[DisplayMessage] {
        &self.display_messages
    }

    #[must_use]
    pub fn token_usage(&self) -> Usage {
        self.token_usage
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn try_lock(&mut self) -> Result<(), SessionError> {
        if self.locked {
            return Err(SessionError::locked(self.agent_name()));
        }
        self.locked = true;
        tracing::debug!(agent = %self.agent.name, "session locked");
        Ok(())
    }

    pub(crate) fn unlock(&mut self) {
        if self.locked {
            self.locked = false;
            tracing::debug!(agent = %self.agent.name, "session unlocked");
        }
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), SessionError> {
        if self.locked {
            Err(SessionError::locked(self.agent_name()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSession")
            .field("agent", &self.agent.name)
            .field("history", &self.history.len())
            .field("display_messages", &self.display_messages.len())
            .field("token_usage", &self.token_usage)
            .field("locked", &self.locked)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayPreferences {
    /// Show tool calls, tool returns and other non-text parts.
    pub show_function_calls: bool,
    /// Show transient status labels while a run streams.
    pub show_function_calls_status: bool,
    /// Stream raw tool call/result events next to their status labels.
    pub show_tool_events: bool,
    pub sidebar_collapsed: bool,
}

impl DisplayPreferences {
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            show_function_calls: settings.show_function_calls,
            show_function_calls_status: settings.show_function_calls_status,
            show_tool_events: settings.show_tool_events,
            sidebar_collapsed: settings.sidebar_collapsed,
        }
    }
}

/// Everything one UI session owns: a conversation per configured agent, the
/// current selection, and display preferences.
#[derive(Debug)]
pub struct ChatSession {
    id: String,
    agents: Vec<AgentSession>,
    current: usize,
    pub(crate) preferences: DisplayPreferences,
    share_enabled: bool,
}

impl ChatSession {
    #[must_use]
    pub fn new(id: impl Into<String>, config: &AppConfig, share_enabled: bool) -> Self {
        Self {
            id: id.into(),
            agents: config.agents().iter().map(AgentSession::new).collect(),
            current: 0,
            preferences: DisplayPreferences::from_settings(config.settings()),
            share_enabled,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn current_agent(&self) -> &AgentSession {
        &self.agents[self.current]
    }

    pub fn current_agent_mut(&mut self) -> &mut AgentSession {
        &mut self.agents[self.current]
    }

    #[must_use]
    pub fn current_agent_name(&self) -> &str {
        self.current_agent().agent_name()
    }

    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentSession> {
        self.agents.iter().find(|session| session.agent_name() == name)
    }

    pub fn agent_sessions(&self) -> impl Iterator<Item = &AgentSession> {
        self.agents.iter()
    }

    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.current_agent().agent().greeting
    }

    /// The current agent's sidebar panel, rendered from its dependencies.
    #[must_use]
    pub fn sidebar(&self) -> Option<String> {
        self.current_agent().agent().render_sidebar()
    }

    #[must_use]
    pub fn preferences(&self) -> DisplayPreferences {
        self.preferences
    }

    #[must_use]
    pub fn share_enabled(&self) -> bool {
        self.share_enabled
    }

    /// True while the current agent is running; interactive controls are
    /// disabled until it finishes.
    ///
    /// A [`RunStream`](crate::RunStream) borrows its session mutably, so
    /// safe code holding the stream cannot reach these controls at all. The
    /// flag is advisory and covers hosts that observe the session between
    /// runs.
    #[must_use]
    pub fn widgets_locked(&self) -> bool {
        self.current_agent().is_locked()
    }

    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions::default().with_expose_tool_events(self.preferences.show_tool_events)
    }

    /// Display messages of the current agent visible under the current
    /// preferences.
    pub fn visible_messages(&self) -> impl Iterator<Item = &DisplayMessage> {
        let show = self.preferences.show_function_calls;
        self.current_agent()
            .display_messages()
            .iter()
            .filter(move |message| message.is_visible(show))
    }

    pub(crate) fn ensure_widgets_unlocked(&self) -> Result<(), SessionError> {
        self.current_agent().ensure_unlocked()
    }

    pub(crate) fn select_agent(&mut self, name: &str) -> Result<(), SessionError> {
        self.ensure_widgets_unlocked()?;
        let index = self
            .agents
            .iter()
            .position(|session| session.agent_name() == name)
            .ok_or_else(|| SessionError::UnknownAgent(name.to_string()))?;
        self.current = index;
        Ok(())
    }

    pub(crate) fn disable_share(&mut self) {
        if self.share_enabled {
            tracing::warn!(ui_session = %self.id, "sharing disabled for the rest of the session");
        }
        self.share_enabled = false;
    }
}
