use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use session_store::{KvStore, ShareError, SharedSessionRecord, SharedSessions};
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::driver::{RunLoopDriver, RunStream};
use crate::error::SessionError;
use crate::history;
use crate::session::ChatSession;
use crate::share;

/// Owns every live UI session and routes host callbacks to them.
pub struct SessionCoordinator {
    config: Arc<AppConfig>,
    shared: Option<SharedSessions>,
    driver: RunLoopDriver,
    sessions: HashMap<String, ChatSession>,
}

impl fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("sessions", &self.sessions.len())
            .field("shared", &self.shared)
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    /// `store` is `None` when no shared-session backend is configured.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        store: Option<Arc<dyn KvStore>>,
        runtime: Handle,
    ) -> Self {
        let shared = store.map(|store| SharedSessions::new(store, config.share_ttl_seconds()));
        Self {
            config,
            shared,
            driver: RunLoopDriver::new(runtime),
            sessions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self, ui_session: &str) -> Option<&ChatSession> {
        self.sessions.get(ui_session)
    }

    pub fn session_mut(&mut self, ui_session: &str) -> Option<&mut ChatSession> {
        self.sessions.get_mut(ui_session)
    }

    /// Ensures `ui_session` exists, then rehydrates `shared_key` into it.
    ///
    /// A missing or expired key leaves the fresh session in place and returns
    /// the recoverable error. A key naming an unconfigured agent removes the
    /// session so the host cannot continue with a substitute agent.
    pub fn open(
        &mut self,
        ui_session: &str,
        shared_key: Option<&str>,
    ) -> Result<(), SessionError> {
        if !self.sessions.contains_key(ui_session) {
            let share_enabled = self.probe_store();
            self.sessions.insert(
                ui_session.to_string(),
                ChatSession::new(ui_session, &self.config, share_enabled),
            );
            tracing::info!(ui_session, share_enabled, "session opened");
        }

        let Some(key) = shared_key.map(str::trim).filter(|key| !key.is_empty()) else {
            return Ok(());
        };

        match self.rehydrate(ui_session, key) {
            Err(error) if error.is_fatal() => {
                self.sessions.remove(ui_session);
                tracing::error!(ui_session, key, error = %error, "rejecting shared session");
                Err(error)
            }
            result => result,
        }
    }

    /// Starts a run for the current agent. Blank input is ignored.
    pub fn submit(
        &mut self,
        ui_session: &str,
        input: &str,
    ) -> Result<Option<RunStream<'_>>, SessionError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let chat = self
            .sessions
            .get_mut(ui_session)
            .ok_or_else(|| SessionError::unknown_session(ui_session))?;
        let options = chat.run_options();
        self.driver
            .execute(input, chat.current_agent_mut(), options)
            .map(Some)
    }

    pub fn select_agent(&mut self, ui_session: &str, agent: &str) -> Result<(), SessionError> {
        self.chat_mut(ui_session)?.select_agent(agent)
    }

    pub fn set_show_function_calls(
        &mut self,
        ui_session: &str,
        show: bool,
    ) -> Result<(), SessionError> {
        let chat = self.chat_mut(ui_session)?;
        chat.ensure_widgets_unlocked()?;
        chat.preferences.show_function_calls = show;
        Ok(())
    }

    pub fn set_sidebar_collapsed(
        &mut self,
        ui_session: &str,
        collapsed: bool,
    ) -> Result<(), SessionError> {
        self.chat_mut(ui_session)?.preferences.sidebar_collapsed = collapsed;
        Ok(())
    }

    /// Clears the current agent's conversation and usage.
    pub fn clear(&mut self, ui_session: &str) -> Result<(), SessionError> {
        let chat = self.chat_mut(ui_session)?;
        chat.ensure_widgets_unlocked()?;
        history::clear(chat.current_agent_mut());
        tracing::info!(ui_session, agent = %chat.current_agent_name(), "conversation cleared");
        Ok(())
    }

    /// Stores the current conversation and returns the record written.
    pub fn share(&mut self, ui_session: &str) -> Result<SharedSessionRecord, SessionError> {
        let chat = self
            .sessions
            .get_mut(ui_session)
            .ok_or_else(|| SessionError::unknown_session(ui_session))?;
        chat.ensure_widgets_unlocked()?;
        let shared = match &self.shared {
            Some(shared) if chat.share_enabled() => shared,
            _ => return Err(SessionError::ShareDisabled),
        };

        let snapshot = share::capture(chat);
        shared
            .share(&snapshot)
            .map_err(|error| share_failure(chat, error))
    }

    pub fn close(&mut self, ui_session: &str) -> Option<ChatSession> {
        let closed = self.sessions.remove(ui_session);
        if closed.is_some() {
            tracing::info!(ui_session, "session closed");
        }
        closed
    }

    fn rehydrate(&mut self, ui_session: &str, key: &str) -> Result<(), SessionError> {
        let chat = self
            .sessions
            .get_mut(ui_session)
            .ok_or_else(|| SessionError::unknown_session(ui_session))?;
        chat.ensure_widgets_unlocked()?;
        let shared = match &self.shared {
            Some(shared) if chat.share_enabled() => shared,
            _ => return Err(SessionError::ShareDisabled),
        };

        let record = shared
            .fetch(key)
            .map_err(|error| share_failure(chat, error))?;
        share::ensure_agent_bound(&record, &self.config)?;
        let visited = shared
            .record_visit(&record)
            .map_err(|error| share_failure(chat, error))?;
        share::restore(chat, &visited.snapshot)?;

        tracing::info!(
            ui_session,
            key,
            agent = %visited.snapshot.agent_name,
            access_count = visited.access_count,
            "shared session restored"
        );
        Ok(())
    }

    fn chat_mut(&mut self, ui_session: &str) -> Result<&mut ChatSession, SessionError> {
        self.sessions
            .get_mut(ui_session)
            .ok_or_else(|| SessionError::unknown_session(ui_session))
    }

    fn probe_store(&self) -> bool {
        let Some(shared) = &self.shared else {
            return false;
        };
        match shared.probe() {
            Ok(size) => {
                tracing::info!(size, "shared session store reachable");
                true
            }
            Err(error) => {
                tracing::error!(error = %error, "shared session store unreachable");
                false
            }
        }
    }
}

fn share_failure(chat: &mut ChatSession, error: ShareError) -> SessionError {
    let error = SessionError::from_share(error);
    if error.is_store_unavailable() {
        chat.disable_share();
    }
    tracing::warn!(ui_session = %chat.id(), error = %error, "share operation failed");
    error
}
