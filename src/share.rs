//! Mapping between a live [`ChatSession`] and a stored snapshot.
//!
//! Only the conversation, the agent name and the display toggles are
//! captured. The agent runtime and its dependency context are re-bound from
//! local configuration on restore.

use session_store::{SessionSnapshot, SharedSessionRecord};

use crate::config::AppConfig;
use crate::error::SessionError;
use crate::history;
use crate::session::ChatSession;

#[must_use]
pub fn capture(chat: &ChatSession) -> SessionSnapshot {
    let preferences = chat.preferences();
    SessionSnapshot::new(
        chat.current_agent_name(),
        preferences.show_function_calls,
        preferences.sidebar_collapsed,
        chat.current_agent().history().to_vec(),
    )
}

/// Fails with [`SessionError::AgentBinding`] when the record names an agent
/// that is not configured locally.
pub fn ensure_agent_bound(
    record: &SharedSessionRecord,
    config: &AppConfig,
) -> Result<(), SessionError> {
    if config.agent(&record.snapshot.agent_name).is_some() {
        Ok(())
    } else {
        Err(SessionError::AgentBinding {
            key: record.key.clone(),
            agent: record.snapshot.agent_name.clone(),
        })
    }
}

/// Selects the snapshot's agent and overwrites its conversation and the
/// session's display toggles.
pub fn restore(chat: &mut ChatSession, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
    chat.select_agent(&snapshot.agent_name)?;
    history::restore(chat.current_agent_mut(), snapshot.messages.clone());
    chat.preferences.show_function_calls = snapshot.show_function_calls;
    chat.preferences.sidebar_collapsed = snapshot.sidebar_collapsed;
    Ok(())
}
