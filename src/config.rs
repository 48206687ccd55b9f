//! Application and agent configuration.

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use agent_provider::{no_dependencies, AgentRuntime, DependencyContext};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const CONFIG_PATH_ENV_VAR: &str = "AGENT_CHAT_CONFIG_PATH";

/// Sixty days.
pub const DEFAULT_SHARE_CHAT_TTL_SECONDS: u64 = 60 * 60 * 24 * 60;

pub const MENU_ITEM_KEYS: [&str; 3] = ["Get Help", "Report a Bug", "About"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppSettings {
    pub page_title: String,
    pub page_icon: String,
    pub show_function_calls: bool,
    pub show_function_calls_status: bool,
    /// Stream raw tool call/result events next to their status labels.
    pub show_tool_events: bool,
    pub sidebar_collapsed: bool,
    pub menu_items: BTreeMap<String, Option<String>>,
    pub share_chat_ttl_seconds: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            page_title: "Agents".to_string(),
            page_icon: "🤖".to_string(),
            show_function_calls: true,
            show_function_calls_status: true,
            show_tool_events: false,
            sidebar_collapsed: true,
            menu_items: MENU_ITEM_KEYS
                .iter()
                .map(|key| (key.to_string(), None))
                .collect(),
            share_chat_ttl_seconds: DEFAULT_SHARE_CHAT_TTL_SECONDS,
        }
    }
}

impl AppSettings {
    /// Reads settings from a JSON file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::read(path, source))?;
        let settings: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::parse(path, source))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads the file named by `AGENT_CHAT_CONFIG_PATH`, or defaults when unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        match lookup(CONFIG_PATH_ENV_VAR).and_then(non_empty) {
            Some(path) => Self::from_path(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(key) = self
            .menu_items
            .keys()
            .find(|key| !MENU_ITEM_KEYS.contains(&key.as_str()))
        {
            return Err(ConfigError::UnknownMenuItem(key.clone()));
        }
        if self.share_chat_ttl_seconds == 0 {
            return Err(ConfigError::ZeroShareTtl);
        }
        Ok(())
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Renders an agent's sidebar panel from its dependency context. `None`
/// leaves the panel empty.
pub type SidebarHook = Arc<dyn Fn(&DependencyContext) -> Option<String> + Send + Sync>;

/// One selectable agent: display metadata plus the runtime that drives it.
#[derive(Clone)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    pub greeting: String,
    pub agent_avatar: String,
    pub user_avatar: String,
    pub runtime: Arc<dyn AgentRuntime>,
    pub deps: DependencyContext,
    pub sidebar: Option<SidebarHook>,
}

impl AgentConfig {
    #[must_use]
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            name: "Agent".to_string(),
            description: "An agent.".to_string(),
            greeting: "Hello, how can I assist you today?".to_string(),
            agent_avatar: "👾".to_string(),
            user_avatar: "👤".to_string(),
            runtime,
            deps: no_dependencies(),
            sidebar: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    #[must_use]
    pub fn with_avatars(
        mut self,
        agent_avatar: impl Into<String>,
        user_avatar: impl Into<String>,
    ) -> Self {
        self.agent_avatar = agent_avatar.into();
        self.user_avatar = user_avatar.into();
        self
    }

    #[must_use]
    pub fn with_deps(mut self, deps: DependencyContext) -> Self {
        self.deps = deps;
        self
    }

    #[must_use]
    pub fn with_sidebar(
        mut self,
        sidebar: impl Fn(&DependencyContext) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.sidebar = Some(Arc::new(sidebar));
        self
    }

    /// Sidebar text for the current dependency state.
    #[must_use]
    pub fn render_sidebar(&self) -> Option<String> {
        self.sidebar.as_ref().and_then(|sidebar| sidebar(&self.deps))
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("runtime", &self.runtime.profile())
            .field("sidebar", &self.sidebar.is_some())
            .finish_non_exhaustive()
    }
}

/// Validated settings plus the ordered agent list. The first agent is the
/// default selection of every new session.
#[derive(Debug, Clone)]
pub struct AppConfig {
    settings: AppSettings,
    agents: Vec<AgentConfig>,
}

impl AppConfig {
    pub fn new(settings: AppSettings, agents: Vec<AgentConfig>) -> Result<Self, ConfigError> {
        settings.validate()?;
        if agents.is_empty() {
            return Err(ConfigError::NoAgents);
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if agent.name.trim().is_empty() {
                return Err(ConfigError::EmptyAgentName);
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(ConfigError::DuplicateAgent(agent.name.clone()));
            }
        }

        Ok(Self { settings, agents })
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    #[must_use]
    pub fn agents(&self) -> &[AgentConfig] {
        &self.agents
    }

    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| agent.name == name)
    }

    pub fn agent_names(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|agent| agent.name.as_str())
    }

    #[must_use]
    pub fn share_ttl_seconds(&self) -> u64 {
        self.settings.share_chat_ttl_seconds
    }
}
