#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agent_chat::agent_provider::{
    AgentRuntime, AgentRuntimeError, HistoryMessage, NodeStream, PartEvent, PartEventStream,
    RunInput, RunNode, RunOutcome, RuntimeProfile, Usage,
};
use agent_chat::session_store::{KvStore, MemoryStore, StoreError};
use agent_chat::{AgentConfig, AppConfig, AppSettings, RenderEvent, RunStream, SessionError};
use agent_provider_mock::ScriptedRuntime;
use futures_util::stream::{self, StreamExt};

pub const DAY: u64 = 86_400;

pub fn tokio_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime should build")
}

pub fn settings_with_ttl(ttl_seconds: u64) -> AppSettings {
    AppSettings {
        share_chat_ttl_seconds: ttl_seconds,
        ..AppSettings::default()
    }
}

pub fn scripted_agent(name: &str, runtime: ScriptedRuntime) -> AgentConfig {
    AgentConfig::new(Arc::new(runtime)).with_name(name)
}

pub fn config_with(agents: Vec<AgentConfig>) -> Arc<AppConfig> {
    Arc::new(AppConfig::new(settings_with_ttl(DAY), agents).expect("config should validate"))
}

/// Echo agents named `names`, in order.
pub fn echo_config(names: &[&str]) -> Arc<AppConfig> {
    config_with(
        names
            .iter()
            .map(|name| scripted_agent(name, ScriptedRuntime::new()))
            .collect(),
    )
}

/// Drains a run, returning its render events or the first failure.
pub fn drain(stream: RunStream<'_>) -> Result<Vec<RenderEvent>, SessionError> {
    stream.collect()
}

pub fn texts(events: &[RenderEvent]) -> String {
    events.iter().filter_map(RenderEvent::text).collect()
}

/// Runtime that answers every prompt with one fixed text response and
/// reports only that response as the run's new messages.
pub struct FixedAnswerRuntime {
    answer: String,
}

impl FixedAnswerRuntime {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

impl AgentRuntime for FixedAnswerRuntime {
    fn profile(&self) -> RuntimeProfile {
        RuntimeProfile {
            runtime_id: "fixed".to_string(),
            model_id: "fixed-answer".to_string(),
        }
    }

    fn start_run(&self, input: RunInput) -> Result<NodeStream, AgentRuntimeError> {
        let parts: PartEventStream =
            stream::iter(vec![Ok(PartEvent::text_start(0, self.answer.clone()))]).boxed();
        let outcome = RunOutcome {
            new_messages: vec![HistoryMessage::text_response(self.answer.clone())],
            usage: Usage {
                requests: 1,
                request_tokens: 3,
                response_tokens: 1,
            },
        };

        Ok(stream::iter(vec![
            Ok(RunNode::UserPrompt {
                prompt: input.prompt,
            }),
            Ok(RunNode::ModelRequest { events: parts }),
            Ok(RunNode::End { outcome }),
        ])
        .boxed())
    }
}

/// Memory store that can be switched into a failing state.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Command("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KvStore for FlakyStore {
    fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(key, value, ttl_seconds)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.get(key)
    }

    fn size(&self) -> Result<u64, StoreError> {
        self.check()?;
        self.inner.size()
    }
}
