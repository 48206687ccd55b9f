//! Deterministic scripted implementation of the `agent_provider` contract.
//!
//! Each run replays one queued script turn (or an echo turn when the queue is
//! empty). Streams are genuinely asynchronous: every item is produced after a
//! cooperative yield or an optional delay, so consumers exercise the same
//! suspension points as with a networked runtime.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use agent_provider::{
    AgentRuntime, AgentRuntimeError, HistoryMessage, NodeStream, PartAccumulator, PartEvent,
    PartEventStream, RequestPart, RunInput, RunNode, RunOutcome, RuntimeProfile, ToolEvent,
    ToolEventStream, Usage,
};
use futures_util::StreamExt;

/// Stable runtime identifier used for explicit startup selection.
pub const MOCK_RUNTIME_ID: &str = "mock";

/// One scripted phase of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// A model request streaming the given part events.
    Model(Vec<PartEvent>),
    /// A model request whose sub-stream fails after the given events.
    ModelFailure {
        events: Vec<PartEvent>,
        error: String,
    },
    /// A call-tools phase streaming the given tool events.
    Tools(Vec<ToolEvent>),
    /// The run fails at the top level.
    Fail(String),
}

/// What the runtime received when a run was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRun {
    pub prompt: String,
    pub history: Vec<HistoryMessage>,
    pub usage: Usage,
}

/// Scripted runtime used by tests and local runs.
#[derive(Debug)]
pub struct ScriptedRuntime {
    model_id: String,
    turns: Mutex<VecDeque<Vec<ScriptStep>>>,
    instructions: Option<String>,
    item_delay: Option<Duration>,
    observed: Mutex<Vec<ObservedRun>>,
}

impl Default for ScriptedRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRuntime {
    /// Creates a runtime that echoes every prompt.
    #[must_use]
    pub fn new() -> Self {
        Self::with_turns(Vec::new())
    }

    /// Creates a runtime that replays `turns` in order, then falls back to echo.
    #[must_use]
    pub fn with_turns(turns: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            model_id: "mock-model".to_string(),
            turns: Mutex::new(turns.into()),
            instructions: None,
            item_delay: None,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// System prompt prepended to the first request of an empty conversation.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        let instructions = instructions.into();
        let trimmed = instructions.trim();
        self.instructions = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Sleeps for `delay` before every streamed item instead of just yielding.
    #[must_use]
    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Queues another scripted turn.
    pub fn push_turn(&self, steps: Vec<ScriptStep>) {
        lock_unpoisoned(&self.turns).push_back(steps);
    }

    /// Returns every run input observed so far, oldest first.
    #[must_use]
    pub fn observed_runs(&self) -> Vec<ObservedRun> {
        lock_unpoisoned(&self.observed).clone()
    }

    /// Builds the echo turn used when no scripted turn is queued.
    #[must_use]
    pub fn echo_turn(prompt: &str) -> Vec<ScriptStep> {
        let reply = format!("You said: {}", prompt.trim());
        let mut events = Vec::new();
        for token in split_tokens(&reply) {
            if events.is_empty() {
                events.push(PartEvent::text_start(0, token));
            } else {
                events.push(PartEvent::text_delta(0, token));
            }
        }

        vec![ScriptStep::Model(events)]
    }

    fn next_turn(&self, prompt: &str) -> Vec<ScriptStep> {
        lock_unpoisoned(&self.turns)
            .pop_front()
            .unwrap_or_else(|| Self::echo_turn(prompt))
    }

    fn planned_outcome(&self, input: &RunInput, steps: &[ScriptStep]) -> RunOutcome {
        let mut request_parts = Vec::new();
        if input.history.is_empty() {
            if let Some(instructions) = &self.instructions {
                request_parts.push(RequestPart::SystemPrompt {
                    content: instructions.clone(),
                });
            }
        }
        request_parts.push(RequestPart::UserPrompt {
            content: input.prompt.clone(),
        });

        let mut new_messages = vec![HistoryMessage::Request {
            parts: request_parts,
        }];
        let mut usage = Usage::default();
        let prompt_tokens = split_tokens(&input.prompt).len() as u64;

        for step in steps {
            match step {
                ScriptStep::Model(events) | ScriptStep::ModelFailure { events, .. } => {
                    let mut accumulator = PartAccumulator::new();
                    for event in events {
                        accumulator.apply(event);
                    }
                    usage.absorb(Usage {
                        requests: 1,
                        request_tokens: prompt_tokens,
                        response_tokens: events.len() as u64,
                    });
                    if let Some(response) = accumulator.finish() {
                        new_messages.push(response);
                    }
                }
                ScriptStep::Tools(events) => {
                    let parts: Vec<RequestPart> = events
                        .iter()
                        .filter_map(|event| match event {
                            ToolEvent::ResultReceived {
                                call_id,
                                tool_name,
                                content,
                            } => Some(RequestPart::ToolReturn {
                                call_id: call_id.clone(),
                                tool_name: tool_name.clone(),
                                content: content.clone(),
                            }),
                            ToolEvent::CallStarted { .. } => None,
                        })
                        .collect();
                    if !parts.is_empty() {
                        new_messages.push(HistoryMessage::Request { parts });
                    }
                }
                ScriptStep::Fail(_) => break,
            }
        }

        RunOutcome {
            new_messages,
            usage,
        }
    }
}

impl AgentRuntime for ScriptedRuntime {
    fn profile(&self) -> RuntimeProfile {
        RuntimeProfile {
            runtime_id: MOCK_RUNTIME_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn start_run(&self, input: RunInput) -> Result<NodeStream, AgentRuntimeError> {
        if input.prompt.trim().is_empty() {
            return Err(AgentRuntimeError::new("prompt must not be empty"));
        }

        lock_unpoisoned(&self.observed).push(ObservedRun {
            prompt: input.prompt.clone(),
            history: input.history.clone(),
            usage: input.usage,
        });

        let steps = self.next_turn(&input.prompt);
        let outcome = self.planned_outcome(&input, &steps);

        Ok(node_stream(input.prompt, steps, outcome, self.item_delay))
    }
}

fn node_stream(
    prompt: String,
    steps: Vec<ScriptStep>,
    outcome: RunOutcome,
    delay: Option<Duration>,
) -> NodeStream {
    async_stream::stream! {
        pause(delay).await;
        yield Ok(RunNode::UserPrompt { prompt });

        let mut failed = false;
        for step in steps {
            pause(delay).await;
            match step {
                ScriptStep::Model(events) => {
                    yield Ok(RunNode::ModelRequest {
                        events: part_stream(events, None, delay),
                    });
                }
                ScriptStep::ModelFailure { events, error } => {
                    yield Ok(RunNode::ModelRequest {
                        events: part_stream(events, Some(error), delay),
                    });
                }
                ScriptStep::Tools(events) => {
                    yield Ok(RunNode::CallTools {
                        events: tool_stream(events, delay),
                    });
                }
                ScriptStep::Fail(error) => {
                    yield Err(AgentRuntimeError::new(error));
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            pause(delay).await;
            yield Ok(RunNode::End { outcome });
        }
    }
    .boxed()
}

fn part_stream(
    events: Vec<PartEvent>,
    failure: Option<String>,
    delay: Option<Duration>,
) -> PartEventStream {
    async_stream::stream! {
        for event in events {
            pause(delay).await;
            yield Ok(event);
        }

        if let Some(error) = failure {
            pause(delay).await;
            yield Err(AgentRuntimeError::new(error));
        }
    }
    .boxed()
}

fn tool_stream(events: Vec<ToolEvent>, delay: Option<Duration>) -> ToolEventStream {
    async_stream::stream! {
        for event in events {
            pause(delay).await;
            yield Ok::<ToolEvent, AgentRuntimeError>(event);
        }
    }
    .boxed()
}

async fn pause(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => tokio::task::yield_now().await,
    }
}

/// Splits text into whitespace-terminated tokens, keeping the whitespace.
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending = String::new();
    for ch in text.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            tokens.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        tokens.push(pending);
    }
    tokens
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
