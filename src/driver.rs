//! Run-loop driver and the synchronous stream it hands to the renderer.
//!
//! A run is driven by a task on the tokio runtime. The task walks the
//! runtime's node stream and every nested sub-stream in production order and
//! pushes normalized events into an unbounded channel, followed by exactly
//! one terminal message. [`RunStream`] drains that channel from a blocking
//! thread, so completion is signalled by the terminal message rather than by
//! the queue running empty.

use agent_provider::{AgentRuntimeError, NodeStream, RunInput, RunNode, RunOutcome, Usage};
use futures_util::StreamExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::error::SessionError;
use crate::history;
use crate::normalizer::{
    normalize_part, normalize_tool, RenderEvent, ANSWERING_STATUS, RUN_FAILED_STATUS,
};
use crate::session::AgentSession;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Emit raw tool call/result events ahead of their status labels.
    pub expose_tool_events: bool,
}

impl RunOptions {
    #[must_use]
    pub fn with_expose_tool_events(mut self, expose: bool) -> Self {
        self.expose_tool_events = expose;
        self
    }
}

/// What a completed run committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub committed_messages: usize,
    pub usage: Usage,
    pub render_events: usize,
}

enum DriverMessage {
    Render(RenderEvent),
    Failed(AgentRuntimeError),
    Finished(RunOutcome),
}

/// Starts runs on a tokio runtime for synchronous consumers.
#[derive(Debug, Clone)]
pub struct RunLoopDriver {
    handle: Handle,
}

impl RunLoopDriver {
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Locks `session` and starts a run for `input`.
    ///
    /// The session stays locked until the returned stream reports completion
    /// or failure, or is dropped. If the runtime refuses to start, the lock
    /// is released before the error is returned.
    pub fn execute<'a>(
        &self,
        input: &str,
        session: &'a mut AgentSession,
        options: RunOptions,
    ) -> Result<RunStream<'a>, SessionError> {
        session.try_lock()?;

        let run_input = RunInput {
            prompt: input.to_string(),
            deps: session.agent().deps.clone(),
            history: session.history.clone(),
            usage: session.token_usage,
        };
        let nodes = match session.agent().runtime.start_run(run_input) {
            Ok(nodes) => nodes,
            Err(error) => {
                tracing::warn!(agent = %session.agent_name(), error = %error, "agent run failed to start");
                session.unlock();
                return Err(SessionError::RunExecution(error));
            }
        };

        tracing::info!(
            agent = %session.agent_name(),
            history = session.history.len(),
            "agent run started"
        );

        let (sender, receiver) = mpsc::unbounded_channel();
        let task = self.handle.spawn(drive(nodes, options, sender));

        Ok(RunStream {
            session,
            receiver,
            task: Some(task),
            finished: false,
            failure: None,
            streamed_text: String::new(),
            render_events: 0,
            summary: None,
        })
    }
}

async fn drive(nodes: NodeStream, options: RunOptions, sender: UnboundedSender<DriverMessage>) {
    let terminal = match forward_nodes(nodes, options, &sender).await {
        Ok(Some(outcome)) => DriverMessage::Finished(outcome),
        Ok(None) => DriverMessage::Failed(AgentRuntimeError::new(
            "agent run ended without a final result",
        )),
        Err(error) => DriverMessage::Failed(error),
    };
    // A closed channel means the consumer went away; nothing left to report.
    let _ = sender.send(terminal);
}

/// Forwards render events until the node stream ends, returning the outcome
/// carried by the last end node.
async fn forward_nodes(
    mut nodes: NodeStream,
    options: RunOptions,
    sender: &UnboundedSender<DriverMessage>,
) -> Result<Option<RunOutcome>, AgentRuntimeError> {
    let emit = |event: RenderEvent| sender.send(DriverMessage::Render(event)).is_ok();
    let mut outcome = None;

    while let Some(node) = nodes.next().await {
        match node? {
            RunNode::UserPrompt { .. } => {}
            RunNode::ModelRequest { mut events } => {
                let mut answering = false;
                while let Some(event) = events.next().await {
                    let Some(render) = normalize_part(&event?) else {
                        continue;
                    };
                    if !answering {
                        answering = true;
                        if !emit(RenderEvent::status(ANSWERING_STATUS)) {
                            return Ok(None);
                        }
                    }
                    if !emit(render) {
                        return Ok(None);
                    }
                }
            }
            RunNode::CallTools { mut events } => {
                while let Some(event) = events.next().await {
                    for render in normalize_tool(&event?, options.expose_tool_events) {
                        if !emit(render) {
                            return Ok(None);
                        }
                    }
                }
            }
            RunNode::End { outcome: end } => outcome = Some(end),
        }
    }

    Ok(outcome)
}

/// Ordered, blocking view of one run.
///
/// Yields render events until the run ends. A failure is yielded as a
/// [`RUN_FAILED_STATUS`] label followed by one `Err`, after which the stream
/// is exhausted. `next` blocks the calling
/// thread and must not be called from inside an async task.
pub struct RunStream<'a> {
    session: &'a mut AgentSession,
    receiver: UnboundedReceiver<DriverMessage>,
    task: Option<JoinHandle<()>>,
    finished: bool,
    failure: Option<AgentRuntimeError>,
    streamed_text: String,
    render_events: usize,
    summary: Option<RunSummary>,
}

impl RunStream<'_> {
    #[must_use]
    pub fn session(&self) -> &AgentSession {
        &*self.session
    }

    /// Text streamed so far. Display only; committed history comes from the
    /// runtime's final result.
    #[must_use]
    pub fn streamed_text(&self) -> &str {
        &self.streamed_text
    }

    /// Present once the run completed and its messages were committed.
    #[must_use]
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn complete(&mut self, outcome: RunOutcome) {
        let committed_messages = outcome.new_messages.len();
        if committed_messages > 0 {
            history::commit(self.session, outcome.new_messages);
        }
        self.session.token_usage.absorb(outcome.usage);
        self.summary = Some(RunSummary {
            committed_messages,
            usage: outcome.usage,
            render_events: self.render_events,
        });
        self.settle();

        tracing::info!(
            agent = %self.session.agent_name(),
            committed = committed_messages,
            events = self.render_events,
            "agent run finished"
        );
    }

    /// Settles the run and queues `error` behind the failure status.
    fn fail(&mut self, error: AgentRuntimeError) -> RenderEvent {
        self.settle();
        tracing::error!(
            agent = %self.session.agent_name(),
            events = self.render_events,
            error = %error,
            "agent run failed"
        );
        self.failure = Some(error);
        RenderEvent::status(RUN_FAILED_STATUS)
    }

    fn settle(&mut self) {
        self.finished = true;
        self.task = None;
        self.session.unlock();
    }
}

impl Iterator for RunStream<'_> {
    type Item = Result<RenderEvent, SessionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.failure.take() {
            return Some(Err(SessionError::RunExecution(error)));
        }
        if self.finished {
            return None;
        }

        match self.receiver.blocking_recv() {
            Some(DriverMessage::Render(event)) => {
                if let Some(text) = event.text() {
                    self.streamed_text.push_str(text);
                }
                self.render_events += 1;
                Some(Ok(event))
            }
            Some(DriverMessage::Finished(outcome)) => {
                self.complete(outcome);
                None
            }
            Some(DriverMessage::Failed(error)) => Some(Ok(self.fail(error))),
            None => {
                // The driving task is gone without a terminal message (it
                // panicked or the runtime shut down).
                let error = AgentRuntimeError::new("agent run stopped unexpectedly");
                Some(Ok(self.fail(error)))
            }
        }
    }
}

impl Drop for RunStream<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.session.unlock();
        tracing::info!(
            agent = %self.session.agent_name(),
            events = self.render_events,
            "agent run cancelled"
        );
    }
}
