//! Translation of runtime sub-stream events into render events.
//!
//! Each source event maps to zero or more render events, in order, with no
//! buffering across events.

use agent_provider::{PartDelta, PartEvent, ResponsePart, ToolEvent};

pub const ANSWERING_STATUS: &str = "Answering...";
pub const RUN_FAILED_STATUS: &str = "Run failed";

/// One incremental update for the renderer. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// Text appended to the in-progress assistant bubble.
    TextDelta(String),
    /// Transient status label.
    StatusChange(String),
    ToolCallStarted(String),
    ToolResultReceived(String),
}

impl RenderEvent {
    #[must_use]
    pub fn status(label: impl Into<String>) -> Self {
        Self::StatusChange(label.into())
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::TextDelta(text) => Some(text),
            _ => None,
        }
    }
}

#[must_use]
pub fn calling_tool_status(tool_name: &str) -> String {
    format!("Calling tool: {tool_name}")
}

#[must_use]
pub fn processing_result_status(tool_name: &str) -> String {
    format!("Processing {tool_name} result")
}

/// Text carried by a part event, if it should be rendered.
///
/// A part start renders its initial content only for text parts; deltas
/// render only when they are text deltas. Tool-call argument and thinking
/// fragments are dropped from the render stream.
#[must_use]
pub fn normalize_part(event: &PartEvent) -> Option<RenderEvent> {
    let text = match event {
        PartEvent::Start {
            part: ResponsePart::Text { content },
            ..
        } => content,
        PartEvent::Delta {
            delta: PartDelta::Text { content },
            ..
        } => content,
        PartEvent::Start { .. } | PartEvent::Delta { .. } => return None,
    };

    (!text.is_empty()).then(|| RenderEvent::TextDelta(text.clone()))
}

/// Status label for a tool event, preceded by the raw tool event when
/// `expose_tool_events` is set.
pub fn normalize_tool(
    event: &ToolEvent,
    expose_tool_events: bool,
) -> impl Iterator<Item = RenderEvent> {
    let (raw, status) = match event {
        ToolEvent::CallStarted { tool_name, .. } => (
            RenderEvent::ToolCallStarted(tool_name.clone()),
            calling_tool_status(tool_name),
        ),
        ToolEvent::ResultReceived { tool_name, .. } => (
            RenderEvent::ToolResultReceived(tool_name.clone()),
            processing_result_status(tool_name),
        ),
    };

    expose_tool_events
        .then_some(raw)
        .into_iter()
        .chain(std::iter::once(RenderEvent::StatusChange(status)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn call_started(name: &str) -> ToolEvent {
        ToolEvent::CallStarted {
            call_id: "c1".to_string(),
            tool_name: name.to_string(),
            arguments: json!({}),
        }
    }

    fn result_received(name: &str) -> ToolEvent {
        ToolEvent::ResultReceived {
            call_id: "c1".to_string(),
            tool_name: name.to_string(),
            content: json!("ok"),
        }
    }

    #[test]
    fn mixed_part_and_tool_events_translate_in_source_order() {
        enum Source {
            Part(PartEvent),
            Tool(ToolEvent),
        }

        let sources = vec![
            Source::Part(PartEvent::text_start(0, "Hel")),
            Source::Part(PartEvent::text_delta(0, "lo")),
            Source::Tool(call_started("search")),
            Source::Tool(result_received("search")),
            Source::Part(PartEvent::text_start(0, " world")),
        ];

        let rendered: Vec<RenderEvent> = sources
            .iter()
            .flat_map(|source| -> Vec<RenderEvent> {
                match source {
                    Source::Part(event) => normalize_part(event).into_iter().collect(),
                    Source::Tool(event) => normalize_tool(event, false).collect(),
                }
            })
            .collect();

        assert_eq!(
            rendered,
            vec![
                RenderEvent::TextDelta("Hel".to_string()),
                RenderEvent::TextDelta("lo".to_string()),
                RenderEvent::status("Calling tool: search"),
                RenderEvent::status("Processing search result"),
                RenderEvent::TextDelta(" world".to_string()),
            ]
        );
    }

    #[test]
    fn non_text_parts_and_deltas_are_suppressed() {
        let tool_start = PartEvent::Start {
            index: 1,
            part: ResponsePart::ToolCall {
                call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                arguments: json!({}),
            },
        };
        let args_delta = PartEvent::Delta {
            index: 1,
            delta: PartDelta::ToolCallArgs {
                call_id: None,
                tool_name: None,
                args: "{\"q\":".to_string(),
            },
        };
        let thinking = PartEvent::Delta {
            index: 2,
            delta: PartDelta::Thinking {
                content: "hmm".to_string(),
            },
        };

        assert_eq!(normalize_part(&tool_start), None);
        assert_eq!(normalize_part(&args_delta), None);
        assert_eq!(normalize_part(&thinking), None);
        assert_eq!(normalize_part(&PartEvent::text_start(0, "")), None);
    }

    #[test]
    fn exposed_tool_events_precede_their_status() {
        let rendered: Vec<RenderEvent> = normalize_tool(&call_started("fetch"), true)
            .chain(normalize_tool(&result_received("fetch"), true))
            .collect();

        assert_eq!(
            rendered,
            vec![
                RenderEvent::ToolCallStarted("fetch".to_string()),
                RenderEvent::status("Calling tool: fetch"),
                RenderEvent::ToolResultReceived("fetch".to_string()),
                RenderEvent::status("Processing fetch result"),
            ]
        );
    }
}
