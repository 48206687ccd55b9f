use std::collections::BTreeMap;

use serde_json::Value;

use crate::events::{PartDelta, PartEvent};
use crate::messages::{HistoryMessage, ResponsePart};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingPart {
    Text(String),
    Thinking(String),
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: Value,
        raw_args: String,
    },
}

impl PendingPart {
    fn from_start(part: &ResponsePart) -> Self {
        match part {
            ResponsePart::Text { content } => Self::Text(content.clone()),
            ResponsePart::Thinking { content } => Self::Thinking(content.clone()),
            ResponsePart::ToolCall {
                call_id,
                tool_name,
                arguments,
            } => {
                let raw_args = match arguments {
                    Value::String(raw) => raw.clone(),
                    _ => String::new(),
                };
                Self::ToolCall {
                    call_id: call_id.clone(),
                    tool_name: tool_name.clone(),
                    arguments: arguments.clone(),
                    raw_args,
                }
            }
        }
    }

    fn from_delta(delta: &PartDelta) -> Self {
        match delta {
            PartDelta::Text { content } => Self::Text(content.clone()),
            PartDelta::Thinking { content } => Self::Thinking(content.clone()),
            PartDelta::ToolCallArgs {
                call_id,
                tool_name,
                args,
            } => Self::ToolCall {
                call_id: call_id.clone().unwrap_or_default(),
                tool_name: tool_name.clone().unwrap_or_default(),
                arguments: Value::Null,
                raw_args: args.clone(),
            },
        }
    }

    /// Applies a delta of the matching kind. Returns false when kinds differ.
    fn apply(&mut self, delta: &PartDelta) -> bool {
        match (self, delta) {
            (Self::Text(text), PartDelta::Text { content })
            | (Self::Thinking(text), PartDelta::Thinking { content }) => {
                text.push_str(content);
                true
            }
            (
                Self::ToolCall {
                    call_id,
                    tool_name,
                    raw_args,
                    ..
                },
                PartDelta::ToolCallArgs {
                    call_id: delta_call_id,
                    tool_name: delta_tool_name,
                    args,
                },
            ) => {
                if call_id.is_empty() {
                    if let Some(value) = delta_call_id {
                        call_id.clone_from(value);
                    }
                }
                if tool_name.is_empty() {
                    if let Some(value) = delta_tool_name {
                        tool_name.clone_from(value);
                    }
                }
                raw_args.push_str(args);
                true
            }
            _ => false,
        }
    }

    fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    fn into_part(self) -> ResponsePart {
        match self {
            Self::Text(content) => ResponsePart::Text { content },
            Self::Thinking(content) => ResponsePart::Thinking { content },
            Self::ToolCall {
                call_id,
                tool_name,
                arguments,
                raw_args,
            } => {
                let arguments = if raw_args.is_empty() {
                    arguments
                } else {
                    serde_json::from_str(&raw_args).unwrap_or(Value::String(raw_args))
                };
                ResponsePart::ToolCall {
                    call_id,
                    tool_name,
                    arguments,
                }
            }
        }
    }
}

/// Rebuilds a response message from the part events of one model request.
///
/// Every event is recorded, including tool-call argument fragments that
/// never reach a renderer. Parts are ordered by their part index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartAccumulator {
    parts: BTreeMap<usize, PendingPart>,
    rejected: usize,
}

impl PartAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &PartEvent) {
        match event {
            PartEvent::Start { index, part } => {
                self.parts.insert(*index, PendingPart::from_start(part));
            }
            PartEvent::Delta { index, delta } => match self.parts.get_mut(index) {
                Some(pending) => {
                    if !pending.apply(delta) {
                        self.rejected += 1;
                    }
                }
                None => {
                    self.parts.insert(*index, PendingPart::from_delta(delta));
                }
            },
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Number of deltas dropped because their kind did not match the part.
    #[must_use]
    pub fn rejected_deltas(&self) -> usize {
        self.rejected
    }

    /// Text accumulated so far across all text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts.values().filter_map(PendingPart::text).collect()
    }

    /// Finalizes the response; `None` when no part was ever started.
    #[must_use]
    pub fn finish(self) -> Option<HistoryMessage> {
        if self.parts.is_empty() {
            return None;
        }

        Some(HistoryMessage::Response {
            parts: self
                .parts
                .into_values()
                .map(PendingPart::into_part)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_and_tool_call_parts_are_rebuilt_in_index_order() {
        let mut accumulator = PartAccumulator::new();
        for event in [
            PartEvent::Start {
                index: 1,
                part: ResponsePart::ToolCall {
                    call_id: "call-1".to_string(),
                    tool_name: "search".to_string(),
                    arguments: Value::String(String::new()),
                },
            },
            PartEvent::text_start(0, "Hel"),
            PartEvent::text_delta(0, "lo"),
            PartEvent::Delta {
                index: 1,
                delta: PartDelta::ToolCallArgs {
                    call_id: None,
                    tool_name: None,
                    args: "{\"q\":".to_string(),
                },
            },
            PartEvent::Delta {
                index: 1,
                delta: PartDelta::ToolCallArgs {
                    call_id: None,
                    tool_name: None,
                    args: "\"rust\"}".to_string(),
                },
            },
        ] {
            accumulator.apply(&event);
        }

        assert_eq!(accumulator.text(), "Hello");
        assert_eq!(
            accumulator.finish(),
            Some(HistoryMessage::Response {
                parts: vec![
                    ResponsePart::Text {
                        content: "Hello".to_string(),
                    },
                    ResponsePart::ToolCall {
                        call_id: "call-1".to_string(),
                        tool_name: "search".to_string(),
                        arguments: json!({ "q": "rust" }),
                    },
                ],
            })
        );
    }

    #[test]
    fn delta_without_start_opens_a_part_of_the_delta_kind() {
        let mut accumulator = PartAccumulator::new();
        accumulator.apply(&PartEvent::Delta {
            index: 0,
            delta: PartDelta::ToolCallArgs {
                call_id: Some("c9".to_string()),
                tool_name: Some("lookup".to_string()),
                args: "{not json".to_string(),
            },
        });

        assert_eq!(
            accumulator.finish(),
            Some(HistoryMessage::Response {
                parts: vec![ResponsePart::ToolCall {
                    call_id: "c9".to_string(),
                    tool_name: "lookup".to_string(),
                    arguments: Value::String("{not json".to_string()),
                }],
            })
        );
    }

    #[test]
    fn mismatched_delta_kind_is_counted_and_ignored() {
        let mut accumulator = PartAccumulator::new();
        accumulator.apply(&PartEvent::text_start(0, "a"));
        accumulator.apply(&PartEvent::Delta {
            index: 0,
            delta: PartDelta::Thinking {
                content: "hmm".to_string(),
            },
        });

        assert_eq!(accumulator.rejected_deltas(), 1);
        assert_eq!(accumulator.text(), "a");
    }

    #[test]
    fn empty_accumulator_finishes_to_none() {
        assert!(PartAccumulator::new().is_empty());
        assert_eq!(PartAccumulator::new().finish(), None);
    }
}
