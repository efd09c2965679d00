//! Folds a relayed Messages event stream back into a single aggregated
//! response, for callers that did not ask for streaming.

use serde_json::{Map, Value, json};

use crate::messages::anthropic::{
    ContentDelta, EventEnvelope, MessagesResponse, ResponseContent, Role, StopReason, StreamEvent, Usage,
};

/// Reduce a buffered event stream into one aggregated response.
///
/// The reader is tolerant: `data: ` prefixes are stripped, blank lines are
/// skipped, and the first undecodable record ends consumption — whatever
/// was assembled so far is returned. The terminal `data: [DONE]` marker
/// falls out of that rule naturally.
pub fn reduce(input: &str) -> MessagesResponse {
    let mut reducer = StreamReducer::default();

    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let payload = line.strip_prefix("data: ").unwrap_or(line);

        let Ok(envelope) = sonic_rs::from_str::<EventEnvelope>(payload) else {
            break;
        };

        // Envelopes without a payload (inline error notices) are skipped.
        if let Some(event) = envelope.data {
            reducer.process(event);
        }
    }

    reducer.into_response()
}

/// Aggregates Messages events into one response.
///
/// The reducer mirrors the block lifecycle the transcoder emits: text
/// deltas append to the current text block, tool input fragments buffer
/// until their block stops, and `message_delta` records the stop reason.
#[derive(Debug, Default)]
pub struct StreamReducer {
    id: String,
    model: String,
    usage: Usage,
    stop_reason: Option<StopReason>,
    stop_sequence: Option<String>,
    text_blocks: Vec<String>,
    current_text: Option<usize>,
    tool_blocks: Vec<ResponseContent>,
    current_tool: Option<PendingTool>,
    input_buffer: String,
}

#[derive(Debug)]
struct PendingTool {
    id: String,
    name: String,
}

impl StreamReducer {
    /// Fold one event into the reducer state.
    pub fn process(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::MessageStart { message } => {
                self.id = message.id;
                self.model = message.model;
                self.usage = message.usage;
            }
            StreamEvent::ContentBlockStart { content_block, .. } => match content_block {
                ResponseContent::Text { text } => {
                    self.text_blocks.push(text);
                    self.current_text = Some(self.text_blocks.len() - 1);
                    self.current_tool = None;
                    self.input_buffer.clear();
                }
                ResponseContent::ToolUse { id, name, .. } => {
                    // A tool block without an id or name cannot be
                    // finalised; its deltas are ignored.
                    self.current_tool = if !id.is_empty() && !name.is_empty() {
                        Some(PendingTool { id, name })
                    } else {
                        None
                    };
                    self.input_buffer.clear();
                    self.current_text = None;
                }
            },
            StreamEvent::ContentBlockDelta { delta, .. } => match delta {
                ContentDelta::TextDelta { text } => match self.current_text {
                    Some(index) => self.text_blocks[index].push_str(&text),
                    None => {
                        self.text_blocks.push(text);
                        self.current_text = Some(self.text_blocks.len() - 1);
                    }
                },
                ContentDelta::InputJsonDelta { partial_json } => {
                    if self.current_tool.is_some() {
                        self.input_buffer.push_str(&partial_json);
                    }
                }
            },
            StreamEvent::ContentBlockStop { .. } => {
                if let Some(tool) = self.current_tool.take() {
                    let input = parse_tool_input(&self.input_buffer);
                    self.tool_blocks.push(ResponseContent::ToolUse {
                        id: tool.id,
                        name: tool.name,
                        input,
                    });
                    self.input_buffer.clear();
                }
                self.current_text = None;
            }
            StreamEvent::MessageDelta { delta, usage } => {
                self.stop_reason = delta.stop_reason;
                self.stop_sequence = delta.stop_sequence;
                if usage.output_tokens > 0 {
                    self.usage.output_tokens = usage.output_tokens;
                }
            }
            StreamEvent::MessageStop | StreamEvent::Ping | StreamEvent::Error { .. } => {}
        }
    }

    /// Produce the aggregated response. Empty text blocks are filtered out
    /// and tool-use blocks land after all text blocks.
    pub fn into_response(self) -> MessagesResponse {
        let mut content: Vec<ResponseContent> = self
            .text_blocks
            .into_iter()
            .filter(|text| !text.is_empty())
            .map(|text| ResponseContent::Text { text })
            .collect();
        content.extend(self.tool_blocks);

        MessagesResponse {
            id: self.id,
            model: self.model,
            role: Role::Assistant,
            content,
            r#type: "message".to_string(),
            stop_reason: self.stop_reason,
            stop_sequence: self.stop_sequence,
            usage: self.usage,
        }
    }
}

/// The buffered fragments should concatenate to a JSON object; when they
/// don't, the raw text is preserved under a "raw" key. An empty buffer is
/// an empty input map.
fn parse_tool_input(buffer: &str) -> Value {
    if buffer.is_empty() {
        return Value::Object(Map::new());
    }

    match serde_json::from_str::<Map<String, Value>>(buffer) {
        Ok(map) => Value::Object(map),
        Err(_) => json!({ "raw": buffer }),
    }
}
