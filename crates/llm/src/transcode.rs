//! Incremental translation of Chat Completions stream chunks into Messages
//! stream events.
//!
//! The Messages protocol is block-oriented: text and tool-use blocks open,
//! stream deltas, and close, in strict order. The upstream protocol is a
//! flat sequence of fragmented deltas. The [`Transcoder`] bridges the two by
//! tracking which block is currently open and emitting the start/stop
//! events the downstream protocol demands.

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde_json::{Map, Value, json};
use std::pin::pin;

use crate::{
    messages::{
        anthropic::{
            ContentDelta, DeltaUsage, EventEnvelope, MessageDeltaBody, MessageStart, ResponseContent, Role,
            StopReason, StreamEvent, Usage,
        },
        openai,
    },
    upstream::FrameError,
};

/// Stable identifier stamped on every relayed message.
const MESSAGE_ID: &str = "msg_000000000000000000000000";

/// Terminal marker closing every relayed stream, always emitted in
/// classical SSE framing.
pub const DONE_MARKER: &str = "data: [DONE]\n\n";

/// Translates one upstream chunk stream into one well-formed Messages event
/// sequence.
///
/// State is per-response: whether the initial text block (index 0) has been
/// closed, which tool block is open, and whether the closing events have
/// already gone out. A tool call streamed across many chunks sharing one
/// index opens its block exactly once; a stop is only ever emitted for a
/// block that was genuinely opened.
pub struct Transcoder {
    model: String,
    text_block_closed: bool,
    open_tool_index: Option<u32>,
    accumulated_text: String,
    output_tokens: u32,
    finished: bool,
}

impl Transcoder {
    /// A transcoder for one response, echoing `model` in `message_start`.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            text_block_closed: false,
            open_tool_index: None,
            accumulated_text: String::new(),
            output_tokens: 0,
            finished: false,
        }
    }

    /// Events every stream begins with, before the first upstream chunk:
    /// `message_start`, an open text block at index 0, and a ping.
    pub fn preamble(&self) -> Vec<StreamEvent> {
        vec![
            StreamEvent::MessageStart {
                message: MessageStart {
                    id: MESSAGE_ID.to_string(),
                    r#type: "message".to_string(),
                    role: Role::Assistant,
                    model: self.model.clone(),
                    content: Vec::new(),
                    stop_reason: None,
                    stop_sequence: None,
                    usage: Usage::default(),
                },
            },
            StreamEvent::ContentBlockStart {
                index: 0,
                content_block: ResponseContent::Text { text: String::new() },
            },
            StreamEvent::Ping,
        ]
    }

    /// Whether the closing events have been emitted. Once finished, further
    /// chunks are ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text relayed so far. Kept for debugging; correctness does not depend
    /// on it.
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// Translate one upstream chunk into zero or more events.
    ///
    /// Frames with no choices, or whose choices carry neither content, tool
    /// calls, nor a finish reason, produce nothing.
    pub fn transcode(&mut self, chunk: openai::ChatCompletionChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if self.finished {
            return events;
        }

        for choice in chunk.choices {
            let tool_calls = choice.delta.tool_calls.unwrap_or_default();

            if !tool_calls.is_empty() {
                self.close_text_block(&mut events);

                for call in tool_calls {
                    if self.open_tool_index != Some(call.index) {
                        self.close_tool_block(&mut events);

                        self.open_tool_index = Some(call.index);
                        events.push(StreamEvent::ContentBlockStart {
                            index: call.index,
                            content_block: ResponseContent::ToolUse {
                                id: call.id.unwrap_or_default(),
                                name: call.function.name.clone().unwrap_or_default(),
                                input: Value::Object(Map::new()),
                            },
                        });
                    }

                    events.push(StreamEvent::ContentBlockDelta {
                        index: call.index,
                        delta: ContentDelta::InputJsonDelta {
                            partial_json: call.function.arguments,
                        },
                    });
                }
            } else if let Some(content) = choice.delta.content
                && !content.is_empty()
                && !self.text_block_closed
            {
                // Text arriving after the text block closed is dropped; the
                // Messages protocol does not interleave text with tool use.
                self.accumulated_text.push_str(&content);
                events.push(StreamEvent::ContentBlockDelta {
                    index: 0,
                    delta: ContentDelta::TextDelta { text: content },
                });
            }

            if let Some(reason) = choice.finish_reason {
                self.close_tool_block(&mut events);
                self.close_text_block(&mut events);
                events.extend(self.closing_events(stop_reason(&reason)));
                self.finished = true;
                break;
            }
        }

        events
    }

    /// Close whatever is still open when the upstream ended without
    /// declaring a finish reason, synthesizing `end_turn`. Idempotent once
    /// the stream has finished.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut events = Vec::new();
        self.close_tool_block(&mut events);
        self.close_text_block(&mut events);
        events.extend(self.closing_events(StopReason::EndTurn));
        events
    }

    fn close_text_block(&mut self, events: &mut Vec<StreamEvent>) {
        if !self.text_block_closed {
            self.text_block_closed = true;
            events.push(StreamEvent::ContentBlockStop { index: 0 });
        }
    }

    fn close_tool_block(&mut self, events: &mut Vec<StreamEvent>) {
        if let Some(open) = self.open_tool_index.take() {
            events.push(StreamEvent::ContentBlockStop { index: open });
        }
    }

    fn closing_events(&self, stop_reason: StopReason) -> [StreamEvent; 2] {
        [
            StreamEvent::MessageDelta {
                delta: MessageDeltaBody {
                    stop_reason: Some(stop_reason),
                    stop_sequence: None,
                },
                usage: DeltaUsage {
                    output_tokens: self.output_tokens,
                },
            },
            StreamEvent::MessageStop,
        ]
    }
}

fn stop_reason(reason: &openai::FinishReason) -> StopReason {
    match reason {
        openai::FinishReason::Length => StopReason::MaxTokens,
        openai::FinishReason::ToolCalls => StopReason::ToolUse,
        openai::FinishReason::Stop => StopReason::EndTurn,
        _ => StopReason::EndTurn,
    }
}

/// Encode one event as a single `{"event", "data"}` wire line.
pub fn encode_event(event: StreamEvent) -> String {
    let envelope = EventEnvelope::from(event);

    let mut line = sonic_rs::to_string(&envelope).unwrap_or_else(|e| {
        log::error!("failed to serialize stream event: {e}");
        r#"{"error":"serialization failed"}"#.to_string()
    });
    line.push('\n');
    line
}

/// Run a full upstream chunk stream through a [`Transcoder`], yielding
/// wire-encoded lines and ending with the `[DONE]` marker.
///
/// Undecodable upstream frames surface as a best-effort inline error frame
/// and never abort the stream.
pub fn transcode_stream<S>(model: String, chunks: S) -> impl Stream<Item = String>
where
    S: Stream<Item = Result<openai::ChatCompletionChunk, FrameError>>,
{
    stream! {
        let mut transcoder = Transcoder::new(model);

        for event in transcoder.preamble() {
            yield encode_event(event);
        }

        let mut chunks = pin!(chunks);

        while let Some(result) = chunks.next().await {
            match result {
                Ok(chunk) => {
                    for event in transcoder.transcode(chunk) {
                        yield encode_event(event);
                    }

                    if transcoder.is_finished() {
                        break;
                    }
                }
                Err(err) => {
                    yield format!("data: {}\n\n", json!({ "error": err.to_string() }));
                }
            }
        }

        for event in transcoder.finish() {
            yield encode_event(event);
        }

        log::debug!(
            "relayed {} characters of streamed text",
            transcoder.accumulated_text().len()
        );

        yield DONE_MARKER.to_string();
    }
}
