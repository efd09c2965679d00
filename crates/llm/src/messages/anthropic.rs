use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for the Anthropic Messages API.
///
/// This is the format Claude clients send to `/v1/messages` as documented in
/// the [Anthropic API Reference](https://docs.anthropic.com/en/api/messages).
/// It differs from the Chat Completions format in several ways:
/// - Message content is an array of typed blocks rather than a flat string
/// - System prompts are separate from the messages array
/// - Tool use is expressed as tool_use/tool_result blocks instead of
///   function calls
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessagesRequest {
    /// The model requested by the client, e.g. "claude-3-5-haiku-latest".
    pub model: String,

    /// Maximum number of tokens to generate. Required by the Messages API.
    pub max_tokens: u32,

    /// The conversation, alternating between "user" and "assistant" roles.
    pub messages: Vec<Message>,

    /// System prompt. Accepted for compatibility but not forwarded upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<Value>,

    /// Sequences that will cause the model to stop generating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    /// Whether the client wants a Server-Sent-Events response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    /// Controls randomness in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Only sample from the top K tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Custom metadata attached to the request. Not forwarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// Tools available for the model to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,

    /// Controls how the model uses tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// A chat message with role and polymorphic content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: Role,

    /// The content of the message.
    pub content: MessageContent,
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant message
    Assistant,
}

impl Role {
    /// The wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message content is polymorphic: a bare string, an ordered sequence of
/// typed blocks, or whatever else a client decided to send.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Shorthand form: the whole message is one string.
    Text(String),
    /// Standard form: an array of content blocks.
    Blocks(Vec<ContentBlock>),
    /// Anything else. Rendered by JSON-serialising it verbatim.
    Other(Value),
}

/// Content block in a message.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content.
    Text {
        /// The text content
        text: String,
    },

    /// Image content. Accepted but never forwarded upstream.
    Image {
        /// The image source
        source: Value,
    },

    /// Tool use request from the assistant.
    ToolUse {
        /// Unique identifier for this tool use
        id: String,
        /// Name of the tool to use
        name: String,
        /// Input parameters for the tool
        input: Value,
    },

    /// Result from a tool execution, sent back by the client.
    ToolResult {
        /// The tool use ID this result corresponds to
        tool_use_id: String,
        /// The result content
        #[serde(default)]
        content: ToolResultContent,
    },

    /// Block types this relay does not know about. Kept through
    /// deserialization so the rest of the message survives; dropped when
    /// flattening.
    #[serde(untagged)]
    Unknown(Value),
}

/// Content of a tool result, itself polymorphic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    /// A bare string result.
    Text(String),
    /// A sequence of text blocks.
    Blocks(Vec<ToolResultTextBlock>),
    /// Any other structure.
    Other(Value),
}

impl Default for ToolResultContent {
    fn default() -> Self {
        ToolResultContent::Other(Value::Null)
    }
}

/// A `{type: "text", text}` entry inside a tool result.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultTextBlock {
    /// Text result from tool execution
    Text {
        /// The text content
        text: String,
    },
}

/// Tool definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    /// The name of the tool
    pub name: String,

    /// Description of what the tool does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters
    pub input_schema: Value,
}

/// Tool choice configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolChoice {
    /// Let the model decide whether to use tools
    Auto,

    /// Force the model to use any available tool
    Any,

    /// Force the model to use a specific tool
    Tool {
        /// The name of the tool to use
        name: String,
    },

    /// Variants this relay does not know about; degraded to automatic
    /// selection during conversion.
    #[serde(untagged)]
    Other(Value),
}

/// Request body for `/v1/messages/count_tokens`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenCountRequest {
    /// The model the count would apply to.
    pub model: String,

    /// The messages to count.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Response body for `/v1/messages/count_tokens`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenCountResponse {
    /// Number of input tokens the request would consume.
    pub input_tokens: u32,
}

/// Response body for the Messages API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    /// Unique identifier for this completion
    pub id: String,

    /// The model that generated the response
    pub model: String,

    /// The role of the response (always "assistant")
    pub role: Role,

    /// The content of the response
    pub content: Vec<ResponseContent>,

    /// The type of response (always "message")
    pub r#type: String,

    /// Why the model stopped generating
    pub stop_reason: Option<StopReason>,

    /// Stop sequence that ended generation, if any
    pub stop_sequence: Option<String>,

    /// Token usage statistics
    pub usage: Usage,
}

/// Content block in a response. Responses only ever carry text and tool-use
/// blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContent {
    /// Plain text content.
    Text {
        /// The text content
        text: String,
    },

    /// Tool use request from the assistant.
    ToolUse {
        /// Unique identifier for this tool use
        id: String,
        /// Name of the tool to use
        name: String,
        /// Input parameters for the tool
        input: Value,
    },
}

/// The reason why the model stopped generating tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model reached a natural stopping point.
    EndTurn,
    /// The generation hit the requested token limit.
    MaxTokens,
    /// The model encountered a stop sequence from the request.
    StopSequence,
    /// The model invoked a tool.
    ToolUse,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::EndTurn => write!(f, "end_turn"),
            StopReason::MaxTokens => write!(f, "max_tokens"),
            StopReason::StopSequence => write!(f, "stop_sequence"),
            StopReason::ToolUse => write!(f, "tool_use"),
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct Usage {
    /// Number of input tokens
    #[serde(default)]
    pub input_tokens: u32,

    /// Number of output tokens
    #[serde(default)]
    pub output_tokens: u32,

    /// Input tokens spent creating cache entries
    #[serde(default)]
    pub cache_creation_input_tokens: u32,

    /// Input tokens served from cache
    #[serde(default)]
    pub cache_read_input_tokens: u32,
}

/// Error details in the Messages API error shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// The type of error that occurred
    #[serde(rename = "type")]
    pub error_type: String,

    /// Human-readable error message
    pub message: String,
}

/// Streaming event surface of the Messages API.
///
/// Streams always begin with a [`StreamEvent::MessageStart`], emit one or
/// more content block lifecycles (`content_block_start` →
/// `content_block_delta*` → `content_block_stop`), carry one top-level
/// [`StreamEvent::MessageDelta`] with the stop reason, and finish with a
/// terminal [`StreamEvent::MessageStop`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// `message_start` — announces the streamed message and its metadata.
    MessageStart {
        /// The initial message metadata
        message: MessageStart,
    },

    /// `content_block_start` — a content block opens. The same `index` is
    /// used by subsequent delta and stop events.
    ContentBlockStart {
        /// The index of the content block
        index: u32,
        /// The content block being started
        content_block: ResponseContent,
    },

    /// `content_block_delta` — incremental update for the indexed block.
    ContentBlockDelta {
        /// The index of the content block
        index: u32,
        /// The delta update
        delta: ContentDelta,
    },

    /// `content_block_stop` — no more updates for the indexed block.
    ContentBlockStop {
        /// The index of the content block
        index: u32,
    },

    /// `message_delta` — top-level changes such as the stop reason.
    MessageDelta {
        /// The changes applied to the in-flight message
        delta: MessageDeltaBody,
        /// Updated usage counters
        #[serde(default)]
        usage: DeltaUsage,
    },

    /// `message_stop` — end of the stream.
    MessageStop,

    /// `ping` — heartbeat.
    Ping,

    /// `error` — a recoverable error surfaced without tearing down the
    /// stream.
    Error {
        /// The error that occurred
        error: ErrorDetails,
    },
}

impl StreamEvent {
    /// Wire name of the event, used for the envelope's `event` field.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Ping => "ping",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// One line of the relayed stream: `{"event": ..., "data": ...}`.
///
/// The data payload re-carries its `type`, so the envelope decodes without
/// consulting the `event` field. Both fields are optional on the way in:
/// inline notices such as `{"error": ...}` decode to an empty envelope and
/// are skipped rather than treated as corruption.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// The event name, duplicating the payload's `type` tag.
    #[serde(default)]
    pub event: String,

    /// The event payload.
    #[serde(default)]
    pub data: Option<StreamEvent>,
}

impl From<StreamEvent> for EventEnvelope {
    fn from(data: StreamEvent) -> Self {
        Self {
            event: data.name().to_string(),
            data: Some(data),
        }
    }
}

/// Initial message metadata sent with `message_start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStart {
    /// Unique message ID
    pub id: String,

    /// The type (always "message")
    pub r#type: String,

    /// The role (always "assistant")
    pub role: Role,

    /// The model emitting the response
    pub model: String,

    /// Content blocks known at stream start (always empty)
    #[serde(default)]
    pub content: Vec<ResponseContent>,

    /// Stop reason if known at stream start
    pub stop_reason: Option<StopReason>,

    /// Stop sequence if known at stream start
    pub stop_sequence: Option<String>,

    /// Usage snapshot captured at stream start
    #[serde(default)]
    pub usage: Usage,
}

/// Delta update for content blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentDelta {
    /// Additional streamed text
    TextDelta {
        /// Additional text content
        text: String,
    },

    /// A fragment of a tool's input JSON
    InputJsonDelta {
        /// Partial JSON string for the tool input
        partial_json: String,
    },
}

/// Changes carried by a `message_delta` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDeltaBody {
    /// Stop reason if the message is complete
    pub stop_reason: Option<StopReason>,

    /// Stop sequence if one was encountered
    pub stop_sequence: Option<String>,
}

/// Usage counters carried by a `message_delta` event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DeltaUsage {
    /// Output tokens accumulated so far
    #[serde(default)]
    pub output_tokens: u32,
}
