use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for an OpenAI-compatible Chat Completions API.
///
/// This is what the relay sends upstream after rewriting a Messages request.
/// Content is always the flattened `[{type: "text", text}]` form, and
/// `stream` is always true: the transcoder consumes a stream even when the
/// caller asked for a buffered response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// The upstream model to use.
    pub model: String,

    /// The flattened conversation.
    pub messages: Vec<ChatMessage>,

    /// Maximum number of tokens to generate.
    pub max_tokens: u32,

    /// Controls randomness in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,

    /// Only sample from the top K tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Sequences that stop generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Function tools available to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<FunctionTool>>,

    /// Controls how the model uses tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,

    /// Whether the upstream should stream the response.
    pub stream: bool,
}

/// A flattened chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender ("user" or "assistant").
    pub role: String,

    /// The message content as text entries.
    pub content: Vec<TextContent>,
}

/// A single `{type: "text", text}` entry in a flattened message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// The entry type (always "text").
    #[serde(rename = "type")]
    pub content_type: String,

    /// The text itself.
    pub text: String,
}

impl TextContent {
    /// A new text entry.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            content_type: "text".to_string(),
            text: text.into(),
        }
    }
}

/// A function tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionTool {
    /// The tool type (always "function").
    #[serde(rename = "type")]
    pub tool_type: String,

    /// The function the model may call.
    pub function: FunctionDefinition,
}

/// The function half of a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function.
    pub name: String,

    /// Description of what the function does.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the function's parameters.
    pub parameters: Value,
}

/// Tool choice as Chat Completions understands it: a bare mode string such
/// as "auto", or a pinned function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// A mode string: "auto", "any", "none", ...
    Mode(String),
    /// Force a specific function.
    Function {
        /// The choice type (always "function").
        #[serde(rename = "type")]
        choice_type: String,
        /// The pinned function.
        function: FunctionChoice,
    },
}

impl ToolChoice {
    /// The automatic selection mode, also the fallback for anything the
    /// relay does not recognize.
    pub fn auto() -> Self {
        ToolChoice::Mode("auto".to_string())
    }
}

/// The function name inside a pinned tool choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionChoice {
    /// Name of the function to call.
    pub name: String,
}

/// One streaming chunk of a Chat Completions response.
///
/// Fields the relay does not use (object, created, system_fingerprint,
/// content filter annotations, ...) are ignored on deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Upstream identifier for the completion.
    #[serde(default)]
    pub id: String,

    /// The upstream model that produced the chunk.
    #[serde(default)]
    pub model: String,

    /// Incremental choice updates. Usually one entry; sometimes empty on
    /// annotation-only frames.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,

    /// Usage counters, typically only on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

/// One choice inside a streaming chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// The incremental message update.
    #[serde(default)]
    pub delta: ChunkDelta,

    /// Why generation ended, present only on the closing chunk.
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// The delta payload of a streaming choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Streamed text content.
    #[serde(default)]
    pub content: Option<String>,

    /// Streamed tool call fragments.
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A fragment of a streamed tool call.
///
/// Only the first fragment for a given `index` carries the call id and
/// function name; every fragment appends to `function.arguments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the tool call within the response.
    #[serde(default)]
    pub index: u32,

    /// Upstream identifier of the call, on the opening fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The call type ("function"), on the opening fragment.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,

    /// The function fragment.
    #[serde(default)]
    pub function: FunctionDelta,
}

/// The function half of a streamed tool call fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Function name, on the opening fragment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// A fragment of the argument JSON.
    #[serde(default)]
    pub arguments: String,
}

/// Why the upstream stopped generating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the response.
    Stop,
    /// The token limit was reached.
    Length,
    /// The model is calling tools.
    ToolCalls,
    /// Content was filtered.
    ContentFilter,
    /// Anything else the upstream may emit.
    #[serde(untagged)]
    Other(String),
}

/// Usage counters reported by the upstream.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChunkUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion.
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens.
    #[serde(default)]
    pub total_tokens: u32,
}
