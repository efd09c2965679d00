//! Conversion from Anthropic Messages requests to Chat Completions requests.
//!
//! This is a pure mapping: no I/O, no state. Heterogeneous block content is
//! flattened into the `[{type: "text", text}]` list the upstream expects,
//! and tool definitions move from `input_schema` to function `parameters`.

use serde_json::Value;

use crate::messages::{anthropic, openai};

/// Upstream model used for every request that is not haiku-class.
const DEFAULT_UPSTREAM_MODEL: &str = "gpt-4.1";

/// Upstream model used for haiku-class requests.
const SMALL_UPSTREAM_MODEL: &str = "gpt-4o-mini";

impl From<anthropic::MessagesRequest> for openai::ChatCompletionRequest {
    fn from(req: anthropic::MessagesRequest) -> Self {
        let model = if req.model.contains("haiku") {
            SMALL_UPSTREAM_MODEL
        } else {
            DEFAULT_UPSTREAM_MODEL
        };

        let messages = req.messages.into_iter().filter_map(flatten_message).collect();

        Self {
            model: model.to_string(),
            messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: req.top_k,
            stop: req.stop_sequences,
            tools: req
                .tools
                .map(|tools| tools.into_iter().map(openai::FunctionTool::from).collect()),
            tool_choice: req.tool_choice.map(openai::ToolChoice::from),
            // The transcoder always consumes a stream; buffering for
            // non-streaming callers happens on the way back.
            stream: true,
        }
    }
}

/// Flattens one message into at most one upstream message. Messages whose
/// flattened content comes out empty are dropped.
fn flatten_message(msg: anthropic::Message) -> Option<openai::ChatMessage> {
    let content = match msg.role {
        anthropic::Role::User => flatten_user_content(msg.content),
        anthropic::Role::Assistant => flatten_assistant_content(msg.content),
    };

    if content.is_empty() {
        return None;
    }

    Some(openai::ChatMessage {
        role: msg.role.as_str().to_string(),
        content,
    })
}

/// User content keeps every text block, except when a tool_result is
/// present: then the whole message collapses into one text entry so the
/// upstream sees the tool feedback inline.
fn flatten_user_content(content: anthropic::MessageContent) -> Vec<openai::TextContent> {
    match content {
        anthropic::MessageContent::Text(text) => vec![openai::TextContent::new(text)],
        anthropic::MessageContent::Blocks(blocks) => {
            let has_tool_result = blocks
                .iter()
                .any(|block| matches!(block, anthropic::ContentBlock::ToolResult { .. }));

            if has_tool_result {
                vec![openai::TextContent::new(collapse_tool_results(&blocks))]
            } else {
                blocks
                    .into_iter()
                    .filter_map(|block| match block {
                        anthropic::ContentBlock::Text { text } => Some(openai::TextContent::new(text)),
                        _ => None,
                    })
                    .collect()
            }
        }
        anthropic::MessageContent::Other(value) => vec![openai::TextContent::new(to_json_string(&value))],
    }
}

/// Assistant content keeps text blocks only; tool_use and tool_result
/// blocks are discarded.
fn flatten_assistant_content(content: anthropic::MessageContent) -> Vec<openai::TextContent> {
    match content {
        anthropic::MessageContent::Text(text) => vec![openai::TextContent::new(text)],
        anthropic::MessageContent::Blocks(blocks) => blocks
            .into_iter()
            .filter_map(|block| match block {
                anthropic::ContentBlock::Text { text } => Some(openai::TextContent::new(text)),
                _ => None,
            })
            .collect(),
        anthropic::MessageContent::Other(value) => vec![openai::TextContent::new(to_json_string(&value))],
    }
}

/// Renders a tool-result-bearing message as one trimmed text blob.
fn collapse_tool_results(blocks: &[anthropic::ContentBlock]) -> String {
    use std::fmt::Write;

    let mut out = String::new();

    for block in blocks {
        match block {
            anthropic::ContentBlock::ToolResult { tool_use_id, content } => {
                let _ = writeln!(out, "Tool Result for {tool_use_id}:");

                match content {
                    anthropic::ToolResultContent::Text(text) => {
                        let _ = writeln!(out, "{text}");
                    }
                    anthropic::ToolResultContent::Blocks(blocks) => {
                        for anthropic::ToolResultTextBlock::Text { text } in blocks {
                            let _ = writeln!(out, "{text}");
                        }
                    }
                    anthropic::ToolResultContent::Other(value) => {
                        let _ = writeln!(out, "{}", to_json_string(value));
                    }
                }
            }
            anthropic::ContentBlock::Text { text } => {
                let _ = writeln!(out, "{text}");
            }
            _ => {}
        }
    }

    out.trim().to_string()
}

fn to_json_string(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

impl From<anthropic::Tool> for openai::FunctionTool {
    fn from(tool: anthropic::Tool) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: openai::FunctionDefinition {
                name: tool.name,
                description: tool.description,
                parameters: tool.input_schema,
            },
        }
    }
}

impl From<anthropic::ToolChoice> for openai::ToolChoice {
    fn from(choice: anthropic::ToolChoice) -> Self {
        match choice {
            anthropic::ToolChoice::Auto => openai::ToolChoice::Mode("auto".to_string()),
            anthropic::ToolChoice::Any => openai::ToolChoice::Mode("any".to_string()),
            anthropic::ToolChoice::Tool { name } => openai::ToolChoice::Function {
                choice_type: "function".to_string(),
                function: openai::FunctionChoice { name },
            },
            // Anything unrecognized degrades to automatic selection.
            anthropic::ToolChoice::Other(_) => openai::ToolChoice::auto(),
        }
    }
}
