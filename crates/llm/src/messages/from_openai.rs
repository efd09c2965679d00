//! Conversion from Chat Completions requests back to Messages requests.
//!
//! The inverse of the rewrite: text entries become text blocks, `stop`
//! becomes `stop_sequences`, function tools become tool definitions. Used to
//! round-trip requests, so the model name passes through untouched.

use crate::messages::{anthropic, openai};

impl From<openai::ChatCompletionRequest> for anthropic::MessagesRequest {
    fn from(req: openai::ChatCompletionRequest) -> Self {
        let messages = req
            .messages
            .into_iter()
            .map(|msg| anthropic::Message {
                role: match msg.role.as_str() {
                    "user" => anthropic::Role::User,
                    _ => anthropic::Role::Assistant,
                },
                content: anthropic::MessageContent::Blocks(
                    msg.content
                        .into_iter()
                        .map(|entry| anthropic::ContentBlock::Text { text: entry.text })
                        .collect(),
                ),
            })
            .collect();

        Self {
            model: req.model,
            max_tokens: req.max_tokens,
            messages,
            system: None,
            stop_sequences: req.stop,
            stream: Some(req.stream),
            temperature: req.temperature,
            top_p: req.top_p,
            top_k: req.top_k,
            metadata: None,
            tools: req
                .tools
                .map(|tools| tools.into_iter().map(anthropic::Tool::from).collect()),
            tool_choice: req.tool_choice.map(anthropic::ToolChoice::from),
        }
    }
}

impl From<openai::FunctionTool> for anthropic::Tool {
    fn from(tool: openai::FunctionTool) -> Self {
        Self {
            name: tool.function.name,
            description: tool.function.description,
            input_schema: tool.function.parameters,
        }
    }
}

impl From<openai::ToolChoice> for anthropic::ToolChoice {
    fn from(choice: openai::ToolChoice) -> Self {
        match choice {
            openai::ToolChoice::Mode(mode) => match mode.as_str() {
                "any" => anthropic::ToolChoice::Any,
                _ => anthropic::ToolChoice::Auto,
            },
            openai::ToolChoice::Function { function, .. } => anthropic::ToolChoice::Tool { name: function.name },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::messages::{anthropic, openai};

    #[test]
    fn rewrite_then_inverse_preserves_a_plain_text_turn() {
        let original = anthropic::MessagesRequest {
            model: "claude-3-sonnet-20240229".to_string(),
            max_tokens: 256,
            messages: vec![anthropic::Message {
                role: anthropic::Role::User,
                content: anthropic::MessageContent::Text("Hello, Claude!".to_string()),
            }],
            system: None,
            stop_sequences: None,
            stream: None,
            temperature: None,
            top_p: None,
            top_k: None,
            metadata: None,
            tools: None,
            tool_choice: None,
        };

        let upstream = openai::ChatCompletionRequest::from(original);
        assert_eq!(upstream.model, "gpt-4.1");

        let roundtripped = anthropic::MessagesRequest::from(upstream);

        assert_eq!(roundtripped.model, "gpt-4.1");
        assert_eq!(roundtripped.max_tokens, 256);
        assert_eq!(roundtripped.messages.len(), 1);

        let anthropic::MessageContent::Blocks(blocks) = &roundtripped.messages[0].content else {
            unreachable!("Expected block content");
        };
        assert_eq!(blocks.len(), 1);
        assert!(matches!(&blocks[0], anthropic::ContentBlock::Text { text } if text == "Hello, Claude!"));
    }
}
