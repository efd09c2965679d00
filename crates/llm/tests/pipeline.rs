//! End-to-end tests of the streaming pipeline: literal upstream SSE bytes
//! go through the chunk decoder and the transcoder, and the resulting event
//! stream is both checked for well-formedness and reduced back into a
//! single response.

use std::collections::BTreeSet;
use std::convert::Infallible;

use futures::StreamExt;
use indoc::indoc;
use llm::{
    messages::anthropic::{EventEnvelope, MessagesResponse, ResponseContent, StopReason, StreamEvent},
    reduce, transcode, upstream,
};

async fn run_pipeline(model: &str, upstream_sse: &'static str) -> (String, MessagesResponse) {
    let bytes = futures::stream::once(async move { Ok::<_, Infallible>(upstream_sse.as_bytes()) });

    let lines = transcode::transcode_stream(model.to_string(), upstream::decode_chunks(bytes));
    let buffer: String = lines.collect::<Vec<_>>().await.concat();

    let response = reduce::reduce(&buffer);

    (buffer, response)
}

/// Checks the ordering invariants of a relayed event stream: exactly one
/// leading `message_start`, every block start matched by one stop before
/// `message_stop`, and the terminal `[DONE]` marker.
fn assert_well_formed(buffer: &str) {
    assert!(buffer.ends_with("data: [DONE]\n\n"), "missing [DONE]: {buffer}");

    let mut open: BTreeSet<u32> = BTreeSet::new();
    let mut message_starts = 0;
    let mut message_stopped = false;

    for (position, line) in buffer.lines().filter(|line| !line.trim().is_empty()).enumerate() {
        if line == "data: [DONE]" {
            continue;
        }
        let payload = line.strip_prefix("data: ").unwrap_or(line);
        let envelope: EventEnvelope = serde_json::from_str(payload).expect("undecodable event line");
        let Some(event) = envelope.data else {
            continue;
        };

        assert!(!message_stopped, "event after message_stop: {line}");

        match event {
            StreamEvent::MessageStart { .. } => {
                assert_eq!(position, 0, "message_start must come first");
                message_starts += 1;
            }
            StreamEvent::ContentBlockStart { index, .. } => {
                assert!(open.insert(index), "block {index} started twice");
            }
            StreamEvent::ContentBlockStop { index } => {
                assert!(open.remove(&index), "block {index} stopped but never started");
            }
            StreamEvent::MessageDelta { .. } => {
                assert!(open.is_empty(), "message_delta while blocks {open:?} still open");
            }
            StreamEvent::MessageStop => {
                assert!(open.is_empty(), "message_stop while blocks {open:?} still open");
                message_stopped = true;
            }
            StreamEvent::ContentBlockDelta { index, .. } => {
                assert!(open.contains(&index), "delta for block {index} that is not open");
            }
            StreamEvent::Ping | StreamEvent::Error { .. } => {}
        }
    }

    assert_eq!(message_starts, 1, "expected exactly one message_start");
    assert!(message_stopped, "stream never emitted message_stop");
}

#[tokio::test]
async fn text_only_stream_reduces_to_one_text_block() {
    let upstream_sse = indoc! {r#"
        data: {"id":"cmpl-abc","object":"chat.completion.chunk","created":123,"model":"gpt-4o","choices":[{"delta":{"content":"Hello, "}}]}

        data: {"id":"cmpl-abc","object":"chat.completion.chunk","created":124,"model":"gpt-4o","choices":[{"delta":{"content":"world!"},"finish_reason":"stop"}]}

        data: [DONE]

    "#};

    let (buffer, response) = run_pipeline("claude-3-sonnet-20240229", upstream_sse).await;

    assert_well_formed(&buffer);
    assert!(buffer.contains(r#""event":"content_block_delta""#));

    assert_eq!(response.model, "claude-3-sonnet-20240229");
    assert_eq!(
        response.content,
        vec![ResponseContent::Text {
            text: "Hello, world!".to_string()
        }]
    );
    assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
}

#[tokio::test]
async fn length_capped_stream_maps_to_max_tokens() {
    let upstream_sse = indoc! {r#"
        data: {"id":"cmpl-abc","object":"chat.completion.chunk","created":123,"model":"gpt-4o","choices":[{"delta":{"content":"Test"},"finish_reason":"length"}]}

        data: [DONE]

    "#};

    let (buffer, response) = run_pipeline("claude-3-sonnet-20240229", upstream_sse).await;

    assert_well_formed(&buffer);
    assert!(buffer.contains(r#""stop_reason":"max_tokens""#));
    assert_eq!(response.stop_reason, Some(StopReason::MaxTokens));
}

#[tokio::test]
async fn empty_stream_still_brackets_the_message() {
    let upstream_sse = "data: [DONE]\n\n";

    let (buffer, response) = run_pipeline("claude-3-sonnet-20240229", upstream_sse).await;

    assert_well_formed(&buffer);
    assert!(buffer.contains("message_start"));
    assert!(buffer.contains("message_stop"));

    assert!(response.content.is_empty());
    assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
}

#[tokio::test]
async fn stream_ending_without_a_finish_reason_synthesizes_end_turn() {
    let upstream_sse = indoc! {r#"
        data: {"id":"cmpl-abc","object":"chat.completion.chunk","created":123,"model":"gpt-4o","choices":[{"delta":{"content":"cut off"}}]}

    "#};

    let (buffer, response) = run_pipeline("claude-3-sonnet-20240229", upstream_sse).await;

    assert_well_formed(&buffer);
    assert_eq!(
        response.content,
        vec![ResponseContent::Text {
            text: "cut off".to_string()
        }]
    );
    assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
}

#[tokio::test]
async fn tool_call_streamed_across_many_chunks_reduces_to_one_block() {
    // Captured from a real gpt-4.1 run: the arguments for a single Bash
    // call arrive as word-sized fragments, all at tool index 0.
    let upstream_sse = indoc! {r#"
        data: {"choices":[],"created":0,"id":"","prompt_filter_results":[{"content_filter_results":{"hate":{"filtered":false,"severity":"safe"}},"prompt_index":0}]}

        data: {"choices":[{"index":0,"delta":{"content":null,"role":"assistant","tool_calls":[{"function":{"arguments":"","name":"Bash"},"id":"call_wt8tlK30LhNXN1NENYUGa2zA","index":0,"type":"function"}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr","model":"gpt-4.1-2025-04-14"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"{\""},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"command"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"\":\""},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"echo"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":" hello"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":" world"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"\",\""},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"description"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"\":\""},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"Print"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"s"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":" '"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"hello"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":" world"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"'"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":" to"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":" the"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":" console"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"index":0,"delta":{"content":null,"tool_calls":[{"function":{"arguments":"\"}"},"index":0}]}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr"}

        data: {"choices":[{"finish_reason":"tool_calls","index":0,"delta":{"content":null}}],"created":1747436830,"id":"chatcmpl-BXyQwO8mFeDq7LEd95HIhyB1QOiSr","usage":{"completion_tokens":29,"prompt_tokens":16562,"total_tokens":16591}}

        data: [DONE]

    "#};

    let (buffer, response) = run_pipeline("claude-3-sonnet-20240229", upstream_sse).await;

    assert_well_formed(&buffer);

    let tool_blocks: Vec<_> = response
        .content
        .iter()
        .filter_map(|block| match block {
            ResponseContent::ToolUse { id, name, input } => Some((id, name, input)),
            _ => None,
        })
        .collect();

    assert_eq!(tool_blocks.len(), 1, "content: {:?}", response.content);
    let (id, name, input) = &tool_blocks[0];
    assert_eq!(*id, "call_wt8tlK30LhNXN1NENYUGa2zA");
    assert_eq!(*name, "Bash");
    assert_eq!(input["command"], "echo hello world");
    assert_eq!(input["description"], "Prints 'hello world' to the console");
    assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
}

#[tokio::test]
async fn text_followed_by_a_tool_call_keeps_both_blocks_in_order() {
    let upstream_sse = indoc! {r#"
        data: {"choices":[{"delta":{"content":"Let me run that."}}]}

        data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"Bash","arguments":"{\"command\":\"ls\"}"}}]}}]}

        data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}

        data: [DONE]

    "#};

    let (buffer, response) = run_pipeline("claude-3-sonnet-20240229", upstream_sse).await;

    assert_well_formed(&buffer);

    assert_eq!(response.content.len(), 2);
    assert!(
        matches!(&response.content[0], ResponseContent::Text { text } if text == "Let me run that.")
    );
    assert!(
        matches!(&response.content[1], ResponseContent::ToolUse { name, .. } if name == "Bash")
    );
}

#[tokio::test]
async fn malformed_upstream_frames_do_not_derail_the_stream() {
    let upstream_sse = indoc! {r#"
        data: {"choices":[{"delta":{"content":"before"}}]}

        data: {definitely not json

        data: {"choices":[{"delta":{"content":" after"},"finish_reason":"stop"}]}

        data: [DONE]

    "#};

    let (buffer, response) = run_pipeline("claude-3-sonnet-20240229", upstream_sse).await;

    // An inline error notice is allowed, so only the reduced response and
    // the terminal marker are checked here.
    assert!(buffer.ends_with("data: [DONE]\n\n"));
    assert_eq!(
        response.content,
        vec![ResponseContent::Text {
            text: "before after".to_string()
        }]
    );
    assert_eq!(response.stop_reason, Some(StopReason::EndTurn));
}
