//! HTTP client for the upstream Chat Completions endpoint.

use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt, stream::BoxStream};
use reqwest::{Client, header::AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};

use crate::{error::LlmError, http_client::http_client, messages::openai::ChatCompletionChunk};

/// A single upstream frame that could not be decoded. Carried through the
/// chunk stream so the transcoder can surface it inline and keep going.
#[derive(Debug, thiserror::Error)]
#[error("invalid chunk: {0}")]
pub struct FrameError(pub String);

/// The decoded upstream stream: one item per SSE frame, terminated by the
/// upstream's `[DONE]` marker or EOF.
pub type ChatCompletionChunkStream = BoxStream<'static, Result<ChatCompletionChunk, FrameError>>;

/// Client for the configured upstream OpenAI-compatible API.
pub struct UpstreamClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl UpstreamClient {
    /// A client for the configured upstream, sharing the process-wide
    /// connection pool.
    pub fn new(config: &config::UpstreamConfig) -> Self {
        Self {
            client: http_client(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Open a streaming chat completion.
    ///
    /// The upstream is always asked to stream; buffering for non-streaming
    /// callers happens downstream. A non-200 status is logged but its body
    /// is still decoded, so the caller always gets a well-formed, if empty,
    /// event sequence.
    pub async fn chat_completion_chunks(
        &self,
        request: &crate::messages::openai::ChatCompletionRequest,
    ) -> crate::Result<ChatCompletionChunkStream> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = sonic_rs::to_vec(request)
            .map_err(|e| LlmError::Internal(format!("failed to serialize upstream request: {e}")))?;

        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body);

        if let Some(key) = &self.api_key {
            request_builder = request_builder.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret()));
        }

        let response = request_builder
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(format!("failed to send request to upstream: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("upstream returned non-200 status: {status}");
        }

        Ok(decode_chunks(response.bytes_stream()).boxed())
    }
}

/// Decode an SSE byte stream into Chat Completions chunks.
///
/// Transport and SSE framing errors are logged and skipped. The `[DONE]`
/// marker ends the stream. A frame whose payload is not a valid chunk
/// surfaces as a [`FrameError`] item so the consumer can report it inline
/// and continue.
pub fn decode_chunks<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk, FrameError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    byte_stream
        .eventsource()
        .take_while(|event| {
            let done = matches!(event, Ok(event) if event.data == "[DONE]");
            futures::future::ready(!done)
        })
        .filter_map(|event| async move {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("SSE framing error in upstream stream: {e}");
                    return None;
                }
            };

            match sonic_rs::from_str::<ChatCompletionChunk>(&event.data) {
                Ok(chunk) => Some(Ok(chunk)),
                Err(e) => {
                    log::warn!("failed to parse upstream stream chunk: {e}");
                    Some(Err(FrameError(e.to_string())))
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use indoc::indoc;

    use super::decode_chunks;

    fn byte_stream(
        input: &'static str,
    ) -> impl futures::Stream<Item = Result<&'static [u8], std::convert::Infallible>> {
        futures::stream::once(async move { Ok(input.as_bytes()) })
    }

    #[tokio::test]
    async fn decodes_frames_and_stops_at_done() {
        let input = indoc! {r#"
            data: {"id":"cmpl-abc","choices":[{"delta":{"content":"Hello"}}]}

            data: {"id":"cmpl-abc","choices":[{"delta":{"content":"!"},"finish_reason":"stop"}]}

            data: [DONE]

            data: {"id":"cmpl-abc","choices":[{"delta":{"content":"after done"}}]}

        "#};

        let chunks: Vec<_> = decode_chunks(byte_stream(input)).collect().await;

        assert_eq!(chunks.len(), 2);
        let first = chunks[0].as_ref().unwrap();
        assert_eq!(first.choices[0].delta.content.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn invalid_frames_surface_as_errors_without_ending_the_stream() {
        let input = indoc! {r#"
            data: this is not json

            data: {"choices":[{"delta":{"content":"still here"}}]}

        "#};

        let chunks: Vec<_> = decode_chunks(byte_stream(input)).collect().await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_err());
        assert_eq!(
            chunks[1].as_ref().unwrap().choices[0].delta.content.as_deref(),
            Some("still here")
        );
    }
}
