//! The core of the relay: accepts Anthropic Messages requests, rewrites
//! them into Chat Completions requests, forwards them upstream, and
//! translates the streamed response back into the Messages event protocol —
//! buffering and reducing that stream for non-streaming callers.

use std::{pin::pin, sync::Arc};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use futures::StreamExt;

mod error;
mod http_client;
pub mod messages;
pub mod reduce;
pub mod transcode;
pub mod upstream;

pub use error::{LlmError, LlmResult as Result};

use crate::{
    messages::{anthropic, openai},
    upstream::UpstreamClient,
};

/// Creates an axum router for the Messages endpoints.
pub fn router(config: &config::Config) -> Router {
    let client = Arc::new(UpstreamClient::new(&config.upstream));

    Router::new()
        .route("/v1/messages", post(messages))
        .route("/v1/messages/count_tokens", post(count_tokens))
        .fallback(index)
        .with_state(client)
}

/// Handle Messages requests.
///
/// The upstream is always consumed as a stream. When the client asked for
/// `stream: true` the translated events are relayed as they arrive; when it
/// did not, the whole event stream is buffered and reduced into a single
/// Messages response.
async fn messages(State(client): State<Arc<UpstreamClient>>, body: Bytes) -> Result<Response> {
    let request: anthropic::MessagesRequest =
        sonic_rs::from_slice(&body).map_err(|e| LlmError::InvalidRequest(format!("invalid JSON: {e}")))?;

    log::debug!("messages handler called for model: {}", request.model);
    log::debug!("request has {} messages", request.messages.len());

    let stream_requested = request.stream.unwrap_or(false);
    let model = request.model.clone();

    let upstream_request = openai::ChatCompletionRequest::from(request);
    let chunks = client.chat_completion_chunks(&upstream_request).await?;

    let lines = transcode::transcode_stream(model, chunks);

    if stream_requested {
        log::debug!("returning streaming response");

        let body = Body::from_stream(lines.map(|line| Ok::<_, std::convert::Infallible>(Bytes::from(line))));

        Ok(([(header::CONTENT_TYPE, "text/event-stream")], body).into_response())
    } else {
        let mut buffer = String::new();
        let mut lines = pin!(lines);
        while let Some(line) = lines.next().await {
            buffer.push_str(&line);
        }

        let response = reduce::reduce(&buffer);

        log::debug!("reduced stream into a response with {} content blocks", response.content.len());

        Ok(Json(response).into_response())
    }
}

/// Handle token count requests. Token accounting is not implemented;
/// callers only need the shape.
async fn count_tokens() -> Json<anthropic::TokenCountResponse> {
    Json(anthropic::TokenCountResponse { input_tokens: 0 })
}

/// Every other path gets the service banner.
async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Claude Proxy for OpenAI" }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::router;

    fn test_router() -> axum::Router {
        router(&config::Config::default())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn count_tokens_returns_the_constant_shape() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/messages/count_tokens")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"model":"claude-3-sonnet-20240229","messages":[]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!({"input_tokens": 0}));
    }

    #[tokio::test]
    async fn unknown_paths_get_the_banner() {
        let response = test_router()
            .oneshot(Request::builder().uri("/some/other/path").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"message": "Claude Proxy for OpenAI"})
        );
    }

    #[tokio::test]
    async fn malformed_request_bodies_are_rejected_with_400() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/messages")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["type"], "error");
        assert_eq!(body["error"]["type"], "invalid_request_error");
    }
}
