//! Mock model backend for integration tests
//!
//! Serves the `OpenAI` Chat Completions and Anthropic Messages endpoints,
//! streaming and not, with one canned reply. Failures, stalls and cut
//! streams can be injected for the first few requests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Mock backend returning a fixed reply
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    request_count: AtomicU32,
    stream_count: AtomicU32,
    /// Requests to fail with 500 before succeeding
    fail_count: AtomicU32,
    /// Requests to hold open before answering normally
    stall_count: AtomicU32,
    /// Streaming requests to drop after the first piece
    truncate_count: AtomicU32,
    response_content: String,
    requests: Mutex<Vec<serde_json::Value>>,
}

impl MockLlm {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner("Hello from mock LLM", 0, 0, 0).await
    }

    pub async fn start_with_response(content: &str) -> anyhow::Result<Self> {
        Self::start_inner(content, 0, 0, 0).await
    }

    /// Fail the first `n` requests with 500
    pub async fn start_failing(n: u32, content: &str) -> anyhow::Result<Self> {
        Self::start_inner(content, n, 0, 0).await
    }

    /// Never answer the first `n` requests
    pub async fn start_stalling(n: u32, content: &str) -> anyhow::Result<Self> {
        Self::start_inner(content, 0, n, 0).await
    }

    /// Drop the connection partway through the first `n` streamed replies
    pub async fn start_truncating(n: u32, content: &str) -> anyhow::Result<Self> {
        Self::start_inner(content, 0, 0, n).await
    }

    async fn start_inner(content: &str, fail_count: u32, stall_count: u32, truncate_count: u32) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            request_count: AtomicU32::new(0),
            stream_count: AtomicU32::new(0),
            fail_count: AtomicU32::new(fail_count),
            stall_count: AtomicU32::new(stall_count),
            truncate_count: AtomicU32::new(truncate_count),
            response_content: content.to_owned(),
            requests: Mutex::default(),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/messages", routing::post(handle_messages))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a binding
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Requests received, failed and stalled ones included
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::SeqCst)
    }

    /// Requests that asked for a stream
    pub fn stream_count(&self) -> u32 {
        self.state.stream_count.load(Ordering::SeqCst)
    }

    /// Request bodies in arrival order
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Count the request and apply failure or stall injection
async fn admit(state: &MockLlmState, body: &serde_json::Value) -> Option<Response> {
    state.request_count.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(body.clone());
    if body["stream"].as_bool().unwrap_or(false) {
        state.stream_count.fetch_add(1, Ordering::SeqCst);
    }

    if take(&state.stall_count) {
        tokio::time::sleep(Duration::from_secs(300)).await;
    }

    if take(&state.fail_count) {
        return Some(
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": {
                        "message": "mock server intentional failure",
                        "type": "server_error"
                    }
                })),
            )
                .into_response(),
        );
    }

    None
}

fn take(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Reply split into small pieces for streaming
fn pieces(content: &str) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    chars.chunks(4).map(|chunk| chunk.iter().collect()).collect()
}

fn sse(body: String) -> Response {
    (StatusCode::OK, [(axum::http::header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

// -- OpenAI --

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    Json(req): Json<serde_json::Value>,
) -> Response {
    if let Some(failure) = admit(&state, &req).await {
        return failure;
    }

    let model = req["model"].as_str().unwrap_or("mock-model-1").to_owned();

    if !req["stream"].as_bool().unwrap_or(false) {
        return Json(json!({
            "id": "chatcmpl-test-123",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": state.response_content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .into_response();
    }

    let chunk = |delta: serde_json::Value, finish_reason: Option<&str>| {
        let chunk = json!({
            "id": "chatcmpl-test-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
        });
        format!("data: {chunk}\n\n")
    };

    let mut body = chunk(json!({"role": "assistant", "content": ""}), None);
    let pieces = pieces(&state.response_content);
    if take(&state.truncate_count) {
        if let Some(first) = pieces.first() {
            body.push_str(&chunk(json!({"content": first}), None));
        }
        let cut = futures_util::stream::iter([
            Ok(body),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "mock stream cut")),
        ]);
        return (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(cut),
        )
            .into_response();
    }
    for piece in pieces {
        body.push_str(&chunk(json!({"content": piece}), None));
    }
    body.push_str(&chunk(json!({}), Some("stop")));
    body.push_str("data: [DONE]\n\n");
    sse(body)
}

// -- Anthropic --

async fn handle_messages(State(state): State<Arc<MockLlmState>>, Json(req): Json<serde_json::Value>) -> Response {
    if let Some(failure) = admit(&state, &req).await {
        return failure;
    }

    if !req["stream"].as_bool().unwrap_or(false) {
        return Json(json!({
            "id": "msg_test_123",
            "type": "message",
            "role": "assistant",
            "model": req["model"],
            "content": [{"type": "text", "text": state.response_content}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .into_response();
    }

    let event = |name: &str, data: serde_json::Value| format!("event: {name}\ndata: {data}\n\n");

    let mut body = event(
        "message_start",
        json!({"type": "message_start", "message": {"id": "msg_test_stream", "usage": {"input_tokens": 10, "output_tokens": 0}}}),
    );
    body.push_str(&event(
        "content_block_start",
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
    ));
    for piece in pieces(&state.response_content) {
        body.push_str(&event(
            "content_block_delta",
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": piece}}),
        ));
    }
    body.push_str(&event("content_block_stop", json!({"type": "content_block_stop", "index": 0})));
    body.push_str(&event(
        "message_delta",
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 5}}),
    ));
    body.push_str(&event("message_stop", json!({"type": "message_stop"})));
    sse(body)
}
