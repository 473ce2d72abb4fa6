//! A small axum-based mock provider standing in for a real LLM/embedding
//! HTTP endpoint, grounded on the workspace's OpenAI mock server shape.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response, Sse, sse::Event},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

struct MockState {
    call_count: AtomicUsize,
    fail_first_n: usize,
    fail_status: StatusCode,
    response_content: String,
    streaming_chunks: Vec<String>,
}

/// Configures and spawns a mock provider process. Every call is counted;
/// the first `fail_first_n` calls return `fail_status` before calls succeed,
/// so retry behaviour can be exercised without a separate server.
pub struct MockProvider {
    address: std::net::SocketAddr,
    state: Arc<MockState>,
}

impl MockProvider {
    /// Starts a mock provider that always answers with `content`.
    pub async fn start(content: impl Into<String>) -> Self {
        Self::start_with(content.into(), 0, StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).await
    }

    /// Starts a mock provider whose first `fail_first_n` calls return
    /// `fail_status`, after which calls succeed with `content`.
    pub async fn start_failing_then_succeeding(content: impl Into<String>, fail_first_n: usize, fail_status: StatusCode) -> Self {
        Self::start_with(content.into(), fail_first_n, fail_status, Vec::new()).await
    }

    /// Starts a mock provider whose chat completions stream `chunks` as SSE
    /// content deltas before a terminal `stop` chunk.
    pub async fn start_streaming(chunks: Vec<&str>) -> Self {
        Self::start_with(String::new(), 0, StatusCode::INTERNAL_SERVER_ERROR, chunks.into_iter().map(String::from).collect()).await
    }

    async fn start_with(content: String, fail_first_n: usize, fail_status: StatusCode, streaming_chunks: Vec<String>) -> Self {
        let state = Arc::new(MockState {
            call_count: AtomicUsize::new(0),
            fail_first_n,
            fail_status,
            response_content: content,
            streaming_chunks,
        });

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .route("/v1/embeddings", post(embeddings))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        Self { address, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// Total number of requests this mock has received so far.
    pub fn call_count(&self) -> usize {
        self.state.call_count.load(Ordering::SeqCst)
    }
}

async fn chat_completions(State(state): State<Arc<MockState>>, Json(request): Json<Value>) -> Response {
    let attempt = state.call_count.fetch_add(1, Ordering::SeqCst);

    if attempt < state.fail_first_n {
        return (state.fail_status, "mock induced failure").into_response();
    }

    let model = request.get("model").and_then(Value::as_str).unwrap_or("mock-model").to_string();

    if request.get("stream").and_then(Value::as_bool).unwrap_or(false) {
        return streaming_response(&model, &state.streaming_chunks).into_response();
    }

    Json(json!({
        "choices": [{
            "message": { "role": "assistant", "content": state.response_content, "tool_calls": [] },
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

fn streaming_response(model: &str, chunks: &[String]) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>> + 'static> {
    let mut events = Vec::new();

    for chunk in chunks {
        let payload = json!({
            "model": model,
            "choices": [{ "delta": { "content": chunk }, "finish_reason": null }]
        });
        events.push(Event::default().data(payload.to_string()));
    }

    let terminal = json!({
        "model": model,
        "choices": [{ "delta": {}, "finish_reason": "stop" }]
    });
    events.push(Event::default().data(terminal.to_string()));
    events.push(Event::default().data("[DONE]"));

    Sse::new(futures::stream::iter(events.into_iter().map(Ok)))
}

async fn embeddings(State(state): State<Arc<MockState>>, Json(request): Json<Value>) -> Response {
    state.call_count.fetch_add(1, Ordering::SeqCst);

    let inputs = request.get("input").and_then(Value::as_array).cloned().unwrap_or_default();

    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(index, input)| {
            let seed = input.as_str().map(str::len).unwrap_or(0) as f32;
            json!({ "index": index, "embedding": [seed, seed + 1.0, seed + 2.0] })
        })
        .collect();

    Json(json!({ "data": data })).into_response()
}
