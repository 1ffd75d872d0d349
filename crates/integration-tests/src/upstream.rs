//! Mock OpenAI-compatible upstream.
//!
//! Serves `/v1/chat/completions` with canned replies, both as a single JSON
//! completion and as an SSE stream terminated by `[DONE]`. Configured tool
//! calls are emitted with their argument payloads split across two chunks
//! so tests exercise delta assembly.

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::post,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const MOCK_CREATED: u64 = 1677651200;

/// What the mock endpoint answers with.
#[derive(Clone, Default)]
struct MockBehavior {
    text: Option<String>,
    tool_calls: Vec<Value>,
    stream_tokens: Vec<String>,
    error: Option<(u16, String)>,
}

impl MockBehavior {
    fn content(&self) -> Option<String> {
        self.text.clone().or_else(|| {
            if self.stream_tokens.is_empty() {
                None
            } else {
                Some(self.stream_tokens.concat())
            }
        })
    }

    fn finish_reason(&self) -> &'static str {
        if self.tool_calls.is_empty() { "stop" } else { "tool_calls" }
    }
}

#[derive(Clone)]
struct AppState {
    behavior: MockBehavior,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

/// A request the mock captured, with the pieces tests assert on.
#[derive(Clone, Debug)]
pub struct ReceivedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct MockUpstreamBuilder {
    behavior: MockBehavior,
}

impl MockUpstreamBuilder {
    /// Reply with this text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.behavior.text = Some(text.into());
        self
    }

    /// Attach a tool call to the reply. The arguments string is emitted
    /// verbatim in non-streaming replies and split in two for streaming.
    pub fn with_tool_call(mut self, id: &str, name: &str, arguments: &str) -> Self {
        self.behavior.tool_calls.push(json!({
            "id": id,
            "type": "function",
            "function": { "name": name, "arguments": arguments }
        }));

        self
    }

    /// Tokens emitted one per SSE chunk for streaming calls. Non-streaming
    /// calls reply with their concatenation unless a text is set.
    pub fn with_stream_tokens(mut self, tokens: &[&str]) -> Self {
        self.behavior.stream_tokens = tokens.iter().map(|token| token.to_string()).collect();
        self
    }

    /// Fail every request with this status and body.
    pub fn with_error(mut self, status: u16, body: impl Into<String>) -> Self {
        self.behavior.error = Some((status, body.into()));
        self
    }

    pub async fn spawn(self) -> MockUpstream {
        let requests = Arc::new(Mutex::new(Vec::new()));

        let state = AppState {
            behavior: self.behavior,
            requests: requests.clone(),
        };

        let router = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock upstream");

        let addr = listener.local_addr().expect("mock upstream has a local address");

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        MockUpstream { addr, requests }
    }
}

pub struct MockUpstream {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl MockUpstream {
    pub fn builder() -> MockUpstreamBuilder {
        MockUpstreamBuilder::default()
    }

    /// Base URL to hand to the chat agent (its `baseURL` parameter).
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Requests captured so far, in arrival order.
    pub fn received_requests(&self) -> Vec<ReceivedRequest> {
        self.requests.lock().expect("mock request log is not poisoned").clone()
    }
}

async fn chat_completions(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    state
        .requests
        .lock()
        .expect("mock request log is not poisoned")
        .push(ReceivedRequest {
            authorization,
            body: body.clone(),
        });

    if let Some((status, error_body)) = &state.behavior.error {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, error_body.clone()).into_response();
    }

    let model = body["model"].as_str().unwrap_or("deepseek-chat").to_string();

    if body["stream"].as_bool().unwrap_or(false) {
        streaming_response(&state.behavior, &model)
    } else {
        Json(completion(&state.behavior, &model)).into_response()
    }
}

fn completion(behavior: &MockBehavior, model: &str) -> Value {
    let mut message = json!({
        "role": "assistant",
        "content": behavior.content(),
    });

    if !behavior.tool_calls.is_empty() {
        message["tool_calls"] = Value::Array(behavior.tool_calls.clone());
    }

    json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        "object": "chat.completion",
        "created": MOCK_CREATED,
        "model": model,
        "choices": [{
            "index": 0,
            "message": message,
            "finish_reason": behavior.finish_reason()
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 15, "total_tokens": 25 }
    })
}

fn streaming_response(behavior: &MockBehavior, model: &str) -> Response {
    let id = format!("chatcmpl-{}", uuid::Uuid::new_v4());

    let mut chunks = vec![chunk(&id, model, json!({ "role": "assistant" }), None)];

    let tokens = if behavior.stream_tokens.is_empty() {
        behavior.text.clone().into_iter().collect()
    } else {
        behavior.stream_tokens.clone()
    };

    for token in &tokens {
        chunks.push(chunk(&id, model, json!({ "content": token }), None));
    }

    for (index, tool_call) in behavior.tool_calls.iter().enumerate() {
        let arguments = tool_call["function"]["arguments"].as_str().unwrap_or_default();
        let (head, tail) = arguments.split_at(arguments.len() / 2);

        chunks.push(chunk(
            &id,
            model,
            json!({
                "tool_calls": [{
                    "index": index,
                    "id": tool_call["id"],
                    "function": { "name": tool_call["function"]["name"], "arguments": head }
                }]
            }),
            None,
        ));

        chunks.push(chunk(
            &id,
            model,
            json!({
                "tool_calls": [{ "index": index, "function": { "arguments": tail } }]
            }),
            None,
        ));
    }

    chunks.push(final_chunk(&id, model, behavior.finish_reason()));

    let events = chunks
        .into_iter()
        .map(|chunk| Ok::<_, Infallible>(Event::default().data(chunk.to_string())))
        .chain(std::iter::once(Ok(Event::default().data("[DONE]"))));

    Sse::new(futures::stream::iter(events)).into_response()
}

fn chunk(id: &str, model: &str, delta: Value, finish_reason: Option<&str>) -> Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": MOCK_CREATED,
        "model": model,
        "choices": [{ "index": 0, "delta": delta, "finish_reason": finish_reason }]
    })
}

fn final_chunk(id: &str, model: &str, finish_reason: &str) -> Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": MOCK_CREATED,
        "model": model,
        "choices": [{ "index": 0, "delta": {}, "finish_reason": finish_reason }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 15, "total_tokens": 25 }
    })
}
