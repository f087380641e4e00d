//! Test utilities for tally-core
//!
//! A mock classifier server speaking both the Ollama and the
//! OpenAI-compatible wire shapes, and a webhook sink that captures alert
//! notifications. Both bind to an ephemeral port on 127.0.0.1.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::MockClassifier;
use crate::models::Category;

/// How the mock classifier server answers
#[derive(Debug, Clone, PartialEq)]
pub enum MockServerMode {
    /// Label from the mock keyword table
    Keywords,
    /// Always the same label
    Fixed(Category),
    /// A label outside the taxonomy
    Garbage,
    /// HTTP 500 on every classification
    Failing,
}

#[derive(Clone)]
struct ServerState {
    mode: MockServerMode,
    requests: Arc<AtomicUsize>,
}

impl ServerState {
    fn answer(&self, text: &str) -> Option<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match &self.mode {
            MockServerMode::Keywords => {
                Some(json!({ "category": MockClassifier::keyword_category(text).as_str() }).to_string())
            }
            MockServerMode::Fixed(category) => Some(json!({ "category": category.as_str() }).to_string()),
            MockServerMode::Garbage => Some(json!({ "category": "Cryptocurrency" }).to_string()),
            MockServerMode::Failing => None,
        }
    }
}

async fn spawn(app: Router) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

/// Mock classifier server for backend and end-to-end tests
pub struct MockClassifierServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockClassifierServer {
    pub async fn start() -> Self {
        Self::start_with(MockServerMode::Keywords).await
    }

    pub async fn start_with(mode: MockServerMode) -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            mode,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state);

        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Classification requests served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockClassifierServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_tags() -> Json<Value> {
    Json(json!({ "models": [{ "name": "llama3.2:latest" }] }))
}

async fn handle_models() -> Json<Value> {
    Json(json!({ "object": "list", "data": [{ "id": "mock-model", "object": "model" }] }))
}

#[derive(Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
}

async fn handle_generate(
    State(state): State<ServerState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    match state.answer(&request.prompt) {
        Some(answer) => Json(json!({
            "model": request.model,
            "response": answer,
            "done": true,
            "prompt_eval_count": 120,
            "eval_count": 8,
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response(),
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

async fn handle_chat(State(state): State<ServerState>, Json(request): Json<ChatRequest>) -> Response {
    let text = request
        .messages
        .iter()
        .filter(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    match state.answer(&text) {
        Some(answer) => Json(json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": request.model,
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": answer },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128 }
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response(),
    }
}

/// Captures JSON posted to it, standing in for a webhook or email relay
pub struct WebhookSink {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl WebhookSink {
    pub async fn start() -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/", post(handle_hook))
            .route("/send", post(handle_hook))
            .with_state(received.clone());

        let (addr, shutdown_tx) = spawn(app).await;
        Self {
            addr,
            received,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Relay-style endpoint for email notifications
    pub fn relay_url(&self) -> String {
        format!("http://{}/send", self.addr)
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for WebhookSink {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_hook(
    State(received): State<Arc<Mutex<Vec<Value>>>>,
    Json(payload): Json<Value>,
) -> StatusCode {
    received.lock().unwrap().push(payload);
    StatusCode::NO_CONTENT
}
