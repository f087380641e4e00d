//! Pluggable remote classifier abstraction
//!
//! # Architecture
//!
//! - `ClassifierGateway` trait: one classification call plus health probing
//! - `ClassifierClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockClassifier`
//!
//! # Usage
//!
//! ```rust,ignore
//! let classifier = ClassifierClient::from_config(&config.classifier);
//!
//! if let Some(ref client) = classifier {
//!     let prompt = ClassificationPrompt::for_description("loblaws #1042");
//!     let response = client.classify(&prompt).await?;
//!     println!("Category: {}", response.category);
//! }
//! ```
//!
//! # Configuration
//!
//! The `[classifier]` section of the engine config, or the
//! `TALLY_CLASSIFIER_*` environment variables:
//! - `backend`: ollama (default), openai_compatible, mock
//! - `host`: server URL (required for ollama and openai_compatible)
//! - `model`: model name (default: llama3.2)
//! - `api_key`: bearer token for OpenAI-compatible servers (optional)

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::{MockBehavior, MockClassifier};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::{ClassifierBackendKind, ClassifierConfig};
use crate::error::Result;

/// Interface to the remote classifier
///
/// Implementations report transport failures and non-2xx statuses as
/// `ClassifierUnavailable`, and replies outside the taxonomy as
/// `InvalidClassifierResponse`. They never retry; deadlines are enforced by
/// the caller.
#[async_trait]
pub trait ClassifierGateway: Send + Sync {
    /// Classify one normalized description
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<ClassifierResponse>;

    /// Check if the backend is reachable
    async fn health_check(&self) -> bool;

    /// Get the model name (for metrics)
    fn model(&self) -> &str;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete classifier client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ClassifierClient {
    /// Ollama backend (HTTP API)
    Ollama(OllamaBackend),
    /// OpenAI-compatible backend (llama.cpp, vLLM, LocalAI, hosted APIs)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockClassifier),
}

impl ClassifierClient {
    /// Create a client from the `[classifier]` config section
    ///
    /// Returns None when a network backend has no host configured; the
    /// engine then runs rules-only.
    pub fn from_config(config: &ClassifierConfig) -> Option<Self> {
        match config.backend {
            ClassifierBackendKind::Mock => Some(ClassifierClient::Mock(MockClassifier::new())),
            ClassifierBackendKind::Ollama => {
                let host = config.host.as_deref()?;
                Some(ClassifierClient::Ollama(OllamaBackend::new(host, &config.model)))
            }
            ClassifierBackendKind::OpenaiCompatible => {
                let host = config.host.as_deref()?;
                let backend = match config.api_key.as_deref() {
                    Some(key) if !key.is_empty() => {
                        OpenAICompatibleBackend::with_api_key(host, &config.model, key)
                    }
                    _ => OpenAICompatibleBackend::new(host, &config.model),
                };
                Some(ClassifierClient::OpenAICompatible(backend))
            }
        }
    }

    /// Create an Ollama backend directly
    pub fn ollama(host: &str, model: &str) -> Self {
        ClassifierClient::Ollama(OllamaBackend::new(host, model))
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ClassifierClient::Mock(MockClassifier::new())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            ClassifierClient::Ollama(_) => "ollama",
            ClassifierClient::OpenAICompatible(_) => "openai_compatible",
            ClassifierClient::Mock(_) => "mock",
        }
    }
}

// Implement ClassifierGateway for ClassifierClient by delegating to the inner backend
#[async_trait]
impl ClassifierGateway for ClassifierClient {
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<ClassifierResponse> {
        match self {
            ClassifierClient::Ollama(b) => b.classify(prompt).await,
            ClassifierClient::OpenAICompatible(b) => b.classify(prompt).await,
            ClassifierClient::Mock(b) => b.classify(prompt).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ClassifierClient::Ollama(b) => b.health_check().await,
            ClassifierClient::OpenAICompatible(b) => b.health_check().await,
            ClassifierClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            ClassifierClient::Ollama(b) => b.model(),
            ClassifierClient::OpenAICompatible(b) => b.model(),
            ClassifierClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            ClassifierClient::Ollama(b) => b.host(),
            ClassifierClient::OpenAICompatible(b) => b.host(),
            ClassifierClient::Mock(b) => b.host(),
        }
    }
}
