//! Ollama backend implementation
//!
//! Talks to `/api/generate` with JSON output requested. Transport failures
//! and non-2xx statuses are `ClassifierUnavailable`; a reply that cannot be
//! mapped onto the taxonomy is `InvalidClassifierResponse`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::TokenUsage;

use super::parsing::{parse_category, truncate_raw};
use super::types::{ClassificationPrompt, ClassifierResponse};
use super::ClassifierGateway;

#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            http_client: self.http_client.clone(),
            base_url: self.base_url.clone(),
            model: model.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    format: &'static str,
    stream: bool,
    options: GenerateOptions,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[async_trait]
impl ClassifierGateway for OllamaBackend {
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<ClassifierResponse> {
        let request = OllamaRequest {
            model: &self.model,
            system: &prompt.system_instruction,
            prompt: &prompt.transaction_text,
            format: "json",
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ClassifierUnavailable(format!("Ollama request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ClassifierUnavailable(format!(
                "Ollama returned {}: {}",
                status,
                truncate_raw(&body)
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ClassifierUnavailable(format!("Ollama body read failed: {}", e)))?;
        let ollama_response: OllamaResponse = serde_json::from_str(&body).map_err(|e| {
            Error::InvalidClassifierResponse(format!(
                "Unexpected Ollama envelope: {} | Raw: {}",
                e,
                truncate_raw(&body)
            ))
        })?;
        debug!("Ollama response: {}", ollama_response.response);

        let category = parse_category(&ollama_response.response)?;
        let estimated = prompt.estimated_tokens();
        let token_usage = TokenUsage::new(
            ollama_response.prompt_eval_count.unwrap_or(estimated),
            ollama_response.eval_count.unwrap_or(0),
        );

        Ok(ClassifierResponse {
            category,
            token_usage,
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
