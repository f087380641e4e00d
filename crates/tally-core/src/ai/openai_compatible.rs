//! OpenAI-compatible backend implementation
//!
//! Works with any server exposing `/v1/chat/completions`: llama.cpp,
//! vLLM, LocalAI, LM Studio, hosted OpenAI-style APIs.

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
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http_client
            .post(format!("{}{}", self.base_url, path));
        if let Some(ref api_key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", api_key));
        }
        request
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[async_trait]
impl ClassifierGateway for OpenAICompatibleBackend {
    async fn classify(&self, prompt: &ClassificationPrompt) -> Result<ClassifierResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.transaction_text,
                },
            ],
            temperature: 0.0,
            stream: false,
        };

        let response = self
            .post("/v1/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ClassifierUnavailable(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ClassifierUnavailable(format!(
                "API returned {}: {}",
                status,
                truncate_raw(&body)
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ClassifierUnavailable(format!("Body read failed: {}", e)))?;
        let chat: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            Error::InvalidClassifierResponse(format!(
                "Unexpected completion envelope: {} | Raw: {}",
                e,
                truncate_raw(&body)
            ))
        })?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                Error::InvalidClassifierResponse(format!(
                    "No completion content | Raw: {}",
                    truncate_raw(&body)
                ))
            })?;
        debug!("Completion content: {}", content);

        let category = parse_category(&content)?;
        let token_usage = match chat.usage {
            Some(usage) => TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            None => TokenUsage::new(prompt.estimated_tokens(), 0),
        };

        Ok(ClassifierResponse {
            category,
            token_usage,
        })
    }

    async fn health_check(&self) -> bool {
        // Standard OpenAI endpoint, then the /health most local servers expose
        for path in ["/v1/models", "/health"] {
            let mut request = self.http_client.get(format!("{}{}", self.base_url, path));
            if let Some(ref api_key) = self.api_key {
                request = request.header("Authorization", format!("Bearer {}", api_key));
            }
            if let Ok(resp) = request.send().await {
                if resp.status().is_success() {
                    return true;
                }
            }
        }

        // Some servers only return 200 on /
        if let Ok(resp) = self.http_client.get(&self.base_url).send().await {
            if resp.status().is_success() {
                return true;
            }
        }

        false
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}
