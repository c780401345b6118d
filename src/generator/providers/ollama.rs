//! Ollama-backed chat provider for the generator.

use super::extract_text;
use crate::config::GeneratorConfig;
use crate::error::{RaglineError, Result};
use crate::generator::ChatProvider;
use crate::llm::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: Value,
}

pub struct OllamaChatProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

impl OllamaChatProvider {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(RaglineError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl ChatProvider for OllamaChatProvider {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: OllamaOptions {
                num_predict: self.max_tokens,
                temperature: self.temperature,
            },
        };

        debug!("requesting chat completion from {}", url);

        let response = timeout(
            Duration::from_secs(self.timeout_secs),
            self.client.post(&url).json(&request).send(),
        )
        .await
        .map_err(|_| RaglineError::Timeout("ollama chat request".to_string()))?
        .map_err(RaglineError::Http)?;

        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RaglineError::Provider(format!("ollama chat request failed: {body}")));
        }

        let parsed: OllamaChatResponse = response.json().await.map_err(RaglineError::Http)?;
        if !parsed.done {
            return Err(RaglineError::Provider("ollama returned an incomplete response".to_string()));
        }

        Ok(extract_text(&parsed.message.content))
    }
}
