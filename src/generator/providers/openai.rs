//! OpenAI-compatible chat provider for the generator, with native SSE
//! streaming support.

use super::extract_text;
use crate::config::GeneratorConfig;
use crate::error::{RaglineError, Result};
use crate::generator::ChatProvider;
use crate::llm::Message;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<Value>,
}

pub struct OpenAiChatProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout_secs: u64,
}

impl OpenAiChatProvider {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| RaglineError::Config("openai generator backend requires api_key".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(RaglineError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(&self, messages: &[Message]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = OpenAiChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        debug!("requesting chat completion from {}", url);

        let response = timeout(
            Duration::from_secs(self.timeout_secs),
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| RaglineError::Timeout("openai chat request".to_string()))?
        .map_err(RaglineError::Http)?;

        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RaglineError::Provider(format!("openai chat request failed: {body}")));
        }

        let parsed: OpenAiChatResponse = response.json().await.map_err(RaglineError::Http)?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RaglineError::Provider("openai returned no choices".to_string()))?;

        Ok(extract_text(&choice.message.content))
    }

    async fn complete_stream(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = OpenAiChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(RaglineError::Http)?;

        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RaglineError::Provider(format!("openai chat stream failed: {body}")));
        }

        let byte_stream = response.bytes_stream();
        let fragments = byte_stream
            .map(|chunk| chunk.map_err(RaglineError::Http))
            .flat_map(|chunk| {
                let fragments = match chunk {
                    Ok(bytes) => parse_sse_fragments(&bytes),
                    Err(e) => vec![Err(e)],
                };
                futures::stream::iter(fragments)
            })
            .filter_map(|item| async move {
                match item {
                    Ok(text) if text.is_empty() => None,
                    other => Some(other),
                }
            });

        Ok(Box::pin(fragments))
    }
}

fn parse_sse_fragments(bytes: &[u8]) -> Vec<Result<String>> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = Vec::new();

    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        if data.trim() == "[DONE]" {
            continue;
        }
        match serde_json::from_str::<OpenAiStreamChunk>(data) {
            Ok(chunk) => {
                for choice in chunk.choices {
                    if let Some(content) = choice.delta.content {
                        out.push(Ok(extract_text(&content)));
                    }
                }
            }
            Err(e) => out.push(Err(RaglineError::Serialization(e))),
        }
    }

    out
}
