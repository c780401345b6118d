//! Prompt assembly and answer generation (spec §4.6: PromptAssembler + Generator).

pub mod prompt;
pub mod providers;

pub use prompt::HistoryTurn;

use crate::config::{GeneratorBackend, GeneratorConfig, PersonaConfig};
use crate::error::Result;
use crate::llm::Message;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::warn;

const FALLBACK_ANSWER: &str = "I don't have enough information to answer that.";

/// Raw chat completion call against an LLM backend. Kept separate from
/// [`Generator`] so prompt assembly, response extraction, and the
/// errors-become-answer-text behavior stay in one place regardless of
/// which backend is configured.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Streams response fragments. The default wraps `complete` in a
    /// single-element stream for backends with no native streaming.
    async fn complete_stream(&self, messages: &[Message]) -> Result<BoxStream<'static, Result<String>>> {
        let text = self.complete(messages).await;
        Ok(Box::pin(futures::stream::once(async move { text })))
    }
}

pub struct Generator {
    provider: Arc<dyn ChatProvider>,
    default_persona: PersonaConfig,
}

impl Generator {
    pub fn new(provider: Arc<dyn ChatProvider>, config: &GeneratorConfig) -> Self {
        Self {
            provider,
            default_persona: config.default_persona.clone(),
        }
    }

    fn persona_or_default<'a>(&'a self, persona: Option<&'a PersonaConfig>) -> &'a PersonaConfig {
        persona.unwrap_or(&self.default_persona)
    }

    /// Generates a single answer. LLM transport errors are converted into
    /// answer text rather than propagated, so the request succeeds at the
    /// API layer while the failure stays observable (spec §4.6).
    pub async fn answer(
        &self,
        query: &str,
        context_blob: &str,
        history: &[HistoryTurn],
        persona: Option<&PersonaConfig>,
    ) -> String {
        let messages = prompt::assemble_messages(query, context_blob, history, self.persona_or_default(persona));

        match self.provider.complete(&messages).await {
            Ok(text) => {
                let extracted = text.trim();
                if extracted.is_empty() {
                    FALLBACK_ANSWER.to_string()
                } else {
                    extracted.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "generator provider call failed");
                format!("Error generating answer: {e}")
            }
        }
    }

    pub async fn stream(
        &self,
        query: &str,
        context_blob: &str,
        history: &[HistoryTurn],
        persona: Option<&PersonaConfig>,
    ) -> BoxStream<'static, Result<String>> {
        let messages = prompt::assemble_messages(query, context_blob, history, self.persona_or_default(persona));

        match self.provider.complete_stream(&messages).await {
            Ok(stream) => stream,
            Err(e) => Box::pin(futures::stream::once(async move { Err(e) })),
        }
    }
}

pub fn build_provider(config: &GeneratorConfig) -> Result<Arc<dyn ChatProvider>> {
    Ok(match config.backend {
        GeneratorBackend::Ollama => Arc::new(providers::ollama::OllamaChatProvider::new(config)?),
        GeneratorBackend::OpenAi => Arc::new(providers::openai::OpenAiChatProvider::new(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RaglineError;
    use futures::StreamExt;

    struct StaticProvider(String);

    #[async_trait]
    impl ChatProvider for StaticProvider {
        async fn complete(&self, _messages: &[Message]) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ChatProvider for FailingProvider {
        async fn complete(&self, _messages: &[Message]) -> Result<String> {
            Err(RaglineError::Timeout("llm call".to_string()))
        }
    }

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            backend: GeneratorBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "test-model".to_string(),
            max_tokens: 1024,
            temperature: 0.3,
            timeout_secs: 30,
            default_persona: PersonaConfig::default(),
        }
    }

    #[tokio::test]
    async fn returns_provider_text_trimmed() {
        let generator = Generator::new(Arc::new(StaticProvider("  hello there  ".to_string())), &config());
        let answer = generator.answer("q", "", &[], None).await;
        assert_eq!(answer, "hello there");
    }

    #[tokio::test]
    async fn empty_extraction_falls_back_to_canonical_message() {
        let generator = Generator::new(Arc::new(StaticProvider("   ".to_string())), &config());
        let answer = generator.answer("q", "", &[], None).await;
        assert_eq!(answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn provider_errors_become_answer_text() {
        let generator = Generator::new(Arc::new(FailingProvider), &config());
        let answer = generator.answer("q", "", &[], None).await;
        assert!(answer.starts_with("Error generating answer:"));
    }

    #[tokio::test]
    async fn stream_default_impl_yields_a_single_fragment() {
        let generator = Generator::new(Arc::new(StaticProvider("full answer".to_string())), &config());
        let mut stream = generator.stream("q", "", &[], None).await;
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "full answer");
        assert!(stream.next().await.is_none());
    }
}
