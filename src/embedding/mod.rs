//! Embedding generation: turns chunk or query text into fixed-dimension
//! vectors, with a bounded content-hash cache in front of the provider.

mod cache;
pub mod providers;

pub use cache::{CacheStats, EmbeddingCache};

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// A provider of text embeddings for a single fixed dimension `D`.
///
/// Implementations never change `dimension()` for the lifetime of the
/// process: callers (the index, the store) read it once at startup and
/// treat it as load-bearing.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. Implementations should prefer the
    /// provider's native batch endpoint where one exists; the default
    /// falls back to sequential `embed` calls.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// The fixed dimension of vectors this provider returns.
    fn dimension(&self) -> usize;

    /// Model identifier, for logging and cache namespacing.
    fn model_name(&self) -> &str;
}

/// Wraps an [`EmbeddingProvider`] with a bounded, content-hash-keyed cache.
///
/// This is the type `Services` holds; the raw provider is only exposed for
/// tests that need to bypass the cache.
pub struct CachedEmbeddingProvider {
    inner: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
}

impl CachedEmbeddingProvider {
    pub fn new(inner: Arc<dyn EmbeddingProvider>, capacity: usize) -> Self {
        Self {
            inner,
            cache: EmbeddingCache::new(capacity),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[async_trait]
impl EmbeddingProvider for CachedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = EmbeddingCache::key_for(self.inner.model_name(), text);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let embedding = self.inner.embed(text).await?;
        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        let mut misses = Vec::new();
        let mut miss_positions = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = EmbeddingCache::key_for(self.inner.model_name(), text);
            match self.cache.get(&key) {
                Some(hit) => out.push(Some(hit)),
                None => {
                    out.push(None);
                    misses.push(text.clone());
                    miss_positions.push(i);
                }
            }
        }

        if !misses.is_empty() {
            let fresh = self.inner.embed_batch(&misses).await?;
            for (pos, (text, embedding)) in miss_positions.into_iter().zip(misses.into_iter().zip(fresh)) {
                let key = EmbeddingCache::key_for(self.inner.model_name(), &text);
                self.cache.insert(key, embedding.clone());
                out[pos] = Some(embedding);
            }
        }

        Ok(out.into_iter().map(|v| v.expect("every position filled")).collect())
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// Builds the configured provider, wrapped in the bounded cache.
pub fn build_provider(config: &EmbeddingConfig) -> Result<CachedEmbeddingProvider> {
    let inner: Arc<dyn EmbeddingProvider> = match config.backend {
        EmbeddingBackend::Ollama => Arc::new(providers::ollama::OllamaEmbeddingProvider::new(config)?),
        EmbeddingBackend::OpenAi => Arc::new(providers::openai::OpenAiEmbeddingProvider::new(config)?),
    };
    Ok(CachedEmbeddingProvider::new(inner, config.cache_capacity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_name(&self) -> &str {
            "counting-test-model"
        }
    }

    #[tokio::test]
    async fn repeated_embed_of_same_text_hits_cache() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dimension: 4,
        });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 16);

        let a = cached.embed("hello world").await.unwrap();
        let b = cached.embed("hello world").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cache_stats().hits, 1);
        assert_eq!(cached.cache_stats().misses, 1);
    }

    #[tokio::test]
    async fn distinct_text_is_a_miss() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            dimension: 4,
        });
        let cached = CachedEmbeddingProvider::new(inner.clone(), 16);

        cached.embed("one").await.unwrap();
        cached.embed("two").await.unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cache_stats().misses, 2);
    }
}
