//! Configuration management for the RAG service

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration for the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaglineConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Chunker settings
    #[serde(default)]
    pub chunker: ChunkerConfig,

    /// Embedding provider settings
    pub embedding: EmbeddingConfig,

    /// Document store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Vector index settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Generator/LLM settings
    pub generator: GeneratorConfig,

    /// Session memory settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Crawl orchestrator settings
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Ingestion coordinator settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Tenant auth resolution settings
    #[serde(default)]
    pub tenancy: TenancyConfig,

    /// Logging/telemetry settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8080"
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Request-level timeout in seconds, enforced at the handler boundary
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Chunker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk body
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum characters of overlap between adjacent chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Ollama,
    OpenAi,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,

    /// Base URL for Ollama, or API base for an OpenAI-compatible endpoint
    pub base_url: String,

    /// API key, required for the OpenAi backend
    #[serde(default)]
    pub api_key: Option<String>,

    /// Embedding model name
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Capacity of the in-process embedding cache (N ~= 1024)
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_timeout() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    1024
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite connection URL, e.g. "sqlite:ragline.db" or "sqlite::memory:"
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum page size for `list_chunks`
    #[serde(default = "default_page_size")]
    pub max_page_size: usize,
}

fn default_database_url() -> String {
    "sqlite:ragline.db".to_string()
}

fn default_page_size() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_page_size: default_page_size(),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Qdrant gRPC/HTTP URL; if unset, the index runs fallback-only
    #[serde(default)]
    pub qdrant_url: Option<String>,

    /// Collection name in Qdrant
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Default minimum cosine similarity for a hit to count as a match
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Request timeout for the accelerated backend, in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_collection() -> String {
    "ragline_chunks".to_string()
}

fn default_min_score() -> f32 {
    0.3
}

fn default_index_timeout() -> u64 {
    5
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: None,
            collection: default_collection(),
            min_score: default_min_score(),
            timeout_secs: default_index_timeout(),
        }
    }
}

/// Which LLM backend the generator talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    Ollama,
    OpenAi,
}

/// Generator (PromptAssembler + LLM) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub backend: GeneratorBackend,
    pub base_url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Default persona used when a request does not specify one
    #[serde(default)]
    pub default_persona: PersonaConfig,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.3
}

/// Persona substituted into the generator's system preamble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub name: String,
    pub personality: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: "Ragline Assistant".to_string(),
            personality: "helpful, concise, and honest about the limits of its knowledge"
                .to_string(),
        }
    }
}

/// Session memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// In-process turns retained per session (M ~= 20)
    #[serde(default = "default_ring_size")]
    pub ring_size: usize,

    /// Durable-history worker pool size (~2 workers)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// TTL for durable history after last activity, in hours (~24h)
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
}

fn default_ring_size() -> usize {
    20
}

fn default_worker_count() -> usize {
    2
}

fn default_ttl_hours() -> i64 {
    24
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ring_size: default_ring_size(),
            worker_count: default_worker_count(),
            ttl_hours: default_ttl_hours(),
        }
    }
}

/// Crawl orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Delay between requests to the same host, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Max concurrent fetches per orchestrator/job
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Per-page fetch timeout, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Hard ceiling on pages crawled per job, independent of max_depth
    #[serde(default = "default_max_pages")]
    pub max_pages_per_job: usize,

    /// Same-domain links enqueued per page
    #[serde(default = "default_links_per_page")]
    pub links_per_page: usize,

    /// Minimum extracted-text length; shorter pages are skipped
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    #[serde(default = "default_true")]
    pub respect_robots_txt: bool,
}

fn default_user_agent() -> String {
    "ragline-crawler/0.1".to_string()
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_max_concurrent_fetches() -> usize {
    2
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_max_pages() -> usize {
    200
}

fn default_links_per_page() -> usize {
    10
}

fn default_min_content_chars() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_delay_ms: default_request_delay_ms(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_pages_per_job: default_max_pages(),
            links_per_page: default_links_per_page(),
            min_content_chars: default_min_content_chars(),
            respect_robots_txt: true,
        }
    }
}

/// Ingestion coordinator (file upload) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content_chars(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// A single static API key record used by the default in-memory resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub key: String,
    pub tenant_id: String,
    /// Legacy rows predating this field are absent here, never defaulted
    /// to "active" -- see DESIGN.md for the resolved Open Question.
    pub status: String,
}

/// Tenant resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TenancyConfig {
    #[serde(default)]
    pub api_keys: Vec<ApiKeyRecord>,

    /// bearer-token signing secret, used by the default resolver only
    #[serde(default)]
    pub bearer_secret: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info,ragline=debug".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "nomic-embed-text".to_string(),
            timeout_secs: default_timeout(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            model: "llama3.2".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            default_persona: PersonaConfig::default(),
        }
    }
}

impl Default for RaglineConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            chunker: ChunkerConfig::default(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            index: IndexConfig::default(),
            generator: GeneratorConfig::default(),
            session: SessionConfig::default(),
            crawl: CrawlConfig::default(),
            ingest: IngestConfig::default(),
            tenancy: TenancyConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RaglineConfig {
    /// Load configuration from a JSON, TOML, or YAML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&content)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string(self)?,
            Some("yaml") | Some("yml") => serde_yml::to_string(self)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate cross-field constraints not expressible via serde defaults
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.chunker.chunk_size == 0 {
            return Err(anyhow::anyhow!("chunker.chunk_size must be greater than 0"));
        }
        if self.chunker.overlap >= self.chunker.chunk_size {
            return Err(anyhow::anyhow!(
                "chunker.overlap must be smaller than chunker.chunk_size"
            ));
        }
        if self.embedding.model.is_empty() {
            return Err(anyhow::anyhow!("embedding.model cannot be empty"));
        }
        if matches!(self.embedding.backend, EmbeddingBackend::OpenAi) && self.embedding.api_key.is_none()
        {
            return Err(anyhow::anyhow!("embedding.api_key is required for the openai backend"));
        }
        if matches!(self.generator.backend, GeneratorBackend::OpenAi) && self.generator.api_key.is_none()
        {
            return Err(anyhow::anyhow!("generator.api_key is required for the openai backend"));
        }
        if !(-1.0..=1.0).contains(&self.index.min_score) {
            return Err(anyhow::anyhow!("index.min_score must be within [-1.0, 1.0]"));
        }
        Ok(())
    }
}

/// Looks up a key record by raw key, requiring an explicit "active" status.
///
/// Legacy records that predate the `status` field are rejected rather than
/// treated as active -- see DESIGN.md.
pub fn find_active_api_key<'a>(
    keys: &'a [ApiKeyRecord],
    raw_key: &str,
) -> Option<&'a ApiKeyRecord> {
    keys.iter()
        .find(|k| k.key == raw_key && k.status == "active")
}

/// Handy grouping used by the Services constructor when validating the
/// generator/embedding backends share credentials, keyed by backend name.
pub type BackendCredentials = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_once_required_fields_are_set() {
        let config = RaglineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = RaglineConfig::default();
        config.chunker.overlap = config.chunker.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn openai_backend_requires_api_key() {
        let mut config = RaglineConfig::default();
        config.embedding.backend = EmbeddingBackend::OpenAi;
        config.embedding.api_key = None;
        assert!(config.validate().is_err());
        config.embedding.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn min_score_above_one_is_rejected() {
        let mut config = RaglineConfig::default();
        config.index.min_score = 2.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_score_within_range_is_accepted() {
        let mut config = RaglineConfig::default();
        config.index.min_score = -0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn legacy_api_key_without_status_is_rejected() {
        let keys = vec![ApiKeyRecord {
            key: "abc".to_string(),
            tenant_id: "t1".to_string(),
            status: "".to_string(),
        }];
        assert!(find_active_api_key(&keys, "abc").is_none());
    }

    #[test]
    fn active_api_key_resolves() {
        let keys = vec![ApiKeyRecord {
            key: "abc".to_string(),
            tenant_id: "t1".to_string(),
            status: "active".to_string(),
        }];
        let found = find_active_api_key(&keys, "abc").unwrap();
        assert_eq!(found.tenant_id, "t1");
    }
}
