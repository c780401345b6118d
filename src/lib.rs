//! Multi-tenant retrieval-augmented generation service.
//!
//! Ties together document ingestion, chunking, cache-aware embedding, a
//! dual-backend vector index, retrieval, prompt assembly, generation, and
//! session memory behind an axum HTTP surface (see [`api`] and
//! [`services::Services`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use ragline::config::RaglineConfig;
//! use ragline::services::Services;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = RaglineConfig::default();
//!     let services = Services::new(config).await?;
//!     let router = ragline::api::create_router(std::sync::Arc::new(services));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chunker;
pub mod config;
pub mod crawl;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod retriever;
pub mod services;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod tenant;

pub use config::RaglineConfig;
pub use error::{RaglineError, Result};
pub use services::Services;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
