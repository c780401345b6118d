//! Error handling for the RAG service

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, RaglineError>;

/// Crate-wide error taxonomy.
///
/// Variant names are the taxonomy terms from the design, not
/// implementation details; `IndexUnavailable` in particular is caught
/// inside `VectorIndex::search` and should never reach an HTTP handler.
#[derive(Error, Debug)]
pub enum RaglineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl RaglineError {
    /// HTTP status code this error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            RaglineError::Validation(_) => 400,
            RaglineError::Auth(_) => 401,
            RaglineError::NotFound(_) => 404,
            RaglineError::Config(_) => 500,
            RaglineError::Provider(_) => 500,
            RaglineError::IndexUnavailable(_) => 500,
            RaglineError::Timeout(_) => 500,
            RaglineError::Cancelled => 499,
            RaglineError::Database(_) => 500,
            RaglineError::Http(_) => 500,
            RaglineError::Serialization(_) => 400,
            RaglineError::Io(_) => 500,
            RaglineError::Generic(_) => 500,
        }
    }

    /// Error category for logging/metrics, matching the taxonomy names.
    pub fn category(&self) -> &'static str {
        match self {
            RaglineError::Validation(_) => "validation",
            RaglineError::Auth(_) => "auth",
            RaglineError::NotFound(_) => "not_found",
            RaglineError::Config(_) => "config",
            RaglineError::Provider(_) => "provider",
            RaglineError::IndexUnavailable(_) => "index_unavailable",
            RaglineError::Timeout(_) => "timeout",
            RaglineError::Cancelled => "cancelled",
            RaglineError::Database(_) => "database",
            RaglineError::Http(_) => "http",
            RaglineError::Serialization(_) => "serialization",
            RaglineError::Io(_) => "io",
            RaglineError::Generic(_) => "generic",
        }
    }

    /// Whether a caller on the ingestion path should log-and-skip the unit
    /// of work (chunk/page) rather than abort the whole job.
    pub fn is_skippable_in_ingestion(&self) -> bool {
        matches!(
            self,
            RaglineError::Provider(_) | RaglineError::Timeout(_) | RaglineError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(RaglineError::Validation("bad".into()).status_code(), 400);
        assert_eq!(RaglineError::Auth("missing".into()).status_code(), 401);
        assert_eq!(RaglineError::NotFound("chunk".into()).status_code(), 404);
    }

    #[test]
    fn provider_errors_are_skippable_during_ingestion() {
        let err = RaglineError::Provider("embedding timeout".into());
        assert!(err.is_skippable_in_ingestion());
        assert!(!RaglineError::Validation("x".into()).is_skippable_in_ingestion());
    }
}
