//! Tenant identity and resolution
//!
//! `TenantId` is the opaque identifier threaded through every core
//! operation. It is never parsed or decomposed by core logic (spec §9).

use crate::config::TenancyConfig;
use crate::error::{RaglineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque tenant identifier. Core code should take `&TenantId`, never a
/// raw `String`, so that forgetting to scope a query is a type error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Resolves an inbound credential (bearer token or API key) to a tenant.
///
/// Production deployments typically implement this against an external
/// auth service; this crate ships only the in-memory default described
/// in SPEC_FULL.md, since auth itself is out of core scope (spec §1).
pub trait TenantResolver: Send + Sync {
    fn resolve_bearer(&self, token: &str) -> Result<TenantId>;
    fn resolve_api_key(&self, key: &str) -> Result<TenantId>;
}

/// Default resolver backed by a static table loaded from config.
///
/// Bearer tokens are treated as a `"<tenant_id>.<secret>"` pair against
/// `bearer_secret`; this is a minimal standalone stand-in, not a JWT
/// implementation.
pub struct StaticTenantResolver {
    config: TenancyConfig,
}

impl StaticTenantResolver {
    pub fn new(config: TenancyConfig) -> Self {
        Self { config }
    }
}

impl TenantResolver for StaticTenantResolver {
    fn resolve_bearer(&self, token: &str) -> Result<TenantId> {
        let secret = self
            .config
            .bearer_secret
            .as_deref()
            .ok_or_else(|| RaglineError::Config("no bearer_secret configured".to_string()))?;

        let (tenant_id, provided_secret) = token
            .split_once('.')
            .ok_or_else(|| RaglineError::Auth("malformed bearer token".to_string()))?;

        if provided_secret != secret {
            return Err(RaglineError::Auth("invalid bearer token".to_string()));
        }

        Ok(TenantId::new(tenant_id.to_string()))
    }

    fn resolve_api_key(&self, key: &str) -> Result<TenantId> {
        crate::config::find_active_api_key(&self.config.api_keys, key)
            .map(|record| TenantId::new(record.tenant_id.clone()))
            .ok_or_else(|| RaglineError::Auth("unknown or inactive api key".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKeyRecord;

    fn resolver() -> StaticTenantResolver {
        StaticTenantResolver::new(TenancyConfig {
            api_keys: vec![ApiKeyRecord {
                key: "key-123".to_string(),
                tenant_id: "tenant-a".to_string(),
                status: "active".to_string(),
            }],
            bearer_secret: Some("shh".to_string()),
        })
    }

    #[test]
    fn resolves_active_api_key() {
        let tenant = resolver().resolve_api_key("key-123").unwrap();
        assert_eq!(tenant.as_str(), "tenant-a");
    }

    #[test]
    fn rejects_unknown_api_key() {
        assert!(resolver().resolve_api_key("nope").is_err());
    }

    #[test]
    fn resolves_bearer_token_with_matching_secret() {
        let tenant = resolver().resolve_bearer("tenant-a.shh").unwrap();
        assert_eq!(tenant.as_str(), "tenant-a");
    }

    #[test]
    fn rejects_bearer_token_with_wrong_secret() {
        assert!(resolver().resolve_bearer("tenant-a.wrong").is_err());
    }
}
