//! The Resource Provider seam.
//!
//! The protocol layer is generic over this trait; the shipped
//! implementation lives in `trove-provider`. Providers may perform
//! arbitrary I/O but must not touch dispatcher or registry state, and
//! every failure they raise is surfaced to the caller as a structured
//! error.

use async_trait::async_trait;

use crate::resources::{CategorySummary, Resource};

/// Typed error hierarchy for provider operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rate limited")]
    RateLimited,
    #[error("upstream error {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("catalog error: {0}")]
    Catalog(String),
}

impl ProviderError {
    /// Short classification string for logging and diagnostic payloads.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::Upstream { .. } => "upstream_error",
            Self::Network(_) => "network_error",
            Self::Catalog(_) => "catalog_error",
        }
    }

    /// Whether a caller could plausibly succeed by retrying later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::Upstream { .. } | Self::Network(_)
        )
    }
}

/// Trait implemented by each resource provider backend.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Case-insensitive keyword search over resource names and
    /// descriptions, capped at `limit` results.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Resource>, ProviderError>;

    /// Every category with its resource count.
    async fn categories(&self) -> Result<Vec<CategorySummary>, ProviderError>;

    /// Resources filed under `category`, capped at `limit` results.
    async fn by_category(&self, category: &str, limit: usize)
        -> Result<Vec<Resource>, ProviderError>;
}
