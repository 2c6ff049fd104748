//! Remote catalog contract
//!
//! The catalog answers two questions: "which tracks match this query" and
//! "where can I stream this track from". Both are fallible network calls.
//! Implementations never retry; retry policy belongs to the UI.

use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use thiserror::Error;

use crate::models::{SearchPage, TrackId};

/// Catalog failures.
///
/// `Clone` because one settled request is handed to every caller that was
/// coalesced onto it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Bridge error: {0}")]
    Bridge(String),
}

impl CatalogError {
    /// Whether the UI may offer a retry
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Network(_) | CatalogError::Timeout(_) => true,
            CatalogError::Api { status, .. } => *status >= 500 || *status == 429,
            CatalogError::InvalidResponse(_) | CatalogError::Bridge(_) => false,
        }
    }
}

impl From<BridgeError> for CatalogError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Timeout(msg) => CatalogError::Timeout(msg),
            BridgeError::OperationFailed(msg) => CatalogError::Network(msg),
            BridgeError::Io(e) => CatalogError::Network(e.to_string()),
            other => CatalogError::Bridge(other.to_string()),
        }
    }
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Remote resolution service
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// Search tracks, starting at `offset`
    async fn search(&self, query: &str, offset: u32) -> CatalogResult<SearchPage>;

    /// Resolve a playable stream URL for a track
    async fn stream_url(&self, track_id: TrackId) -> CatalogResult<String>;
}
