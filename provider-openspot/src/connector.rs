//! OpenSpot API connector
//!
//! Implements `TrackCatalog` over the `HttpClient` bridge.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use core_library::catalog::{CatalogError, CatalogResult, TrackCatalog};
use core_library::models::{SearchPage, TrackId};
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::types::{SearchResponse, StreamResponse};

/// Default timeout for `/search`
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for `/stream`
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(15);

/// OpenSpot catalog connector
///
/// # Example
///
/// ```ignore
/// use provider_openspot::OpenSpotCatalog;
/// use core_library::catalog::TrackCatalog;
///
/// let catalog = OpenSpotCatalog::new(http_client, "https://api.example.com");
/// let page = catalog.search("massive attack", 0).await?;
/// ```
pub struct OpenSpotCatalog {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl OpenSpotCatalog {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, request_timeout: Duration, stream_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self.stream_timeout = stream_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn search_url(&self, query: &str, offset: u32) -> String {
        format!(
            "{}/search?q={}&offset={}&type=track",
            self.base_url,
            urlencoding::encode(query),
            offset
        )
    }

    fn stream_url_for(&self, track_id: TrackId) -> String {
        format!("{}/stream?trackId={}", self.base_url, track_id)
    }

    /// Single attempt; non-2xx statuses become `CatalogError::Api`
    async fn get(&self, url: String, timeout: Duration) -> CatalogResult<HttpResponse> {
        let logged_url = redact_if_sensitive("url", &url);
        let request = HttpRequest::get(url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .timeout(timeout);

        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            debug!(url = %logged_url, status = response.status, "Catalog request succeeded");
            return Ok(response);
        }

        let message = response
            .text()
            .ok()
            .filter(|body| !body.trim().is_empty())
            .unwrap_or_else(|| "no response body".to_string());
        warn!(url = %logged_url, status = response.status, "Catalog request failed");
        Err(CatalogError::Api {
            status: response.status,
            message,
        })
    }
}

#[async_trait]
impl TrackCatalog for OpenSpotCatalog {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, offset: u32) -> CatalogResult<SearchPage> {
        let url = self.search_url(query, offset);
        let response = self.get(url, self.request_timeout).await?;

        let parsed: SearchResponse = serde_json::from_slice(&response.body).map_err(|e| {
            CatalogError::InvalidResponse(format!("Failed to parse search response: {}", e))
        })?;

        debug!(
            count = parsed.tracks.len(),
            has_more = parsed.pagination.has_more,
            "Search page received"
        );

        Ok(SearchPage {
            tracks: parsed.tracks,
            has_more: parsed.pagination.has_more,
            offset: parsed.pagination.offset.unwrap_or(offset),
            total: parsed.pagination.total,
        })
    }

    #[instrument(skip(self), fields(track_id = %track_id))]
    async fn stream_url(&self, track_id: TrackId) -> CatalogResult<String> {
        let url = self.stream_url_for(track_id);
        let response = self.get(url, self.stream_timeout).await?;

        let parsed: StreamResponse = serde_json::from_slice(&response.body).map_err(|e| {
            CatalogError::InvalidResponse(format!("Failed to parse stream response: {}", e))
        })?;

        match parsed.url {
            Some(url) if !url.trim().is_empty() => {
                debug!(stream_url = %redact_if_sensitive("stream_url", &url), "Stream URL resolved");
                Ok(url)
            }
            _ => Err(CatalogError::InvalidResponse(
                "No stream URL received".to_string(),
            )),
        }
    }
}
