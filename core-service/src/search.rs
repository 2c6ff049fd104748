//! # Search Session
//!
//! Paged track search where a newer query supersedes the one in flight.
//!
//! A superseded caller returns [`SearchOutcome::Superseded`] and never writes
//! state. Its catalog request is not aborted: it keeps running inside the
//! resolution cache, where an identical query can still join it.

use core_library::catalog::CatalogResult;
use core_library::models::Track;
use core_playback::CachedCatalog;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// How a search call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Results (or the error) were applied
    Completed,
    /// A newer search or `clear()` took over
    Superseded,
    /// Nothing to load
    Skipped,
}

/// What the search screen shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Track>,
    pub next_offset: u32,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct Inner {
    state: SearchState,
    active: Option<CancellationToken>,
}

impl Inner {
    /// Cancel whatever is running and hand out a fresh token.
    fn supersede(&mut self) -> CancellationToken {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.active = Some(token.clone());
        token
    }
}

pub struct SearchSession {
    catalog: Arc<CachedCatalog>,
    inner: Mutex<Inner>,
}

impl SearchSession {
    pub fn new(catalog: Arc<CachedCatalog>) -> Self {
        Self {
            catalog,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn state(&self) -> SearchState {
        self.inner.lock().state.clone()
    }

    pub fn results(&self) -> Vec<Track> {
        self.inner.lock().state.results.clone()
    }

    /// Start a new search from the first page.
    ///
    /// A blank query clears the results without a request. Errors are
    /// recorded in [`SearchState::error`] and also returned.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> CatalogResult<SearchOutcome> {
        let query = query.trim().to_string();
        let token = {
            let mut inner = self.inner.lock();
            let token = inner.supersede();
            inner.state = SearchState {
                loading: !query.is_empty(),
                query: query.clone(),
                ..SearchState::default()
            };
            token
        };

        if query.is_empty() {
            return Ok(SearchOutcome::Completed);
        }
        self.fetch(token, &query, 0).await
    }

    /// Append the next page of the current query.
    ///
    /// Skipped when there is no query, no further page, or a request is
    /// already running.
    #[instrument(skip(self))]
    pub async fn load_more(&self) -> CatalogResult<SearchOutcome> {
        let (token, query, offset) = {
            let mut inner = self.inner.lock();
            let state = &inner.state;
            if state.query.is_empty() || state.loading || !state.has_more {
                return Ok(SearchOutcome::Skipped);
            }
            let query = state.query.clone();
            let offset = state.next_offset;
            let token = inner.supersede();
            inner.state.loading = true;
            inner.state.error = None;
            (token, query, offset)
        };

        self.fetch(token, &query, offset).await
    }

    /// Cancel any running search and reset to the empty state.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        if let Some(active) = inner.active.take() {
            active.cancel();
        }
        inner.state = SearchState::default();
    }

    async fn fetch(&self, token: CancellationToken, query: &str, offset: u32) -> CatalogResult<SearchOutcome> {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(query, offset, "Search superseded");
                return Ok(SearchOutcome::Superseded);
            }
            result = self.catalog.search(query, offset) => result,
        };

        // Check and write under one lock so a newer search can't interleave
        let mut inner = self.inner.lock();
        if token.is_cancelled() {
            return Ok(SearchOutcome::Superseded);
        }
        inner.active = None;
        let state = &mut inner.state;
        state.loading = false;

        match result {
            Ok(page) => {
                debug!(offset, count = page.tracks.len(), has_more = page.has_more, "Search page applied");
                state.next_offset = page.next_offset();
                state.has_more = page.has_more;
                state.results.extend(page.tracks);
                Ok(SearchOutcome::Completed)
            }
            Err(e) => {
                warn!(query, offset, error = %e, "Search failed");
                if offset == 0 {
                    state.results.clear();
                    state.has_more = false;
                }
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
