//! # Resolution Cache
//!
//! Request coalescing for catalog lookups. While a request for a key is in
//! flight every caller for that key shares its result; once it settles the
//! entry is dropped, so a hit never means "stale value", only "already
//! running".
//!
//! The underlying request is driven by a spawned task, so it keeps running
//! even if every caller stops waiting for it.

use core_library::catalog::{CatalogError, CatalogResult, TrackCatalog};
use core_library::models::{SearchPage, Track, TrackId};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Number of tracks on each home shelf
pub const SHELF_SIZE: usize = 10;

type SharedResult<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

struct Entry<V, E> {
    generation: u64,
    pending: SharedResult<V, E>,
}

/// Deduplicates concurrent requests per key
pub struct ResolutionCache<K, V, E> {
    entries: Arc<Mutex<HashMap<K, Entry<V, E>>>>,
    generation: AtomicU64,
}

impl<K, V, E> ResolutionCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// Join the in-flight request for `key`, or start one with `compute`.
    ///
    /// `compute` is only invoked when nothing is in flight for `key`.
    /// Must be called from within a Tokio runtime.
    pub async fn resolve<F, Fut>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(entry) => {
                    debug!("Joining in-flight request");
                    entry.pending.clone()
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let request = compute();
                    let cleanup = Arc::clone(&self.entries);
                    let settled_key = key.clone();

                    let pending = async move {
                        let result = request.await;
                        // A `clear()` may have replaced the entry with a newer request
                        let mut entries = cleanup.lock();
                        if entries
                            .get(&settled_key)
                            .map_or(false, |entry| entry.generation == generation)
                        {
                            entries.remove(&settled_key);
                        }
                        result
                    }
                    .boxed()
                    .shared();

                    tokio::spawn(pending.clone().map(|_| ()));
                    entries.insert(
                        key,
                        Entry {
                            generation,
                            pending: pending.clone(),
                        },
                    );
                    pending
                }
            }
        };

        pending.await
    }

    /// Number of requests in flight
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Forget every in-flight request.
    ///
    /// Callers already waiting still get their result; the next call for the
    /// same key starts a fresh request.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<K, V, E> Default for ResolutionCache<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Cached catalog
// ============================================================================

/// Search cache key: normalized query plus page offset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub query: String,
    pub offset: u32,
}

impl SearchKey {
    /// Trims, collapses inner whitespace and lowercases the query.
    pub fn new(query: &str, offset: u32) -> Self {
        let query = query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        Self { query, offset }
    }
}

/// `TrackCatalog` fronted by one resolution cache per request kind
pub struct CachedCatalog {
    catalog: Arc<dyn TrackCatalog>,
    searches: ResolutionCache<SearchKey, SearchPage, CatalogError>,
    streams: ResolutionCache<TrackId, String, CatalogError>,
}

impl CachedCatalog {
    pub fn new(catalog: Arc<dyn TrackCatalog>) -> Self {
        Self {
            catalog,
            searches: ResolutionCache::new(),
            streams: ResolutionCache::new(),
        }
    }

    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, offset: u32) -> CatalogResult<SearchPage> {
        let key = SearchKey::new(query, offset);
        let catalog = Arc::clone(&self.catalog);
        let request_key = key.clone();

        self.searches
            .resolve(key, move || async move {
                catalog.search(&request_key.query, request_key.offset).await
            })
            .await
    }

    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn stream_url(&self, track_id: TrackId) -> CatalogResult<String> {
        let catalog = Arc::clone(&self.catalog);

        self.streams
            .resolve(track_id, move || async move { catalog.stream_url(track_id).await })
            .await
    }

    /// First shelf of the "popular" query; empty on failure
    pub async fn popular(&self) -> Vec<Track> {
        self.shelf("popular").await
    }

    /// First shelf of the "recommended" query; empty on failure
    pub async fn made_for_you(&self) -> Vec<Track> {
        self.shelf("recommended").await
    }

    async fn shelf(&self, query: &str) -> Vec<Track> {
        match self.search(query, 0).await {
            Ok(page) => page.tracks.into_iter().take(SHELF_SIZE).collect(),
            Err(e) => {
                warn!(query, error = %e, "Failed to load shelf");
                Vec::new()
            }
        }
    }

    pub fn clear(&self) {
        self.clear_search();
        self.clear_stream();
    }

    pub fn clear_search(&self) {
        self.searches.clear();
    }

    pub fn clear_stream(&self) {
        self.streams.clear();
    }

    pub fn in_flight_searches(&self) -> usize {
        self.searches.len()
    }

    pub fn in_flight_streams(&self) -> usize {
        self.streams.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_key_normalization() {
        assert_eq!(
            SearchKey::new("  Massive   Attack ", 0),
            SearchKey::new("massive attack", 0)
        );
        assert_ne!(
            SearchKey::new("massive attack", 0),
            SearchKey::new("massive attack", 20)
        );
    }

    #[tokio::test]
    async fn test_settled_entries_are_removed() {
        let cache: ResolutionCache<u32, u32, String> = ResolutionCache::new();

        let value = cache.resolve(1, || async { Ok(7) }).await;
        assert_eq!(value, Ok(7));
        assert!(cache.is_empty());

        let failed = cache
            .resolve(1, || async { Err("boom".to_string()) })
            .await;
        assert_eq!(failed, Err("boom".to_string()));
        assert!(!cache.is_in_flight(&1));
    }
}
