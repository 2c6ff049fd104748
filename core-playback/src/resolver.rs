//! # Offline Resolver
//!
//! Turns a track id into an [`AudioSource`]: a verified local file when the
//! offline index has one, otherwise a remote stream URL from the catalog.

use bridge_traits::playback::AudioSource;
use bridge_traits::storage::{FileSystemAccess, SettingsStore};
use core_library::models::TrackId;
use core_runtime::logging::strip_path;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::resolution::CachedCatalog;

const FILE_SCHEME: &str = "file://";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfflineEntry {
    file_uri: String,
}

/// Persisted map from track id to downloaded file.
///
/// Each entry is stored under `{prefix}{track_id}` as `{"fileUri": "..."}`.
#[derive(Clone)]
pub struct OfflineIndex {
    store: Arc<dyn SettingsStore>,
    prefix: String,
}

impl OfflineIndex {
    pub fn new(store: Arc<dyn SettingsStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn key(&self, track_id: TrackId) -> String {
        format!("{}{}", self.prefix, track_id)
    }

    /// Indexed file for `track_id`, without checking that it still exists.
    ///
    /// Unreadable or malformed entries count as absent.
    pub async fn entry(&self, track_id: TrackId) -> Option<PathBuf> {
        let raw = match self.store.get_string(&self.key(track_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(track_id = %track_id, error = %e, "Failed to read offline entry");
                return None;
            }
        };

        match serde_json::from_str::<OfflineEntry>(&raw) {
            Ok(entry) if !entry.file_uri.trim().is_empty() => {
                let path = entry
                    .file_uri
                    .strip_prefix(FILE_SCHEME)
                    .unwrap_or(&entry.file_uri);
                Some(PathBuf::from(path))
            }
            Ok(_) => None,
            Err(e) => {
                debug!(track_id = %track_id, error = %e, "Ignoring malformed offline entry");
                None
            }
        }
    }

    pub async fn record(&self, track_id: TrackId, path: &Path) -> Result<()> {
        let entry = OfflineEntry {
            file_uri: format!("{}{}", FILE_SCHEME, path.display()),
        };
        let raw = serde_json::to_string(&entry)
            .map_err(|e| PlaybackError::Storage(e.to_string()))?;
        self.store.set_string(&self.key(track_id), &raw).await?;
        let file = path.to_string_lossy();
        debug!(track_id = %track_id, file = %strip_path(&file), "Offline entry recorded");
        Ok(())
    }

    pub async fn forget(&self, track_id: TrackId) -> Result<()> {
        self.store.delete(&self.key(track_id)).await?;
        debug!(track_id = %track_id, "Offline entry removed");
        Ok(())
    }

    /// Ids with an offline entry, in no particular order
    pub async fn indexed_tracks(&self) -> Result<Vec<TrackId>> {
        let keys = self.store.list_keys(&self.prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.strip_prefix(&self.prefix)?.parse::<u64>().ok())
            .map(TrackId)
            .collect())
    }
}

/// Local-first source resolution
pub struct OfflineResolver {
    index: OfflineIndex,
    fs: Arc<dyn FileSystemAccess>,
    catalog: Arc<CachedCatalog>,
}

impl OfflineResolver {
    pub fn new(index: OfflineIndex, fs: Arc<dyn FileSystemAccess>, catalog: Arc<CachedCatalog>) -> Self {
        Self { index, fs, catalog }
    }

    pub fn index(&self) -> &OfflineIndex {
        &self.index
    }

    pub fn catalog(&self) -> &Arc<CachedCatalog> {
        &self.catalog
    }

    /// Verified local file for `track_id`, if any
    pub async fn local_file(&self, track_id: TrackId) -> Option<PathBuf> {
        let path = self.index.entry(track_id).await?;
        match self.fs.exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => {
                let file = path.to_string_lossy();
                debug!(
                    track_id = %track_id,
                    file = %strip_path(&file),
                    "Offline file missing, falling back to stream"
                );
                None
            }
            Err(e) => {
                warn!(track_id = %track_id, error = %e, "Offline file check failed");
                None
            }
        }
    }

    pub async fn is_available_offline(&self, track_id: TrackId) -> bool {
        self.local_file(track_id).await.is_some()
    }

    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn resolve(&self, track_id: TrackId) -> Result<AudioSource> {
        if let Some(path) = self.local_file(track_id).await {
            let file = path.to_string_lossy();
            debug!(file = %strip_path(&file), "Resolved offline file");
            return Ok(AudioSource::local(path));
        }

        let url = self.catalog.stream_url(track_id).await?;
        debug!("Resolved remote stream");
        Ok(AudioSource::remote(url))
    }
}
