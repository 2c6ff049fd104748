//! # Core Configuration Module
//!
//! Configuration for the player core.
//!
//! ## Overview
//!
//! [`CoreConfig`] is assembled with a builder and validated fail-fast: a
//! missing required bridge or an out-of-range setting is reported at
//! bootstrap instead of surfacing as odd behavior during playback.
//!
//! ## Required
//!
//! - `api_base_url` - Catalog API root (http/https)
//! - `SettingsStore` - Queue, liked songs and offline index persistence
//!
//! ## Optional (with platform defaults)
//!
//! - `HttpClient` - Catalog requests (desktop default: reqwest)
//! - `FileSystemAccess` - Offline downloads and file verification (desktop default: tokio fs)
//!
//! With the `desktop-shims` feature, missing bridges are filled with the
//! `bridge-desktop` implementations. Without it, a missing `SettingsStore`
//! fails with [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://openspot-api.example.com")
//!     .settings_store(Arc::new(MySettingsStore))
//!     .http_client(Arc::new(MyHttpClient))
//!     .stream_timeout(Duration::from_secs(10))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, SettingsStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_POSITION_DEBOUNCE: Duration = Duration::from_millis(200);
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;
const MAX_POSITION_DEBOUNCE: Duration = Duration::from_secs(5);

/// Settings-store keys used by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Queue snapshot
    pub queue: String,
    /// Liked-songs list
    pub liked_songs: String,
    /// Offline index entries are stored under `{offline_prefix}{track_id}`
    pub offline_prefix: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            queue: "openspot_music_queue".to_string(),
            liked_songs: "openspot_liked_songs".to_string(),
            offline_prefix: "offline_".to_string(),
        }
    }
}

impl StorageKeys {
    /// Offline index key for a track
    pub fn offline_key(&self, track_id: u64) -> String {
        format!("{}{}", self.offline_prefix, track_id)
    }
}

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Catalog API root, without trailing slash
    pub api_base_url: String,

    /// Timeout for search and shelf requests
    pub request_timeout: Duration,

    /// Timeout for stream-URL lookups
    pub stream_timeout: Duration,

    /// Timeout for fetching a track's audio for offline use
    pub download_timeout: Duration,

    /// Quiet window after a seek during which engine position ticks are ignored
    pub position_debounce: Duration,

    /// Capacity of the event bus
    pub event_buffer_size: usize,

    /// Volume applied to the engine at startup
    pub initial_volume: f32,

    pub storage_keys: StorageKeys,

    /// Directory for desktop default stores; unused on mobile
    pub data_dir: Option<PathBuf>,

    pub settings_store: Arc<dyn SettingsStore>,

    pub http_client: Option<Arc<dyn HttpClient>>,

    pub file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("stream_timeout", &self.stream_timeout)
            .field("download_timeout", &self.download_timeout)
            .field("position_debounce", &self.position_debounce)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("initial_volume", &self.initial_volume)
            .field("storage_keys", &self.storage_keys)
            .field("data_dir", &self.data_dir)
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "file_system",
                &self
                    .file_system
                    .as_ref()
                    .map(|_| "FileSystemAccess { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        let url = self.api_base_url.trim();
        if url.is_empty() {
            return Err(Error::Config("API base URL cannot be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "API base URL must use http or https, got '{}'",
                url
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }
        if self.stream_timeout.is_zero() {
            return Err(Error::Config(
                "Stream timeout must be greater than 0".to_string(),
            ));
        }
        if self.download_timeout.is_zero() {
            return Err(Error::Config(
                "Download timeout must be greater than 0".to_string(),
            ));
        }

        if self.position_debounce > MAX_POSITION_DEBOUNCE {
            return Err(Error::Config(format!(
                "Position debounce of {}ms exceeds maximum of {}ms",
                self.position_debounce.as_millis(),
                MAX_POSITION_DEBOUNCE.as_millis()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "Initial volume must be within [0.0, 1.0], got {}",
                self.initial_volume
            )));
        }

        let keys = &self.storage_keys;
        if keys.queue.is_empty() || keys.liked_songs.is_empty() || keys.offline_prefix.is_empty()
        {
            return Err(Error::Config("Storage keys cannot be empty".to_string()));
        }
        if keys.queue == keys.liked_songs {
            return Err(Error::Config(
                "Queue and liked-songs storage keys must differ".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::capability_missing(
        "SettingsStore",
        "SettingsStore implementation is required for queue and liked-songs persistence. \
         Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
         Mobile: inject platform-native storage (AsyncStorage/UserDefaults/DataStore).",
    )
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = data_dir
        .cloned()
        .unwrap_or_else(bridge_desktop::default_data_dir)
        .join("settings.db");

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread().enable_all().build().map_err(|e| {
            Error::Internal(format!(
                "Failed to create Tokio runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // block_on panics inside a runtime, so initialize on a scratch thread there
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || init_store(path))
            .join()
            .map_err(|_| {
                Error::Internal(
                    "Worker thread panicked while creating default SettingsStore".to_string(),
                )
            })??,
        Err(_) => init_store(path)?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Option<Arc<dyn HttpClient>> {
    Some(Arc::new(bridge_desktop::ReqwestHttpClient::with_timeout(
        timeout,
    )))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(data_dir: Option<&PathBuf>) -> Option<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;
    let fs = match data_dir {
        Some(dir) => TokioFileSystem::with_data_directory(dir.clone()),
        None => TokioFileSystem::new(),
    };
    Some(Arc::new(fs))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_data_dir: Option<&PathBuf>) -> Option<Arc<dyn FileSystemAccess>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    request_timeout: Option<Duration>,
    stream_timeout: Option<Duration>,
    download_timeout: Option<Duration>,
    position_debounce: Option<Duration>,
    event_buffer_size: Option<usize>,
    initial_volume: Option<f32>,
    storage_keys: Option<StorageKeys>,
    data_dir: Option<PathBuf>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl CoreConfigBuilder {
    /// Sets the catalog API root, e.g. `https://openspot-api.example.com`.
    ///
    /// A trailing slash is dropped.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Timeout for search requests. Default: 30s
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Timeout for stream-URL lookups. Default: 15s
    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = Some(timeout);
        self
    }

    /// Timeout for offline downloads. Default: 120s
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    /// Seek debounce window. Default: 200ms, maximum 5s
    pub fn position_debounce(mut self, window: Duration) -> Self {
        self.position_debounce = Some(window);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Startup volume in `[0.0, 1.0]`. Default: 1.0
    pub fn initial_volume(mut self, volume: f32) -> Self {
        self.initial_volume = Some(volume);
        self
    }

    pub fn storage_keys(mut self, keys: StorageKeys) -> Self {
        self.storage_keys = Some(keys);
        self
    }

    /// Directory for desktop default stores (`settings.db`, downloads).
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the settings store implementation (required).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// Without one, offline index entries can't be verified and every track
    /// resolves to a remote stream.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Builds and validates the final `CoreConfig`.
    ///
    /// Fails when `api_base_url` is missing, when a required bridge is
    /// missing and no desktop default is available, or when a setting is out
    /// of range.
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url = self
            .api_base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .ok_or_else(|| {
                Error::Config(
                    "API base URL is required. Use .api_base_url() to set it.".to_string(),
                )
            })?;

        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.data_dir.as_ref())?,
        };
        let http_client = self
            .http_client
            .or_else(|| provide_default_http_client(request_timeout));
        let file_system = self
            .file_system
            .or_else(|| provide_default_file_system(self.data_dir.as_ref()));

        let config = CoreConfig {
            api_base_url,
            request_timeout,
            stream_timeout: self.stream_timeout.unwrap_or(DEFAULT_STREAM_TIMEOUT),
            download_timeout: self.download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
            position_debounce: self.position_debounce.unwrap_or(DEFAULT_POSITION_DEBOUNCE),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            initial_volume: self.initial_volume.unwrap_or(1.0),
            storage_keys: self.storage_keys.unwrap_or_default(),
            data_dir: self.data_dir,
            settings_store,
            http_client,
            file_system,
        };

        config.validate()?;

        Ok(config)
    }
}
