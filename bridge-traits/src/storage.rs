//! Storage Abstractions
//!
//! Key-value persistence for the queue snapshot, the liked-songs list and the
//! offline download index, plus the small slice of file-system access the
//! core needs to save downloads and verify them later.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File system access trait
///
/// The core never reads audio bytes back. It writes downloads into the data
/// directory and later checks that a downloaded file is still on disk before
/// handing its path to the audio engine.
///
/// - Desktop: direct filesystem access
/// - iOS/Android: sandboxed app document directory
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's data directory
    ///
    /// Downloads recorded in the offline index live under this directory.
    async fn get_data_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and any missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Write `data` to `path`, replacing any existing file
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;
}

/// Persistent key-value settings storage
///
/// Mirrors the string-only async storage hosts provide on mobile
/// (AsyncStorage, SharedPreferences, UserDefaults). Values are opaque
/// strings; the core stores JSON documents under well-known keys.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember_volume(store: &dyn SettingsStore) -> Result<()> {
///     store.set_string("volume", "0.8").await
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Delete a setting; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List keys starting with `prefix`
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}
