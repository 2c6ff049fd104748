//! # Playback Error Types
//!
//! Errors produced by the queue, the resolvers and the synchronizer.
//!
//! Only resolution and engine failures reach the user; see
//! [`PlaybackError::is_user_visible`].

use bridge_traits::error::BridgeError;
use core_library::catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PlaybackError {
    // ========================================================================
    // User-visible
    // ========================================================================
    /// Stream URL lookup failed.
    #[error("Failed to resolve track: {0}")]
    Resolution(#[from] CatalogError),

    /// The audio engine rejected a command.
    #[error("Audio engine error: {0}")]
    Engine(String),

    // ========================================================================
    // Absorbed locally
    // ========================================================================
    /// `jump_to`/`load_queue` with an index outside the queue.
    #[error("Invalid navigation: {0}")]
    InvalidNavigation(String),

    /// Settings store read or write failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fetching or saving a track for offline use failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// Another track is already downloading.
    #[error("A download is already in progress for track {0}")]
    DownloadInProgress(u64),

    /// The synchronizer task has stopped.
    #[error("Playback synchronizer is not running")]
    ChannelClosed,
}

impl PlaybackError {
    pub fn engine(err: BridgeError) -> Self {
        PlaybackError::Engine(err.to_string())
    }

    /// Whether the error is surfaced to the user as a playback error.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, PlaybackError::Resolution(_) | PlaybackError::Engine(_))
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlaybackError::Resolution(e) => e.is_retryable(),
            PlaybackError::Engine(_) | PlaybackError::Storage(_) | PlaybackError::Download(_) => true,
            PlaybackError::InvalidNavigation(_)
            | PlaybackError::DownloadInProgress(_)
            | PlaybackError::ChannelClosed => false,
        }
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        PlaybackError::Storage(err.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
