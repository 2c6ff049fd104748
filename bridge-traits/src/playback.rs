//! Audio engine bridge.
//!
//! The host owns the actual player (AVPlayer, ExoPlayer, expo-av, rodio, ...).
//! The core drives it through [`AudioEngine`] and receives its asynchronous
//! status callbacks as [`EngineEvent`]s over a channel created with
//! [`engine_event_channel`], so that every callback is reconciled by a single
//! loop instead of ad hoc listener closures.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::error::Result;

/// Playable source handed to the audio engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Previously downloaded file on local storage.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream fetched by the host.
    RemoteStream { url: String },
}

impl AudioSource {
    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream { url: url.into() }
    }

    pub fn local(path: impl Into<PathBuf>) -> Self {
        AudioSource::LocalFile { path: path.into() }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }

    /// URI form understood by most mobile players.
    pub fn uri(&self) -> String {
        match self {
            AudioSource::LocalFile { path } => format!("file://{}", path.display()),
            AudioSource::RemoteStream { url } => url.clone(),
        }
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::LocalFile { path } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "<local>".to_string());
                write!(f, "local:{}", name)
            }
            AudioSource::RemoteStream { .. } => write!(f, "remote-stream"),
        }
    }
}

/// Status callback emitted by the host audio engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Periodic status report. Either field may be missing while the engine
    /// is still buffering.
    Status {
        position_ms: Option<u64>,
        duration_ms: Option<u64>,
    },
    /// The loaded source reached its natural end.
    Finished,
}

impl EngineEvent {
    pub fn status(position_ms: u64, duration_ms: u64) -> Self {
        EngineEvent::Status {
            position_ms: Some(position_ms),
            duration_ms: Some(duration_ms),
        }
    }
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the channel the host uses to report [`EngineEvent`]s.
///
/// The host keeps the sender inside its player callbacks; the receiver is
/// handed to the playback synchronizer.
pub fn engine_event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// Host audio engine.
///
/// A single engine instance holds at most one loaded source. `load`
/// replaces (and stops) whatever was loaded before.
#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Replace the current source. Resolves once the source is ready to play.
    async fn load(&self, source: AudioSource) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    /// Seek the loaded source to `position_ms`.
    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Set output volume in `[0.0, 1.0]`.
    async fn set_volume(&self, volume: f32) -> Result<()>;
}
