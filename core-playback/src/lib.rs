//! # Playback Orchestration Module
//!
//! Queue state, source resolution and the live playback session.
//!
//! ## Overview
//!
//! This module handles:
//! - Ordered queue with shuffle and repeat, persisted after every change
//! - Request coalescing for catalog lookups (search, stream URL)
//! - Offline-first source resolution with file re-verification
//! - Saving tracks for offline playback, one download at a time
//! - A single synchronizer task driving the host audio engine, the media
//!   notification and the wake-lock from queue and engine events
//!
//! ## Data flow
//!
//! ```text
//! UI intent ──> QueueManager ──watch──> PlaybackSynchronizer ──> AudioEngine
//!                    ^                     │        ^                 │
//!                    └──── advance ────────┘        └── EngineEvent ──┘
//!                                          │
//!                                          └──> OfflineResolver ──> CachedCatalog
//! ```

pub mod download;
pub mod error;
pub mod queue;
pub mod resolution;
pub mod resolver;
pub mod side_effects;
pub mod synchronizer;

pub use download::{offline_file_name, DownloadProgress, TrackDownloader};
pub use error::{PlaybackError, Result};
pub use queue::{QueueManager, QueueState, RandomShuffler, RepeatMode, Shuffler};
pub use resolution::{CachedCatalog, ResolutionCache, SearchKey};
pub use resolver::{OfflineIndex, OfflineResolver};
pub use side_effects::SideEffects;
pub use synchronizer::{
    PlaybackSnapshot, PlaybackSynchronizer, PlayerState, SynchronizerConfig, SynchronizerHandle,
    SynchronizerParts,
};
