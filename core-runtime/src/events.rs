//! # Event Bus System
//!
//! Typed events broadcast from the player core to the UI layer using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`QueueEvent`], [`PlaybackEvent`] and [`LibraryEvent`],
//!   wrapped in [`CoreEvent`]
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ QueueManager ├──────────────>│           │     subscribe    ┌────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│   UI   │
//! ┌──────────────┐     emit      │ (broadcast│                  └────────┘
//! │ Synchronizer ├──────────────>│  channel) │     subscribe    ┌────────┐
//! └──────────────┘               │           ├─────────────────>│ Logger │
//! ┌──────────────┐     emit      │           │                  └────────┘
//! │ LikedSongs   ├──────────────>│           │
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Started {
//!     track_id: 42,
//!     title: "Teardrop".to_string(),
//! }))
//! .ok();
//!
//! assert!(matches!(sub.recv().await, Ok(CoreEvent::Playback(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: every sender was dropped; the core shut down.
//!
//! Emitting with no subscriber returns `Err`. Publishers in the core ignore
//! that result: nobody listening is not a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Queue(QueueEvent),
    Playback(PlaybackEvent),
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Library(LibraryEvent::DownloadFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Queue(QueueEvent::Exhausted { .. }) => EventSeverity::Info,
            CoreEvent::Queue(QueueEvent::Loaded { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Stopped) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Queue Events
// ============================================================================

/// Queue mutations, published after the new state is committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// Persisted queue restored at startup.
    Restored {
        track_count: usize,
        current_index: Option<usize>,
    },
    /// Queue replaced wholesale.
    Loaded {
        track_count: usize,
        current_index: Option<usize>,
    },
    /// A track was appended.
    Appended { track_id: u64, track_count: usize },
    /// The current position moved.
    IndexChanged { current_index: usize, track_id: u64 },
    ShuffleChanged { enabled: bool },
    /// Repeat mode changed; `mode` is `off`, `one` or `all`.
    RepeatChanged { mode: String },
    Cleared,
    /// Advance reached the end with repeat off.
    Exhausted { last_track_id: u64 },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Restored { .. } => "Queue restored",
            QueueEvent::Loaded { .. } => "Queue loaded",
            QueueEvent::Appended { .. } => "Track appended to queue",
            QueueEvent::IndexChanged { .. } => "Current track changed",
            QueueEvent::ShuffleChanged { .. } => "Shuffle toggled",
            QueueEvent::RepeatChanged { .. } => "Repeat mode changed",
            QueueEvent::Cleared => "Queue cleared",
            QueueEvent::Exhausted { .. } => "Reached end of queue",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to the live playback session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Resolving and loading a new track.
    Loading { track_id: u64, title: String },
    /// The engine accepted the source.
    Ready { track_id: u64, offline: bool },
    Started { track_id: u64, title: String },
    Paused { track_id: u64, position_ms: u64 },
    /// Displayed position or duration changed.
    PositionChanged {
        track_id: u64,
        position_ms: u64,
        duration_ms: u64,
    },
    /// Track finished playing naturally.
    Completed { track_id: u64 },
    /// Output volume changed (percent, 0-100).
    VolumeChanged { volume_percent: u8, muted: bool },
    /// Session torn down; side effects released.
    Stopped,
    /// User-visible playback failure.
    Error {
        track_id: Option<u64>,
        message: String,
        /// Whether the UI may offer a retry.
        retryable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Loading track",
            PlaybackEvent::Ready { .. } => "Track ready",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::VolumeChanged { .. } => "Volume changed",
            PlaybackEvent::Stopped => "Playback stopped",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Liked-songs changes and offline downloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    SongLiked { track_id: u64, title: String },
    SongUnliked { track_id: u64 },
    LikedSongsCleared,
    DownloadCompleted { track_id: u64, bytes: u64 },
    DownloadFailed { track_id: u64, message: String },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::SongLiked { .. } => "Song added to liked songs",
            LibraryEvent::SongUnliked { .. } => "Song removed from liked songs",
            LibraryEvent::LikedSongsCleared => "Liked songs cleared",
            LibraryEvent::DownloadCompleted { .. } => "Track saved for offline playback",
            LibraryEvent::DownloadFailed { .. } => "Track download failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every clone publishes to the same
/// subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering at most `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(100);
/// let playback_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Playback(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
