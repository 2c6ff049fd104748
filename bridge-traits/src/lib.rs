//! # Host Bridge Traits
//!
//! Contracts between the playback core and the host application.
//!
//! ## Overview
//!
//! Every capability the core needs but cannot implement portably is expressed
//! as a trait here. The mobile host (or `bridge-desktop` on desktop) provides
//! the implementations and hands them to the core at bootstrap.
//!
//! ## Traits
//!
//! ### Persistence & I/O
//! - [`SettingsStore`](storage::SettingsStore) - String key-value storage (queue, liked songs, offline index)
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Existence checks for downloaded files
//! - [`HttpClient`](http::HttpClient) - Catalog API requests with per-request timeouts
//!
//! ### Playback & Media Session
//! - [`AudioEngine`](playback::AudioEngine) - Load/play/pause/seek/volume on the host player
//! - [`EngineEvent`](playback::EngineEvent) - Position, duration and finish callbacks, delivered over a channel
//! - [`MediaNotifier`](media::MediaNotifier) - Lock-screen notification
//! - [`WakeLock`](media::WakeLock) - Keep the device awake while playing
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive `CapabilityMissing` error when a
//! required bridge was not injected, rather than silently degrading.
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Side-effect
//! bridges (notification, wake-lock) are best-effort: the core logs their
//! errors and carries on.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared as
//! `Arc<dyn Trait>` across Tokio tasks.

pub mod error;
pub mod http;
pub mod media;
pub mod playback;
pub mod storage;
pub mod time;

pub use error::BridgeError;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use media::{MediaAction, MediaNotifier, NotificationContent, WakeLock};
pub use playback::{
    engine_event_channel, AudioEngine, AudioSource, EngineEvent, EngineEventReceiver,
    EngineEventSender,
};
pub use storage::{FileSystemAccess, SettingsStore};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
