//! Core service façade and bootstrap helpers.
//!
//! This crate wires a validated [`CoreConfig`] and the host-provided bridges
//! (audio engine, media notification, wake-lock) into one [`PlayerService`]:
//! the queue, the cached catalog, offline resolution, liked songs and the
//! playback synchronizer task. Desktop builds enable the `desktop-shims`
//! feature, which provides logging stand-ins for the notification and
//! wake-lock bridges through [`HostBridges::desktop`].
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::{HostBridges, PlayerService};
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://openspot-api.example.com")
//!     .build()?;
//! let (engine_tx, engine_rx) = bridge_traits::engine_event_channel();
//! let engine = MyEngine::new(engine_tx);
//!
//! let service = PlayerService::bootstrap(config, HostBridges::desktop(engine, engine_rx)).await?;
//! service.play_tracks(service.popular().await, 0).await?;
//! ```

pub mod error;
pub mod search;

pub use error::{CoreError, Result};
pub use search::{SearchOutcome, SearchSession, SearchState};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{
    media::{MediaAction, MediaNotifier, WakeLock},
    playback::{AudioEngine, EngineEventReceiver},
};
use core_library::{
    catalog::TrackCatalog,
    liked::{LikedSong, LikedSongs},
    models::{Track, TrackId},
};
use core_playback::{
    CachedCatalog, DownloadProgress, OfflineIndex, OfflineResolver, PlaybackError,
    PlaybackSnapshot, PlaybackSynchronizer, QueueManager, QueueState, RepeatMode,
    SynchronizerConfig, SynchronizerHandle, SynchronizerParts, TrackDownloader,
};
use core_runtime::{
    config::CoreConfig,
    events::{CoreEvent, EventBus},
};
use parking_lot::Mutex;
use provider_openspot::OpenSpotCatalog;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// Host collaborators that are not part of [`CoreConfig`].
pub struct HostBridges {
    pub engine: Arc<dyn AudioEngine>,
    pub engine_events: EngineEventReceiver,
    pub notifier: Arc<dyn MediaNotifier>,
    pub wake_lock: Arc<dyn WakeLock>,
    /// Overrides the HTTP catalog built from the config
    pub catalog: Option<Arc<dyn TrackCatalog>>,
}

impl HostBridges {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        engine_events: EngineEventReceiver,
        notifier: Arc<dyn MediaNotifier>,
        wake_lock: Arc<dyn WakeLock>,
    ) -> Self {
        Self {
            engine,
            engine_events,
            notifier,
            wake_lock,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn TrackCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Host engine plus the desktop notification and wake-lock stand-ins
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(engine: Arc<dyn AudioEngine>, engine_events: EngineEventReceiver) -> Self {
        Self::new(
            engine,
            engine_events,
            Arc::new(bridge_desktop::DesktopMediaSession::new()),
            Arc::new(bridge_desktop::DesktopWakeLock::new()),
        )
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct PlayerService {
    events: EventBus,
    queue: Arc<QueueManager>,
    catalog: Arc<CachedCatalog>,
    resolver: Arc<OfflineResolver>,
    /// Absent without an `HttpClient`
    downloader: Option<Arc<TrackDownloader>>,
    liked: Arc<LikedSongs>,
    player: SynchronizerHandle,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PlayerService {
    /// Assemble the core and start the playback synchronizer.
    ///
    /// Restores the persisted queue (its current track is loaded paused) and
    /// the liked songs. Must be called from within a Tokio runtime.
    #[instrument(skip_all, fields(api_base_url = %config.api_base_url))]
    pub async fn bootstrap(config: CoreConfig, bridges: HostBridges) -> Result<Self> {
        config.validate()?;

        let HostBridges {
            engine,
            engine_events,
            notifier,
            wake_lock,
            catalog,
        } = bridges;

        let catalog: Arc<dyn TrackCatalog> = match catalog {
            Some(catalog) => catalog,
            None => {
                let http = config.http_client.clone().ok_or_else(|| {
                    CoreError::capability_missing(
                        "HttpClient",
                        "An HttpClient is required for catalog requests. \
                         Inject one with CoreConfig::builder().http_client(), enable the \
                         'desktop-shims' feature, or pass a catalog in HostBridges.",
                    )
                })?;
                Arc::new(
                    OpenSpotCatalog::new(http, config.api_base_url.clone())
                        .with_timeouts(config.request_timeout, config.stream_timeout),
                )
            }
        };
        let file_system = config.file_system.clone().ok_or_else(|| {
            CoreError::capability_missing(
                "FileSystemAccess",
                "FileSystemAccess is required to verify offline files. \
                 Inject one with CoreConfig::builder().file_system() or enable the \
                 'desktop-shims' feature.",
            )
        })?;

        let store = Arc::clone(&config.settings_store);
        let keys = &config.storage_keys;
        let events = EventBus::new(config.event_buffer_size);

        let queue = Arc::new(
            QueueManager::new(Arc::clone(&store), keys.queue.clone()).with_events(events.clone()),
        );
        queue.restore().await;

        let liked = Arc::new(
            LikedSongs::new(Arc::clone(&store), keys.liked_songs.clone())
                .with_events(events.clone()),
        );
        liked.load().await;

        let cached = Arc::new(CachedCatalog::new(catalog));
        let resolver = Arc::new(OfflineResolver::new(
            OfflineIndex::new(store, keys.offline_prefix.clone()),
            Arc::clone(&file_system),
            Arc::clone(&cached),
        ));
        let downloader = config.http_client.clone().map(|http| {
            Arc::new(
                TrackDownloader::new(http, file_system, Arc::clone(&resolver))
                    .with_timeout(config.download_timeout)
                    .with_events(events.clone()),
            )
        });

        let (player, task) = PlaybackSynchronizer::spawn(SynchronizerParts {
            queue: Arc::clone(&queue),
            resolver: Arc::clone(&resolver),
            engine,
            engine_events,
            notifier,
            wake_lock,
            events: Some(events.clone()),
            config: SynchronizerConfig {
                position_debounce: config.position_debounce,
                initial_volume: config.initial_volume,
            },
        });

        info!(
            queued = queue.len(),
            liked = liked.count(),
            "Player service started"
        );

        Ok(Self {
            events,
            queue,
            catalog: cached,
            resolver,
            downloader,
            liked,
            player,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }

    // ------------------------------------------------------------------------
    // Track selection
    // ------------------------------------------------------------------------

    /// Play a single track, replacing the queue.
    ///
    /// Selecting the track that is already current toggles play/pause.
    pub async fn play_track(&self, track: Track) -> Result<()> {
        let start = track.clone();
        self.select(start, vec![track], 0).await
    }

    /// Replace the queue with `tracks` and play from `start_index`.
    ///
    /// Selecting the track that is already current toggles play/pause.
    pub async fn play_tracks(&self, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        let Some(start) = tracks.get(start_index).cloned() else {
            return Err(core_playback::PlaybackError::InvalidNavigation(format!(
                "start index {} outside list of {}",
                start_index,
                tracks.len()
            ))
            .into());
        };
        self.select(start, tracks, start_index).await
    }

    async fn select(&self, start: Track, tracks: Vec<Track>, start_index: usize) -> Result<()> {
        if self.queue.current_track().map(|t| t.id) == Some(start.id) {
            self.player.toggle_play_pause().await?;
            return Ok(());
        }
        self.queue.load_queue(tracks, start_index).await?;
        self.player.set_playing(true).await?;
        Ok(())
    }

    /// Play the queue entry at `index`.
    pub async fn play_queue_index(&self, index: usize) -> Result<()> {
        self.queue.jump_to(index).await?;
        self.player.set_playing(true).await?;
        Ok(())
    }

    pub async fn add_to_queue(&self, track: Track) {
        self.queue.append(track).await;
    }

    pub async fn clear_queue(&self) -> Result<()> {
        self.queue.clear().await;
        self.player.sync().await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------------

    pub async fn set_playing(&self, playing: bool) -> Result<()> {
        Ok(self.player.set_playing(playing).await?)
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        Ok(self.player.toggle_play_pause().await?)
    }

    /// Returns `false` when the queue was exhausted and playback paused.
    pub async fn next(&self) -> Result<bool> {
        Ok(self.player.next().await?)
    }

    pub async fn previous(&self) -> Result<bool> {
        Ok(self.player.previous().await?)
    }

    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        Ok(self.player.seek(position_ms).await?)
    }

    pub async fn begin_scrub(&self) -> Result<()> {
        Ok(self.player.begin_scrub().await?)
    }

    pub async fn scrub(&self, position_ms: u64) -> Result<()> {
        Ok(self.player.scrub(position_ms).await?)
    }

    pub async fn commit_scrub(&self, position_ms: u64) -> Result<()> {
        Ok(self.player.commit_scrub(position_ms).await?)
    }

    pub async fn toggle_shuffle(&self) -> bool {
        self.queue.toggle_shuffle().await
    }

    pub async fn cycle_repeat(&self) -> RepeatMode {
        self.queue.cycle_repeat().await
    }

    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        Ok(self.player.set_volume(volume).await?)
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        Ok(self.player.toggle_mute().await?)
    }

    /// Route a notification button press by its platform identifier.
    ///
    /// Unknown identifiers are logged and ignored.
    pub async fn handle_media_action(&self, identifier: &str) -> Result<()> {
        match MediaAction::from_identifier(identifier) {
            Some(action) => Ok(self.player.media_action(action).await?),
            None => {
                warn!(identifier, "Ignoring unknown media action");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Library
    // ------------------------------------------------------------------------

    /// Flip the liked state of `track` and return the new state.
    pub async fn toggle_like(&self, track: &Track) -> bool {
        self.liked.toggle(track).await
    }

    pub fn is_liked(&self, track_id: TrackId) -> bool {
        self.liked.is_liked(track_id)
    }

    pub fn liked_songs(&self) -> Vec<LikedSong> {
        self.liked.songs()
    }

    pub fn liked(&self) -> &Arc<LikedSongs> {
        &self.liked
    }

    /// Play every liked song, newest first
    pub async fn play_liked(&self, start_index: usize) -> Result<()> {
        self.play_tracks(self.liked.as_tracks(), start_index).await
    }

    pub async fn popular(&self) -> Vec<Track> {
        self.catalog.popular().await
    }

    pub async fn made_for_you(&self) -> Vec<Track> {
        self.catalog.made_for_you().await
    }

    /// A fresh search session backed by the shared catalog cache
    pub fn search_session(&self) -> SearchSession {
        SearchSession::new(Arc::clone(&self.catalog))
    }

    // ------------------------------------------------------------------------
    // Offline files
    // ------------------------------------------------------------------------

    /// Register a downloaded file for `track_id`.
    pub async fn record_offline(&self, track_id: TrackId, path: &Path) -> Result<()> {
        Ok(self.resolver.index().record(track_id, path).await?)
    }

    /// Save `track` for offline playback.
    ///
    /// Rejected while another download runs. Playback is paused before the
    /// download starts. Returns the saved file's path.
    #[instrument(skip(self, track, on_progress), fields(track_id = %track.id))]
    pub async fn download_track<F>(&self, track: &Track, on_progress: F) -> Result<PathBuf>
    where
        F: FnMut(&DownloadProgress) + Send,
    {
        let downloader = self.downloader.as_ref().ok_or_else(|| {
            CoreError::capability_missing(
                "HttpClient",
                "Downloads need an HttpClient. Inject one with \
                 CoreConfig::builder().http_client() or enable the 'desktop-shims' feature.",
            )
        })?;
        if let Some(running) = downloader.active_download() {
            return Err(PlaybackError::DownloadInProgress(running.get()).into());
        }

        if self.player.snapshot().is_playing {
            self.player.set_playing(false).await?;
        }
        Ok(downloader.download_track(track, on_progress).await?)
    }

    /// Track currently being downloaded
    pub fn active_download(&self) -> Option<TrackId> {
        self.downloader.as_ref().and_then(|d| d.active_download())
    }

    pub async fn forget_offline(&self, track_id: TrackId) -> Result<()> {
        Ok(self.resolver.index().forget(track_id).await?)
    }

    pub async fn is_available_offline(&self, track_id: TrackId) -> bool {
        self.resolver.is_available_offline(track_id).await
    }

    // ------------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.player.snapshot()
    }

    pub fn subscribe_playback(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.player.subscribe()
    }

    pub fn queue(&self) -> QueueState {
        self.queue.snapshot()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Stop playback, release side effects and wait for the synchronizer.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(task) = self.task.lock().take() else {
            return Ok(());
        };
        self.player.shutdown().await?;
        if let Err(e) = task.await {
            return Err(CoreError::TaskFailed(format!("playback synchronizer: {}", e)));
        }
        info!("Player service stopped");
        Ok(())
    }
}
