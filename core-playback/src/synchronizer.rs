//! # Playback Synchronizer
//!
//! A single task that owns the live playback session and reconciles three
//! inputs against it:
//!
//! - user commands ([`SynchronizerHandle`])
//! - audio engine reports ([`EngineEvent`])
//! - queue selection changes ([`QueueManager::subscribe_current`])
//!
//! ```text
//!  Idle ──> Loading ──> Ready ──> Playing <──> Paused
//!              │                     │
//!              └──> Error            └──> (track change / teardown) ──> Idle
//! ```
//!
//! Stream resolution runs on a spawned task and reports back through an
//! internal channel, so pause, seek and navigation stay responsive while a
//! track is loading. Every other transition happens on this task, in order.

use bridge_traits::media::{MediaAction, MediaNotifier, WakeLock};
use bridge_traits::playback::{AudioEngine, AudioSource, EngineEvent, EngineEventReceiver};
use core_library::models::{format_position, Track};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{PlaybackError, Result};
use crate::queue::{QueueManager, RepeatMode};
use crate::resolver::OfflineResolver;
use crate::side_effects::SideEffects;

const COMMAND_BUFFER: usize = 64;

// ============================================================================
// Public state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Error,
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: PlayerState,
    pub track: Option<Track>,
    /// Play/pause intent
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_scrubbing: bool,
    pub volume: f32,
    pub is_muted: bool,
    pub last_error: Option<String>,
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self {
            state: PlayerState::Idle,
            track: None,
            is_playing: false,
            position_ms: 0,
            duration_ms: 0,
            is_scrubbing: false,
            volume: 1.0,
            is_muted: false,
            last_error: None,
        }
    }
}

impl PlaybackSnapshot {
    /// Position as a fraction of the duration, 0 when unknown
    pub fn progress(&self) -> f32 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        (self.position_ms as f32 / self.duration_ms as f32).min(1.0)
    }

    pub fn position_label(&self) -> String {
        format_position(self.position_ms)
    }

    pub fn duration_label(&self) -> String {
        format_position(self.duration_ms)
    }
}

#[derive(Debug, Clone)]
pub struct SynchronizerConfig {
    /// Engine position reports are ignored this long after a seek.
    pub position_debounce: Duration,
    pub initial_volume: f32,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            position_debounce: Duration::from_millis(200),
            initial_volume: 1.0,
        }
    }
}

/// Collaborators consumed by the synchronizer
pub struct SynchronizerParts {
    pub queue: Arc<QueueManager>,
    pub resolver: Arc<OfflineResolver>,
    pub engine: Arc<dyn AudioEngine>,
    pub engine_events: EngineEventReceiver,
    pub notifier: Arc<dyn MediaNotifier>,
    pub wake_lock: Arc<dyn WakeLock>,
    pub events: Option<EventBus>,
    pub config: SynchronizerConfig,
}

// ============================================================================
// Handle
// ============================================================================

type Ack = oneshot::Sender<()>;

enum Command {
    SetPlaying(bool, Ack),
    TogglePlayPause(Ack),
    Next(oneshot::Sender<bool>),
    Previous(oneshot::Sender<bool>),
    Seek(u64, Ack),
    BeginScrub(Ack),
    Scrub(u64, Ack),
    CommitScrub(u64, Ack),
    SetVolume(f32, Ack),
    ToggleMute(Ack),
    Media(MediaAction, Ack),
    Sync(Ack),
    Shutdown(Ack),
}

/// Cloneable front end of the synchronizer task.
///
/// Every call returns once the synchronizer has applied it.
#[derive(Clone)]
pub struct SynchronizerHandle {
    commands: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<PlaybackSnapshot>,
}

impl SynchronizerHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| PlaybackError::ChannelClosed)?;
        rx.await.map_err(|_| PlaybackError::ChannelClosed)
    }

    pub async fn set_playing(&self, playing: bool) -> Result<()> {
        self.request(|ack| Command::SetPlaying(playing, ack)).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.request(Command::TogglePlayPause).await
    }

    /// User "next". Returns `false` at the end of the queue with repeat off.
    pub async fn next(&self) -> Result<bool> {
        self.request(Command::Next).await
    }

    /// User "previous". Returns `false` only for an empty queue.
    pub async fn previous(&self) -> Result<bool> {
        self.request(Command::Previous).await
    }

    pub async fn seek(&self, position_ms: u64) -> Result<()> {
        self.request(|ack| Command::Seek(position_ms, ack)).await
    }

    /// Start a slider drag; engine position reports are ignored until commit.
    pub async fn begin_scrub(&self) -> Result<()> {
        self.request(Command::BeginScrub).await
    }

    /// Move the displayed position without touching the engine.
    pub async fn scrub(&self, position_ms: u64) -> Result<()> {
        self.request(|ack| Command::Scrub(position_ms, ack)).await
    }

    pub async fn commit_scrub(&self, position_ms: u64) -> Result<()> {
        self.request(|ack| Command::CommitScrub(position_ms, ack)).await
    }

    /// Volume in `[0, 1]`; out-of-range values are clamped.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        self.request(|ack| Command::SetVolume(volume, ack)).await
    }

    pub async fn toggle_mute(&self) -> Result<()> {
        self.request(Command::ToggleMute).await
    }

    pub async fn media_action(&self, action: MediaAction) -> Result<()> {
        self.request(|ack| Command::Media(action, ack)).await
    }

    /// Reconcile with the queue now instead of waiting for its notification.
    pub async fn sync(&self) -> Result<()> {
        self.request(Command::Sync).await
    }

    /// Tear down the session and stop the task.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot_rx.clone()
    }
}

// ============================================================================
// Synchronizer task
// ============================================================================

struct Session {
    id: Uuid,
    track: Track,
    /// The engine accepted this track's source
    loaded: bool,
    position_ms: u64,
    duration_ms: u64,
    scrubbing: bool,
    last_seek: Option<Instant>,
}

impl Session {
    fn new(track: Track) -> Self {
        Self {
            id: Uuid::new_v4(),
            track,
            loaded: false,
            position_ms: 0,
            duration_ms: 0,
            scrubbing: false,
            last_seek: None,
        }
    }
}

struct Resolved {
    session_id: Uuid,
    result: Result<AudioSource>,
}

pub struct PlaybackSynchronizer {
    queue: Arc<QueueManager>,
    resolver: Arc<OfflineResolver>,
    engine: Arc<dyn AudioEngine>,
    side_effects: SideEffects,
    events: Option<EventBus>,
    config: SynchronizerConfig,

    session: Option<Session>,
    state: PlayerState,
    intent_playing: bool,
    volume: f32,
    muted: bool,
    last_error: Option<String>,

    engine_events: EngineEventReceiver,
    snapshot_tx: watch::Sender<PlaybackSnapshot>,
    resolved_tx: mpsc::UnboundedSender<Resolved>,
}

impl PlaybackSynchronizer {
    /// Start the synchronizer and its side-effect worker on the current
    /// runtime.
    pub fn spawn(parts: SynchronizerParts) -> (SynchronizerHandle, JoinHandle<()>) {
        let SynchronizerParts {
            queue,
            resolver,
            engine,
            engine_events,
            notifier,
            wake_lock,
            events,
            config,
        } = parts;

        let (side_effects, _worker) = SideEffects::spawn(notifier, wake_lock);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        let volume = config.initial_volume.clamp(0.0, 1.0);
        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot {
            volume,
            ..PlaybackSnapshot::default()
        });
        let current_rx = queue.subscribe_current();

        let synchronizer = Self {
            queue,
            resolver,
            engine,
            side_effects,
            events,
            config,
            session: None,
            state: PlayerState::Idle,
            intent_playing: false,
            volume,
            muted: false,
            last_error: None,
            engine_events,
            snapshot_tx,
            resolved_tx,
        };

        let task = tokio::spawn(synchronizer.run(command_rx, current_rx, resolved_rx));
        let handle = SynchronizerHandle {
            commands: command_tx,
            snapshot_rx,
        };
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut current_rx: watch::Receiver<Option<Track>>,
        mut resolved_rx: mpsc::UnboundedReceiver<Resolved>,
    ) {
        info!("Playback synchronizer started");
        self.side_effects.initialize();
        self.apply_volume().await;
        self.reconcile().await;

        let mut engine_open = true;
        let mut queue_open = true;

        loop {
            // Engine reports go first, then resolutions, queue changes and
            // commands. Reports queued while a source was being swapped in
            // are dropped by `on_resolved`.
            tokio::select! {
                biased;

                event = self.engine_events.recv(), if engine_open => match event {
                    Some(event) => self.on_engine_event(event).await,
                    None => {
                        warn!("Engine event channel closed");
                        engine_open = false;
                    }
                },

                Some(resolved) = resolved_rx.recv() => self.on_resolved(resolved).await,

                changed = current_rx.changed(), if queue_open => match changed {
                    Ok(()) => self.reconcile().await,
                    Err(_) => queue_open = false,
                },

                command = commands.recv() => match command {
                    Some(Command::Shutdown(ack)) => {
                        self.teardown().await;
                        self.side_effects.flush().await;
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => {
                        self.teardown().await;
                        break;
                    }
                },
            }
        }

        info!("Playback synchronizer stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::SetPlaying(playing, ack) => {
                self.set_playing(playing).await;
                let _ = ack.send(());
            }
            Command::TogglePlayPause(ack) => {
                self.set_playing(!self.intent_playing).await;
                let _ = ack.send(());
            }
            Command::Next(reply) => {
                let moved = self.next().await;
                let _ = reply.send(moved);
            }
            Command::Previous(reply) => {
                let moved = self.previous().await;
                let _ = reply.send(moved);
            }
            Command::Seek(position_ms, ack) => {
                self.seek(position_ms).await;
                let _ = ack.send(());
            }
            Command::BeginScrub(ack) => {
                if let Some(session) = self.session.as_mut() {
                    session.scrubbing = true;
                }
                self.publish();
                let _ = ack.send(());
            }
            Command::Scrub(position_ms, ack) => {
                if let Some(session) = self.session.as_mut().filter(|s| s.loaded) {
                    session.position_ms = clamp_position(position_ms, session.duration_ms);
                }
                self.publish();
                let _ = ack.send(());
            }
            Command::CommitScrub(position_ms, ack) => {
                if let Some(session) = self.session.as_mut() {
                    session.scrubbing = false;
                }
                self.seek(position_ms).await;
                let _ = ack.send(());
            }
            Command::SetVolume(volume, ack) => {
                self.volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
                self.volume_changed().await;
                let _ = ack.send(());
            }
            Command::ToggleMute(ack) => {
                self.muted = !self.muted;
                self.volume_changed().await;
                let _ = ack.send(());
            }
            Command::Media(action, ack) => {
                self.media_action(action).await;
                let _ = ack.send(());
            }
            Command::Sync(ack) => {
                self.reconcile().await;
                let _ = ack.send(());
            }
            Command::Shutdown(ack) => {
                // Handled by the run loop
                let _ = ack.send(());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Track selection
    // ------------------------------------------------------------------------

    /// Bring the session in line with the queue's current track.
    async fn reconcile(&mut self) {
        let Some(track) = self.queue.current_track() else {
            if self.session.is_some() || self.state != PlayerState::Idle {
                self.teardown().await;
            }
            return;
        };

        if let Some(session) = &self.session {
            if session.track.id == track.id {
                return;
            }
            if self.state == PlayerState::Loading {
                // Picked up again once the pending resolution settles
                debug!(pending = %session.track.id, next = %track.id, "Load in progress, deferring switch");
                return;
            }
        }

        self.begin_load(track).await;
    }

    async fn begin_load(&mut self, track: Track) {
        if let Some(previous) = self.session.take() {
            if previous.loaded {
                if let Err(e) = self.engine.pause().await {
                    warn!(error = %e, "Failed to pause previous track");
                }
            }
        }

        info!(track_id = %track.id, "Loading track");
        let session = Session::new(track.clone());
        let session_id = session.id;
        self.session = Some(session);
        self.state = PlayerState::Loading;
        self.last_error = None;
        self.emit(PlaybackEvent::Loading {
            track_id: track.id.get(),
            title: track.title.clone(),
        });
        self.publish();

        let resolver = Arc::clone(&self.resolver);
        let resolved_tx = self.resolved_tx.clone();
        tokio::spawn(async move {
            let result = resolver.resolve(track.id).await;
            let _ = resolved_tx.send(Resolved { session_id, result });
        });
    }

    async fn on_resolved(&mut self, resolved: Resolved) {
        let Some(track) = self
            .session
            .as_ref()
            .filter(|s| s.id == resolved.session_id)
            .map(|s| s.track.clone())
        else {
            debug!("Discarding resolution for an abandoned session");
            return;
        };

        if self.queue.current_track().map(|t| t.id) != Some(track.id) {
            debug!(track_id = %track.id, "Queue moved on while loading");
            self.session = None;
            self.state = PlayerState::Idle;
            self.reconcile().await;
            return;
        }

        let source = match resolved.result {
            Ok(source) => source,
            Err(e) => {
                self.fail_load(&track, e);
                return;
            }
        };

        let offline = !source.is_remote();
        debug!(track_id = %track.id, %source, "Replacing engine source");
        if let Err(e) = self.engine.load(source).await {
            self.fail_load(&track, PlaybackError::engine(e));
            return;
        }
        self.discard_stale_reports();

        if let Some(session) = self.session.as_mut() {
            session.loaded = true;
        }
        self.state = PlayerState::Ready;
        self.apply_volume().await;
        self.emit(PlaybackEvent::Ready {
            track_id: track.id.get(),
            offline,
        });

        if self.intent_playing {
            self.start_playback().await;
        } else {
            self.side_effects.paused(&track);
            self.publish();
        }
    }

    /// Drop engine reports queued up to now. Right after a source swap
    /// they all describe the previous track.
    fn discard_stale_reports(&mut self) {
        let mut dropped = 0usize;
        while self.engine_events.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "Discarded engine reports from the previous source");
        }
    }

    fn fail_load(&mut self, track: &Track, err: PlaybackError) {
        error!(track_id = %track.id, error = %err, "Failed to load track");
        // Forget the id so selecting the track again retries
        self.session = None;
        self.state = PlayerState::Error;
        self.intent_playing = false;
        self.last_error = Some(err.to_string());
        self.side_effects.paused(track);
        self.emit(PlaybackEvent::Error {
            track_id: Some(track.id.get()),
            message: err.to_string(),
            retryable: err.is_retryable(),
        });
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Play / pause
    // ------------------------------------------------------------------------

    async fn set_playing(&mut self, playing: bool) {
        if !playing {
            self.intent_playing = false;
            if self.state == PlayerState::Playing {
                self.pause_playback().await;
            } else {
                self.publish();
            }
            return;
        }

        self.intent_playing = true;
        match self.state {
            PlayerState::Ready | PlayerState::Paused => self.start_playback().await,
            PlayerState::Playing | PlayerState::Loading => self.publish(),
            PlayerState::Idle | PlayerState::Error => {
                if self.queue.current_track().is_none() {
                    self.intent_playing = false;
                } else {
                    self.reconcile().await;
                }
                self.publish();
            }
        }
    }

    async fn start_playback(&mut self) {
        let Some(track) = self
            .session
            .as_ref()
            .filter(|s| s.loaded)
            .map(|s| s.track.clone())
        else {
            return;
        };

        match self.engine.play().await {
            Ok(()) => {
                self.state = PlayerState::Playing;
                self.side_effects.playing(&track);
                self.emit(PlaybackEvent::Started {
                    track_id: track.id.get(),
                    title: track.title.clone(),
                });
            }
            Err(e) => {
                let err = PlaybackError::engine(e);
                error!(track_id = %track.id, error = %err, "Engine refused to play");
                self.intent_playing = false;
                self.state = PlayerState::Paused;
                self.last_error = Some(err.to_string());
                self.emit(PlaybackEvent::Error {
                    track_id: Some(track.id.get()),
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                });
            }
        }
        self.publish();
    }

    async fn pause_playback(&mut self) {
        let Some((track, position_ms)) = self
            .session
            .as_ref()
            .map(|s| (s.track.clone(), s.position_ms))
        else {
            return;
        };

        if let Err(e) = self.engine.pause().await {
            warn!(error = %e, "Engine pause failed");
        }
        self.state = PlayerState::Paused;
        self.side_effects.paused(&track);
        self.emit(PlaybackEvent::Paused {
            track_id: track.id.get(),
            position_ms,
        });
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    async fn next(&mut self) -> bool {
        match self.queue.advance().await {
            Some(track) => {
                self.switch_to(track).await;
                true
            }
            None => {
                self.set_playing(false).await;
                false
            }
        }
    }

    async fn previous(&mut self) -> bool {
        match self.queue.retreat().await {
            Some(track) => {
                self.switch_to(track).await;
                true
            }
            None => false,
        }
    }

    /// Play `track`, restarting it if it is already the loaded one.
    async fn switch_to(&mut self, track: Track) {
        self.intent_playing = true;
        let already_loaded = self
            .session
            .as_ref()
            .map_or(false, |s| s.loaded && s.track.id == track.id);

        if already_loaded {
            self.restart().await;
        } else {
            self.reconcile().await;
            self.publish();
        }
    }

    async fn restart(&mut self) {
        self.seek(0).await;
        self.start_playback().await;
    }

    async fn on_finished(&mut self) {
        let Some(track) = self
            .session
            .as_ref()
            .filter(|s| s.loaded)
            .map(|s| s.track.clone())
        else {
            return;
        };

        debug!(track_id = %track.id, "Track finished");
        self.emit(PlaybackEvent::Completed {
            track_id: track.id.get(),
        });

        if self.queue.repeat_mode() == RepeatMode::One {
            self.intent_playing = true;
            self.restart().await;
            return;
        }

        match self.queue.advance().await {
            Some(next) => self.switch_to(next).await,
            None => {
                // Leave the last track loaded at its end
                if let Some(session) = self.session.as_mut() {
                    if session.duration_ms > 0 {
                        session.position_ms = session.duration_ms;
                    }
                }
                self.set_playing(false).await;
            }
        }
    }

    async fn media_action(&mut self, action: MediaAction) {
        debug!(action = action.identifier(), "Media action");
        match action {
            MediaAction::PlayPause => self.set_playing(!self.intent_playing).await,
            MediaAction::Next => {
                self.next().await;
            }
            MediaAction::Previous => {
                self.previous().await;
            }
            MediaAction::Close => {
                self.intent_playing = false;
                if self.state == PlayerState::Playing {
                    if let Err(e) = self.engine.pause().await {
                        warn!(error = %e, "Engine pause failed");
                    }
                    self.state = PlayerState::Paused;
                }
                self.side_effects.teardown();
                self.publish();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Position
    // ------------------------------------------------------------------------

    async fn seek(&mut self, position_ms: u64) {
        let Some(session) = self.session.as_mut().filter(|s| s.loaded) else {
            return;
        };
        let target = clamp_position(position_ms, session.duration_ms);
        session.position_ms = target;
        let track_id = session.track.id.get();
        let duration_ms = session.duration_ms;
        self.publish();

        if let Err(e) = self.engine.seek(target).await {
            warn!(position_ms = target, error = %e, "Engine seek failed");
        }
        // The debounce window starts once the engine has taken the seek
        if let Some(session) = self.session.as_mut() {
            session.last_seek = Some(Instant::now());
        }
        self.emit(PlaybackEvent::PositionChanged {
            track_id,
            position_ms: target,
            duration_ms,
        });
    }

    async fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Status {
                position_ms,
                duration_ms,
            } => self.on_status(position_ms, duration_ms),
            EngineEvent::Finished => self.on_finished().await,
        }
    }

    fn on_status(&mut self, position_ms: Option<u64>, duration_ms: Option<u64>) {
        if self.state == PlayerState::Loading {
            return;
        }
        let debounce = self.config.position_debounce;
        let Some(session) = self.session.as_mut().filter(|s| s.loaded) else {
            return;
        };

        let mut changed = false;
        if let Some(duration) = duration_ms {
            if duration != session.duration_ms {
                session.duration_ms = duration;
                changed = true;
            }
        }
        if let Some(position) = position_ms {
            let settled = session
                .last_seek
                .map_or(true, |at| at.elapsed() >= debounce);
            if !session.scrubbing && settled && position != session.position_ms {
                session.position_ms = position;
                changed = true;
            }
        }

        if changed {
            let event = PlaybackEvent::PositionChanged {
                track_id: session.track.id.get(),
                position_ms: session.position_ms,
                duration_ms: session.duration_ms,
            };
            self.emit(event);
            self.publish();
        }
    }

    // ------------------------------------------------------------------------
    // Volume
    // ------------------------------------------------------------------------

    fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    async fn apply_volume(&self) {
        if let Err(e) = self.engine.set_volume(self.effective_volume()).await {
            warn!(error = %e, "Failed to apply volume");
        }
    }

    async fn volume_changed(&mut self) {
        self.apply_volume().await;
        self.emit(PlaybackEvent::VolumeChanged {
            volume_percent: (self.volume * 100.0).round() as u8,
            muted: self.muted,
        });
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Pause the engine and release side effects. Safe to repeat.
    async fn teardown(&mut self) {
        let was_active = self.session.is_some() || self.state != PlayerState::Idle;
        if let Some(session) = self.session.take() {
            if session.loaded {
                if let Err(e) = self.engine.pause().await {
                    warn!(error = %e, "Engine pause failed during teardown");
                }
            }
        }

        self.state = PlayerState::Idle;
        self.intent_playing = false;
        self.side_effects.teardown();
        if was_active {
            debug!("Playback session torn down");
            self.emit(PlaybackEvent::Stopped);
        }
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------------

    fn publish(&self) {
        let session = self.session.as_ref();
        let snapshot = PlaybackSnapshot {
            state: self.state,
            track: session.map(|s| s.track.clone()),
            is_playing: self.intent_playing,
            position_ms: session.map_or(0, |s| s.position_ms),
            duration_ms: session.map_or(0, |s| s.duration_ms),
            is_scrubbing: session.map_or(false, |s| s.scrubbing),
            volume: self.volume,
            is_muted: self.muted,
            last_error: self.last_error.clone(),
        };
        self.snapshot_tx.send_replace(snapshot);
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Playback(event));
        }
    }
}

fn clamp_position(position_ms: u64, duration_ms: u64) -> u64 {
    if duration_ms > 0 {
        position_ms.min(duration_ms)
    } else {
        position_ms
    }
}
