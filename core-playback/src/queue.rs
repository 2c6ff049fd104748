//! # Queue Manager
//!
//! Owns the ordered track list, the current position and the shuffle/repeat
//! flags. Every mutation is applied under one lock, so callers never observe
//! a half-applied state, and is then persisted as a full snapshot.
//!
//! The current track is also published on a `watch` channel so the playback
//! synchronizer can react to selection changes without polling.

use bridge_traits::storage::SettingsStore;
use core_library::models::{Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, info, instrument, warn};

use crate::error::{PlaybackError, Result};

// ============================================================================
// Repeat mode
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    /// Next mode in the `off -> all -> one -> off` cycle.
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::One => "one",
            RepeatMode::All => "all",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Queue state
// ============================================================================

/// Snapshot of the queue.
///
/// `tracks` is the play order. When shuffled it is a permutation of
/// `original_tracks`, which always keeps insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueState {
    pub tracks: Vec<Track>,
    pub original_tracks: Vec<Track>,
    pub current_index: Option<usize>,
    pub is_shuffled: bool,
    pub repeat_mode: RepeatMode,
}

impl QueueState {
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current index with `-1` meaning "nothing selected"
    pub fn current_position(&self) -> i64 {
        self.current_index.map_or(-1, |index| index as i64)
    }

    pub fn has_next(&self) -> bool {
        match self.repeat_mode {
            RepeatMode::One | RepeatMode::All => true,
            RepeatMode::Off => self.current_position() < self.tracks.len() as i64 - 1,
        }
    }

    pub fn has_previous(&self) -> bool {
        match self.repeat_mode {
            RepeatMode::All => true,
            RepeatMode::One | RepeatMode::Off => self.current_position() > 0,
        }
    }

    fn check_consistency(&self) -> std::result::Result<(), String> {
        if let Some(index) = self.current_index {
            if index >= self.tracks.len() {
                return Err(format!(
                    "current index {} outside queue of {}",
                    index,
                    self.tracks.len()
                ));
            }
        }

        let mut played: Vec<TrackId> = self.tracks.iter().map(|t| t.id).collect();
        let mut original: Vec<TrackId> = self.original_tracks.iter().map(|t| t.id).collect();
        played.sort_unstable();
        original.sort_unstable();
        if played != original {
            return Err("play order and original order hold different tracks".to_string());
        }
        Ok(())
    }
}

/// On-disk shape of the queue, shared with earlier clients.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedQueue {
    tracks: Vec<Track>,
    current_index: i64,
    #[serde(default)]
    is_shuffled: bool,
    #[serde(default)]
    repeat_mode: RepeatMode,
    #[serde(default)]
    original_tracks: Option<Vec<Track>>,
}

impl From<QueueState> for PersistedQueue {
    fn from(state: QueueState) -> Self {
        Self {
            current_index: state.current_position(),
            tracks: state.tracks,
            is_shuffled: state.is_shuffled,
            repeat_mode: state.repeat_mode,
            original_tracks: Some(state.original_tracks),
        }
    }
}

impl TryFrom<PersistedQueue> for QueueState {
    type Error = String;

    fn try_from(persisted: PersistedQueue) -> std::result::Result<Self, Self::Error> {
        let current_index = match persisted.current_index {
            -1 => None,
            index if index >= 0 => Some(index as usize),
            index => return Err(format!("invalid current index {}", index)),
        };
        let original_tracks = persisted
            .original_tracks
            .unwrap_or_else(|| persisted.tracks.clone());

        let state = QueueState {
            tracks: persisted.tracks,
            original_tracks,
            current_index,
            is_shuffled: persisted.is_shuffled,
            repeat_mode: persisted.repeat_mode,
        };
        state.check_consistency()?;
        Ok(state)
    }
}

// ============================================================================
// Shuffling
// ============================================================================

/// Permutation source for shuffle.
///
/// Injected so tests can use a fixed permutation.
pub trait Shuffler: Send + Sync {
    fn shuffle(&self, tracks: &mut [Track]);
}

/// Uniform Fisher-Yates shuffle backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomShuffler;

impl Shuffler for RandomShuffler {
    fn shuffle(&self, tracks: &mut [Track]) {
        tracks.shuffle(&mut rand::thread_rng());
    }
}

fn relocate(tracks: &[Track], current: Option<TrackId>) -> Option<usize> {
    if tracks.is_empty() {
        return None;
    }
    let found = current.and_then(|id| tracks.iter().position(|t| t.id == id));
    Some(found.unwrap_or(0))
}

// ============================================================================
// Queue manager
// ============================================================================

pub struct QueueManager {
    state: Mutex<QueueState>,
    store: Arc<dyn SettingsStore>,
    storage_key: String,
    shuffler: Arc<dyn Shuffler>,
    events: Option<EventBus>,
    current_tx: watch::Sender<Option<Track>>,
    persist_lock: AsyncMutex<()>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn SettingsStore>, storage_key: impl Into<String>) -> Self {
        let (current_tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(QueueState::default()),
            store,
            storage_key: storage_key.into(),
            shuffler: Arc::new(RandomShuffler),
            events: None,
            current_tx,
            persist_lock: AsyncMutex::new(()),
        }
    }

    pub fn with_shuffler(mut self, shuffler: Arc<dyn Shuffler>) -> Self {
        self.shuffler = shuffler;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Load the persisted snapshot.
    ///
    /// A missing, unreadable or inconsistent snapshot leaves the queue empty.
    /// Returns `true` if a snapshot was applied.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> bool {
        let restored = match self.read_persisted().await {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("No persisted queue");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Discarding persisted queue");
                return false;
            }
        };

        let track_count = restored.len();
        let current_index = restored.current_index;
        {
            let mut state = self.state.lock();
            *state = restored;
            self.publish_current(&state, true);
        }

        info!(track_count, ?current_index, "Queue restored");
        self.emit(QueueEvent::Restored {
            track_count,
            current_index,
        });
        true
    }

    async fn read_persisted(&self) -> Result<Option<QueueState>> {
        let Some(raw) = self.store.get_string(&self.storage_key).await? else {
            return Ok(None);
        };
        let persisted: PersistedQueue =
            serde_json::from_str(&raw).map_err(|e| PlaybackError::Storage(e.to_string()))?;
        QueueState::try_from(persisted)
            .map(Some)
            .map_err(PlaybackError::Storage)
    }

    /// Replace the whole queue and select `start_index`.
    ///
    /// The shuffle flag is left as is. An empty list clears the queue.
    #[instrument(skip(self, tracks), fields(track_count = tracks.len()))]
    pub async fn load_queue(&self, tracks: Vec<Track>, start_index: usize) -> Result<Option<Track>> {
        if tracks.is_empty() {
            self.clear().await;
            return Ok(None);
        }
        if start_index >= tracks.len() {
            return Err(PlaybackError::InvalidNavigation(format!(
                "start index {} outside queue of {}",
                start_index,
                tracks.len()
            )));
        }

        let (current, track_count) = {
            let mut state = self.state.lock();
            state.original_tracks = tracks.clone();
            state.tracks = tracks;
            state.current_index = Some(start_index);
            self.publish_current(&state, true);
            (state.current_track().cloned(), state.len())
        };

        debug!(start_index, "Queue loaded");
        self.emit(QueueEvent::Loaded {
            track_count,
            current_index: Some(start_index),
        });
        self.persist().await;
        Ok(current)
    }

    /// Append to the end of both orders. The current index is untouched.
    pub async fn append(&self, track: Track) {
        let track_id = track.id;
        let track_count = {
            let mut state = self.state.lock();
            state.original_tracks.push(track.clone());
            state.tracks.push(track);
            state.len()
        };

        self.emit(QueueEvent::Appended {
            track_id: track_id.get(),
            track_count,
        });
        self.persist().await;
    }

    /// Move to the next track.
    ///
    /// At the end of the queue `All` wraps to the start, `One` stays on the
    /// current track and `Off` returns `None` without touching the state.
    pub async fn advance(&self) -> Option<Track> {
        let moved = {
            let mut state = self.state.lock();
            if state.is_empty() {
                return None;
            }

            let next = state.current_index.map_or(0, |index| index + 1);
            let target = if next < state.len() {
                Some(next)
            } else {
                match state.repeat_mode {
                    RepeatMode::All => Some(0),
                    RepeatMode::One => state.current_index,
                    RepeatMode::Off => None,
                }
            };

            match target {
                Some(index) => {
                    state.current_index = Some(index);
                    self.publish_current(&state, false);
                    state.current_track().cloned().map(|track| (index, track))
                }
                None => {
                    let last = state.current_track().map(|t| t.id);
                    drop(state);
                    if let Some(last) = last {
                        debug!(last_track_id = %last, "Queue exhausted");
                        self.emit(QueueEvent::Exhausted {
                            last_track_id: last.get(),
                        });
                    }
                    return None;
                }
            }
        };

        let (index, track) = moved?;
        self.index_changed(index, &track).await;
        Some(track)
    }

    /// Move to the previous track.
    ///
    /// At the start `All` wraps to the last track and anything else stays on
    /// index 0, so a non-empty queue always yields a track.
    pub async fn retreat(&self) -> Option<Track> {
        let (index, track) = {
            let mut state = self.state.lock();
            if state.is_empty() {
                return None;
            }

            let previous = state.current_position() - 1;
            let index = if previous >= 0 {
                previous as usize
            } else if state.repeat_mode == RepeatMode::All {
                state.len() - 1
            } else {
                0
            };

            state.current_index = Some(index);
            self.publish_current(&state, false);
            (index, state.current_track().cloned()?)
        };

        self.index_changed(index, &track).await;
        Some(track)
    }

    /// Select `index` directly.
    pub async fn jump_to(&self, index: usize) -> Result<Track> {
        let track = {
            let mut state = self.state.lock();
            if index >= state.len() {
                return Err(PlaybackError::InvalidNavigation(format!(
                    "index {} outside queue of {}",
                    index,
                    state.len()
                )));
            }
            state.current_index = Some(index);
            self.publish_current(&state, true);
            state.current_track().cloned()
        };

        let track = track.ok_or_else(|| {
            PlaybackError::InvalidNavigation(format!("no track at index {}", index))
        })?;
        self.index_changed(index, &track).await;
        Ok(track)
    }

    /// Advance the repeat mode and return the new one.
    pub async fn cycle_repeat(&self) -> RepeatMode {
        let mode = {
            let mut state = self.state.lock();
            state.repeat_mode = state.repeat_mode.cycled();
            state.repeat_mode
        };

        debug!(%mode, "Repeat mode changed");
        self.emit(QueueEvent::RepeatChanged {
            mode: mode.as_str().to_string(),
        });
        self.persist().await;
        mode
    }

    /// Flip shuffle and return the new flag.
    ///
    /// The current track keeps playing: the index follows it into the new
    /// order (index 0 if it can't be found).
    pub async fn toggle_shuffle(&self) -> bool {
        let enabled = {
            let mut state = self.state.lock();
            let current = state.current_track().map(|t| t.id);

            if state.is_shuffled {
                state.tracks = state.original_tracks.clone();
                state.is_shuffled = false;
            } else {
                let mut shuffled = state.tracks.clone();
                self.shuffler.shuffle(&mut shuffled);
                state.tracks = shuffled;
                state.is_shuffled = true;
            }

            state.current_index = relocate(&state.tracks, current);
            self.publish_current(&state, false);
            state.is_shuffled
        };

        debug!(enabled, "Shuffle toggled");
        self.emit(QueueEvent::ShuffleChanged { enabled });
        self.persist().await;
        enabled
    }

    /// Reset to the empty initial state.
    pub async fn clear(&self) {
        {
            let mut state = self.state.lock();
            *state = QueueState::default();
            self.publish_current(&state, false);
        }

        debug!("Queue cleared");
        self.emit(QueueEvent::Cleared);
        self.persist().await;
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    pub fn snapshot(&self) -> QueueState {
        self.state.lock().clone()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.lock().current_track().cloned()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().current_index
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.lock().repeat_mode
    }

    pub fn is_shuffled(&self) -> bool {
        self.state.lock().is_shuffled
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    pub fn has_next(&self) -> bool {
        self.state.lock().has_next()
    }

    pub fn has_previous(&self) -> bool {
        self.state.lock().has_previous()
    }

    /// Watch the current track.
    pub fn subscribe_current(&self) -> watch::Receiver<Option<Track>> {
        self.current_tx.subscribe()
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Publish the current track. Unforced publishes only fire when the
    /// track id changes; explicit selections always notify so a failed
    /// track can be retried by selecting it again.
    fn publish_current(&self, state: &QueueState, force: bool) {
        let current = state.current_track().cloned();
        if force {
            self.current_tx.send_replace(current);
        } else {
            self.current_tx.send_if_modified(|previous| {
                let changed = previous.as_ref().map(|t| t.id) != current.as_ref().map(|t| t.id);
                if changed {
                    *previous = current;
                }
                changed
            });
        }
    }

    async fn index_changed(&self, index: usize, track: &Track) {
        self.emit(QueueEvent::IndexChanged {
            current_index: index,
            track_id: track.id.get(),
        });
        self.persist().await;
    }

    async fn persist(&self) {
        // Snapshot under the write lock so the newest state always lands last
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.state.lock().clone();

        let result = if snapshot.is_empty() {
            self.store
                .delete(&self.storage_key)
                .await
                .map_err(PlaybackError::from)
        } else {
            match serde_json::to_string(&PersistedQueue::from(snapshot)) {
                Ok(raw) => self
                    .store
                    .set_string(&self.storage_key, &raw)
                    .await
                    .map_err(PlaybackError::from),
                Err(e) => Err(PlaybackError::Storage(e.to_string())),
            }
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist queue");
        }
    }

    fn emit(&self, event: QueueEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Queue(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u64) -> Track {
        Track::new(id, format!("Track {}", id), "Artist")
    }

    #[test]
    fn test_repeat_cycle() {
        assert_eq!(RepeatMode::Off.cycled(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycled(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycled(), RepeatMode::Off);
        assert_eq!(serde_json::to_string(&RepeatMode::All).unwrap(), "\"all\"");
    }

    #[test]
    fn test_predicates() {
        let mut state = QueueState {
            tracks: vec![track(1), track(2)],
            original_tracks: vec![track(1), track(2)],
            current_index: Some(1),
            ..Default::default()
        };
        assert!(!state.has_next());
        assert!(state.has_previous());

        state.repeat_mode = RepeatMode::One;
        assert!(state.has_next());

        state.current_index = Some(0);
        assert!(!state.has_previous());

        state.repeat_mode = RepeatMode::All;
        assert!(state.has_previous());

        assert!(!QueueState::default().has_next());
        assert_eq!(QueueState::default().current_position(), -1);
    }

    #[test]
    fn test_persisted_shape_round_trip() {
        let state = QueueState {
            tracks: vec![track(2), track(1)],
            original_tracks: vec![track(1), track(2)],
            current_index: Some(0),
            is_shuffled: true,
            repeat_mode: RepeatMode::One,
        };

        let raw = serde_json::to_value(PersistedQueue::from(state.clone())).unwrap();
        assert_eq!(raw["currentIndex"], 0);
        assert_eq!(raw["repeatMode"], "one");
        assert_eq!(raw["isShuffled"], true);

        let parsed: PersistedQueue = serde_json::from_value(raw).unwrap();
        assert_eq!(QueueState::try_from(parsed).unwrap(), state);
    }

    #[test]
    fn test_inconsistent_snapshots_are_rejected() {
        let out_of_range = PersistedQueue {
            tracks: vec![track(1)],
            current_index: 3,
            is_shuffled: false,
            repeat_mode: RepeatMode::Off,
            original_tracks: None,
        };
        assert!(QueueState::try_from(out_of_range).is_err());

        let mismatched = PersistedQueue {
            tracks: vec![track(1)],
            current_index: 0,
            is_shuffled: true,
            repeat_mode: RepeatMode::Off,
            original_tracks: Some(vec![track(2)]),
        };
        assert!(QueueState::try_from(mismatched).is_err());
    }

    #[test]
    fn test_missing_original_order_defaults_to_play_order() {
        let parsed: PersistedQueue =
            serde_json::from_str(r#"{"tracks":[{"id":4,"title":"T","artist":"A"}],"currentIndex":0}"#)
                .unwrap();
        let state = QueueState::try_from(parsed).unwrap();
        assert_eq!(state.original_tracks, state.tracks);
        assert_eq!(state.repeat_mode, RepeatMode::Off);
    }

    #[test]
    fn test_relocate() {
        let tracks = vec![track(3), track(1), track(2)];
        assert_eq!(relocate(&tracks, Some(TrackId(2))), Some(2));
        assert_eq!(relocate(&tracks, Some(TrackId(9))), Some(0));
        assert_eq!(relocate(&tracks, None), Some(0));
        assert_eq!(relocate(&[], Some(TrackId(1))), None);
    }
}
