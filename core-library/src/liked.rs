//! Liked songs
//!
//! A newest-first list of tracks the user liked, persisted as one JSON array
//! in the settings store. Storage failures are logged and absorbed: the
//! in-memory list stays authoritative for the session.

use bridge_traits::storage::SettingsStore;
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::models::{AudioQuality, Track, TrackId, TrackImages};

/// Number of entries shown in the "recently liked" shelf
pub const RECENT_LIKED_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikedSong {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default)]
    pub images: TrackImages,
    pub liked_at: DateTime<Utc>,
}

impl LikedSong {
    fn from_track(track: &Track, liked_at: DateTime<Utc>) -> Self {
        Self {
            id: track.id,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album_title: track.album_title.clone(),
            duration: Some(track.duration),
            images: track.images.clone(),
            liked_at,
        }
    }

    /// Rebuild a playable track; quality is unknown so CD quality is assumed
    pub fn to_track(&self) -> Track {
        Track {
            id: self.id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            album_title: self.album_title.clone(),
            duration: self.duration.unwrap_or(0),
            images: self.images.clone(),
            streamable: true,
            audio_quality: Some(AudioQuality::default()),
        }
    }
}

pub struct LikedSongs {
    store: Arc<dyn SettingsStore>,
    key: String,
    clock: Arc<dyn Clock>,
    events: Option<EventBus>,
    songs: RwLock<Vec<LikedSong>>,
    persist_lock: Mutex<()>,
}

impl LikedSongs {
    pub fn new(store: Arc<dyn SettingsStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            clock: Arc::new(SystemClock),
            events: None,
            songs: RwLock::new(Vec::new()),
            persist_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the in-memory list with the persisted one.
    ///
    /// Missing or unreadable data leaves an empty list. Returns the number of
    /// songs loaded.
    #[instrument(skip(self))]
    pub async fn load(&self) -> usize {
        let songs = match self.read_persisted().await {
            Ok(songs) => songs,
            Err(e) => {
                warn!(error = %e, "Failed to load liked songs, starting empty");
                Vec::new()
            }
        };
        let count = songs.len();
        *self.songs.write() = songs;
        info!(count, "Liked songs loaded");
        count
    }

    async fn read_persisted(&self) -> Result<Vec<LikedSong>> {
        match self.store.get_string(&self.key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn is_liked(&self, track_id: TrackId) -> bool {
        self.songs.read().iter().any(|song| song.id == track_id)
    }

    /// Like a track. Returns `false` if it was already liked.
    pub async fn like(&self, track: &Track) -> bool {
        {
            let mut songs = self.songs.write();
            if songs.iter().any(|song| song.id == track.id) {
                return false;
            }
            songs.insert(0, LikedSong::from_track(track, self.clock.now()));
        }
        debug!(track_id = %track.id, "Song liked");
        self.persist().await;
        self.emit(LibraryEvent::SongLiked {
            track_id: track.id.get(),
            title: track.title.clone(),
        });
        true
    }

    /// Unlike a track. Returns `false` if it wasn't liked.
    pub async fn unlike(&self, track_id: TrackId) -> bool {
        {
            let mut songs = self.songs.write();
            let before = songs.len();
            songs.retain(|song| song.id != track_id);
            if songs.len() == before {
                return false;
            }
        }
        debug!(track_id = %track_id, "Song unliked");
        self.persist().await;
        self.emit(LibraryEvent::SongUnliked {
            track_id: track_id.get(),
        });
        true
    }

    /// Flip the liked state. Returns the new state.
    pub async fn toggle(&self, track: &Track) -> bool {
        if self.is_liked(track.id) {
            self.unlike(track.id).await;
            false
        } else {
            self.like(track).await;
            true
        }
    }

    pub fn count(&self) -> usize {
        self.songs.read().len()
    }

    /// Newest `limit` liked songs
    pub fn recent(&self, limit: usize) -> Vec<LikedSong> {
        self.songs.read().iter().take(limit).cloned().collect()
    }

    pub fn songs(&self) -> Vec<LikedSong> {
        self.songs.read().clone()
    }

    pub async fn clear_all(&self) {
        self.songs.write().clear();
        self.persist().await;
        self.emit(LibraryEvent::LikedSongsCleared);
    }

    /// Liked songs as playable tracks, newest first
    pub fn as_tracks(&self) -> Vec<Track> {
        self.songs.read().iter().map(LikedSong::to_track).collect()
    }

    async fn persist(&self) {
        // Serialize writers so an older snapshot never lands after a newer one
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.songs.read().clone();

        let raw = match serde_json::to_string(&snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize liked songs");
                return;
            }
        };
        if let Err(e) = self.store.set_string(&self.key, &raw).await {
            warn!(error = %e, "Failed to persist liked songs");
        }
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Library(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MemoryStore {
        values: parking_lot::Mutex<HashMap<String, String>>,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(BridgeError::StorageError("disk full".into()));
            }
            self.values.lock().insert(key.into(), value.into());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.values.lock().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.values.lock().remove(key);
            Ok(())
        }

        async fn list_keys(&self, prefix: &str) -> BridgeResult<Vec<String>> {
            Ok(self
                .values
                .lock()
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    const KEY: &str = "openspot_liked_songs";

    fn liked(store: Arc<MemoryStore>) -> LikedSongs {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        LikedSongs::new(store, KEY).with_clock(Arc::new(FixedClock(at)))
    }

    fn track(id: u64) -> Track {
        Track::new(id, format!("Song {}", id), "Artist").with_duration(200)
    }

    #[tokio::test]
    async fn test_like_is_newest_first_without_duplicates() {
        let store = Arc::new(MemoryStore::default());
        let songs = liked(store.clone());

        assert!(songs.like(&track(1)).await);
        assert!(songs.like(&track(2)).await);
        assert!(!songs.like(&track(1)).await);

        assert_eq!(songs.count(), 2);
        let ids: Vec<u64> = songs.songs().iter().map(|s| s.id.get()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(songs.recent(1)[0].id, TrackId(2));
    }

    #[tokio::test]
    async fn test_persisted_shape_and_reload() {
        let store = Arc::new(MemoryStore::default());
        let songs = liked(store.clone());
        songs.like(&track(5)).await;

        let raw = store.values.lock().get(KEY).cloned().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["id"], 5);
        assert_eq!(value[0]["likedAt"], "2024-05-01T12:00:00Z");

        let reloaded = liked(store);
        assert_eq!(reloaded.load().await, 1);
        assert!(reloaded.is_liked(TrackId(5)));
    }

    #[tokio::test]
    async fn test_toggle_and_unlike() {
        let songs = liked(Arc::new(MemoryStore::default()));

        assert!(songs.toggle(&track(3)).await);
        assert!(songs.is_liked(TrackId(3)));
        assert!(!songs.toggle(&track(3)).await);
        assert!(!songs.is_liked(TrackId(3)));
        assert!(!songs.unlike(TrackId(3)).await);
    }

    #[tokio::test]
    async fn test_corrupt_data_loads_empty() {
        let store = Arc::new(MemoryStore::default());
        store.values.lock().insert(KEY.into(), "{not json".into());

        let songs = liked(store);
        assert_eq!(songs.load().await, 0);
        assert_eq!(songs.count(), 0);
    }

    #[tokio::test]
    async fn test_write_failures_are_absorbed() {
        let store = Arc::new(MemoryStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let songs = liked(store);

        assert!(songs.like(&track(9)).await);
        assert!(songs.is_liked(TrackId(9)));
    }

    #[tokio::test]
    async fn test_clear_all_and_as_tracks() {
        let store = Arc::new(MemoryStore::default());
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let songs = liked(store.clone()).with_events(bus);

        songs.like(&track(1).with_album("Album")).await;
        let tracks = songs.as_tracks();
        assert_eq!(tracks[0].album_title.as_deref(), Some("Album"));
        assert_eq!(tracks[0].duration, 200);
        assert!(tracks[0].streamable);

        songs.clear_all().await;
        assert_eq!(songs.count(), 0);
        assert_eq!(store.values.lock().get(KEY).map(String::as_str), Some("[]"));

        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Library(LibraryEvent::SongLiked { track_id: 1, .. })
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Library(LibraryEvent::LikedSongsCleared)
        );
    }
}
