//! Recording fakes for the host bridges and the catalog

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::media::{MediaNotifier, NotificationContent, WakeLock};
use bridge_traits::playback::{
    engine_event_channel, AudioEngine, AudioSource, EngineEventSender,
};
use bridge_traits::storage::{FileSystemAccess, SettingsStore};
use core_library::catalog::{CatalogError, CatalogResult, TrackCatalog};
use core_library::models::{SearchPage, Track, TrackId};
use core_playback::{
    CachedCatalog, OfflineIndex, OfflineResolver, PlaybackSnapshot, PlaybackSynchronizer,
    QueueManager, Shuffler, SynchronizerConfig, SynchronizerHandle, SynchronizerParts,
};
use core_runtime::events::EventBus;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

pub const QUEUE_KEY: &str = "openspot_music_queue";
pub const OFFLINE_PREFIX: &str = "offline_";

pub fn track(id: u64) -> Track {
    Track::new(id, format!("Track {}", id), "Artist").with_duration(180)
}

pub fn tracks(ids: &[u64]) -> Vec<Track> {
    ids.iter().copied().map(track).collect()
}

pub fn stream_url(id: u64) -> String {
    format!("https://cdn.test/{}.flac", id)
}

// ============================================================================
// Settings store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub values: Mutex<HashMap<String, String>>,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::StorageError("read-only".into()));
        }
        self.put(key, value);
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::StorageError("read-only".into()));
        }
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

// ============================================================================
// File system
// ============================================================================

#[derive(Default)]
pub struct FakeFs {
    pub files: Mutex<HashSet<PathBuf>>,
    pub contents: Mutex<HashMap<PathBuf, Bytes>>,
    pub fail_writes: AtomicBool,
}

impl FakeFs {
    pub fn add(&self, path: impl Into<PathBuf>) {
        self.files.lock().insert(path.into());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        self.contents.lock().get(path.as_ref()).cloned()
    }
}

#[async_trait]
impl FileSystemAccess for FakeFs {
    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/data"))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().contains(path))
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.add(path);
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::StorageError("disk full".into()));
        }
        self.add(path);
        self.contents.lock().insert(path.to_path_buf(), data);
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Stream lookups succeed with [`stream_url`] unless the id is in `failing`.
/// With `gated`, each lookup waits for a permit on `gate`.
pub struct FakeCatalog {
    pub stream_calls: Mutex<Vec<u64>>,
    pub search_calls: AtomicUsize,
    pub failing: Mutex<HashSet<u64>>,
    pub gate: Semaphore,
    pub gated: AtomicBool,
}

impl Default for FakeCatalog {
    fn default() -> Self {
        Self {
            stream_calls: Mutex::new(Vec::new()),
            search_calls: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
            gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
        }
    }
}

impl FakeCatalog {
    pub fn gated() -> Self {
        let catalog = Self::default();
        catalog.gated.store(true, Ordering::SeqCst);
        catalog
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }

    pub fn stream_calls(&self) -> Vec<u64> {
        self.stream_calls.lock().clone()
    }
}

#[async_trait]
impl TrackCatalog for FakeCatalog {
    async fn search(&self, query: &str, offset: u32) -> CatalogResult<SearchPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        if query == "offline" {
            return Err(CatalogError::Network("unreachable".into()));
        }
        let tracks: Vec<Track> = (0..15).map(|i| track(offset as u64 + i + 1)).collect();
        Ok(SearchPage {
            tracks,
            has_more: offset < 30,
            offset,
            total: Some(45),
        })
    }

    async fn stream_url(&self, track_id: TrackId) -> CatalogResult<String> {
        self.stream_calls.lock().push(track_id.get());
        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        if self.failing.lock().contains(&track_id.get()) {
            return Err(CatalogError::Api {
                status: 503,
                message: "upstream unavailable".into(),
            });
        }
        Ok(stream_url(track_id.get()))
    }
}

// ============================================================================
// Audio engine
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load(AudioSource),
    Play,
    Pause,
    Seek(u64),
    SetVolume(f32),
}

/// With `hold_loads`, each `load` waits for [`FakeEngine::finish_load`].
#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub fail_loads: AtomicBool,
    pub hold_loads: AtomicBool,
    load_done: Notify,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn loads(&self) -> Vec<AudioSource> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Load(source) => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &EngineCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == wanted).count()
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            EngineCall::SetVolume(v) => Some(*v),
            _ => None,
        })
    }

    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    pub fn finish_load(&self) {
        self.load_done.notify_one();
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn load(&self, source: AudioSource) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::Load(source));
        if self.hold_loads.load(Ordering::SeqCst) {
            self.load_done.notified().await;
        }
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("unsupported codec".into()));
        }
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::Play);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::Pause);
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::Seek(position_ms));
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.calls.lock().push(EngineCall::SetVolume(volume));
        Ok(())
    }
}

// ============================================================================
// Side-effect services
// ============================================================================

#[derive(Default)]
pub struct FakeHost {
    pub notifications: Mutex<Vec<NotificationContent>>,
    pub hidden: AtomicUsize,
    pub wake_lock_on: AtomicBool,
    pub wake_lock_calls: AtomicUsize,
    pub fail_everything: AtomicBool,
}

impl FakeHost {
    pub fn last_notification(&self) -> Option<NotificationContent> {
        self.notifications.lock().last().cloned()
    }

    fn check(&self) -> BridgeResult<()> {
        if self.fail_everything.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("permission denied".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaNotifier for FakeHost {
    async fn show_or_update(&self, content: NotificationContent) -> BridgeResult<()> {
        self.check()?;
        self.notifications.lock().push(content);
        Ok(())
    }

    async fn hide(&self) -> BridgeResult<()> {
        self.check()?;
        self.hidden.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl WakeLock for FakeHost {
    async fn activate(&self) -> BridgeResult<()> {
        self.wake_lock_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.wake_lock_on.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn deactivate(&self) -> BridgeResult<()> {
        self.wake_lock_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.wake_lock_on.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Reverses the order; deterministic stand-in for a random shuffle
pub struct ReverseShuffler;

impl Shuffler for ReverseShuffler {
    fn shuffle(&self, tracks: &mut [Track]) {
        tracks.reverse();
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub fs: Arc<FakeFs>,
    pub catalog: Arc<FakeCatalog>,
    pub cached: Arc<CachedCatalog>,
    pub engine: Arc<FakeEngine>,
    pub host: Arc<FakeHost>,
    pub queue: Arc<QueueManager>,
    pub events: EventBus,
    pub engine_tx: EngineEventSender,
    pub player: SynchronizerHandle,
}

impl Harness {
    pub fn start() -> Self {
        Self::with_catalog(FakeCatalog::default())
    }

    pub fn with_catalog(catalog: FakeCatalog) -> Self {
        Self::build(catalog, Arc::new(FakeHost::default()))
    }

    pub fn build(catalog: FakeCatalog, host: Arc<FakeHost>) -> Self {
        let store = Arc::new(MemoryStore::default());
        let fs = Arc::new(FakeFs::default());
        let catalog = Arc::new(catalog);
        let cached = Arc::new(CachedCatalog::new(catalog.clone()));
        let engine = Arc::new(FakeEngine::default());
        let events = EventBus::new(256);
        let queue = Arc::new(
            QueueManager::new(store.clone(), QUEUE_KEY)
                .with_shuffler(Arc::new(ReverseShuffler))
                .with_events(events.clone()),
        );
        let resolver = Arc::new(OfflineResolver::new(
            OfflineIndex::new(store.clone(), OFFLINE_PREFIX),
            fs.clone(),
            cached.clone(),
        ));
        let (engine_tx, engine_rx) = engine_event_channel();

        let (player, _task) = PlaybackSynchronizer::spawn(SynchronizerParts {
            queue: queue.clone(),
            resolver,
            engine: engine.clone(),
            engine_events: engine_rx,
            notifier: host.clone(),
            wake_lock: host.clone(),
            events: Some(events.clone()),
            config: SynchronizerConfig::default(),
        });

        Self {
            store,
            fs,
            catalog,
            cached,
            engine,
            host,
            queue,
            events,
            engine_tx,
            player,
        }
    }

    /// Wait until the published snapshot satisfies `condition`.
    pub async fn wait_for(&self, condition: impl FnMut(&PlaybackSnapshot) -> bool) -> PlaybackSnapshot {
        let mut rx = self.player.subscribe();
        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(condition))
            .await
            .expect("timed out waiting for playback state")
            .expect("synchronizer stopped");
        snapshot.clone()
    }

    /// Wait until `track_id` is loaded and playing.
    pub async fn wait_playing(&self, track_id: u64) -> PlaybackSnapshot {
        self.wait_for(|s| {
            s.state == core_playback::PlayerState::Playing
                && s.track.as_ref().map(|t| t.id.get()) == Some(track_id)
        })
        .await
    }

    /// Deliver an engine report and wait until the synchronizer applied it.
    pub async fn engine_event(&self, event: bridge_traits::playback::EngineEvent) {
        self.engine_tx.send(event).expect("synchronizer dropped engine events");
        self.player.sync().await.expect("synchronizer running");
    }
}

/// Poll `condition` until it holds. Not for paused-clock tests.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

/// Everything currently buffered on an event subscription
pub fn drain(
    rx: &mut tokio::sync::broadcast::Receiver<core_runtime::events::CoreEvent>,
) -> Vec<core_runtime::events::CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
