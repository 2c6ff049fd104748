//! End-to-end service tests: HTTP catalog mocked, host bridges faked

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::media::{MediaNotifier, NotificationContent, WakeLock};
use bridge_traits::playback::{engine_event_channel, AudioEngine, AudioSource};
use bridge_traits::storage::{FileSystemAccess, SettingsStore};
use bytes::Bytes;
use core_library::models::{Track, TrackId};
use core_playback::{PlaybackError, PlaybackSnapshot, PlayerState};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, LibraryEvent};
use core_service::{CoreError, HostBridges, PlayerService, SearchOutcome};
use mockall::mock;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

fn respond(status: u16, body: String) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from(body),
    }
}

fn track_json(id: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "title": format!("Song {}", id),
        "artist": "Band",
        "duration": 200,
        "images": {"small": "s", "thumbnail": "t", "large": format!("https://img.test/{}.jpg", id)},
        "streamable": true
    })
}

/// Every search answers with 12 tracks; stream URLs point at the test CDN,
/// which serves audio for every id but 13
fn catalog_http() -> MockHttpClient {
    let mut http = MockHttpClient::new();
    http.expect_execute().returning(|req| {
        if req.url.starts_with("https://cdn.test/") {
            if req.url.ends_with("/13.mp3") {
                return Ok(respond(500, String::new()));
            }
            return Ok(respond(200, "ID3 audio frames".to_string()));
        }
        if let Some(id) = req.url.split("trackId=").nth(1) {
            let body = serde_json::json!({ "url": format!("https://cdn.test/{}.mp3", id) });
            return Ok(respond(200, body.to_string()));
        }
        if req.url.contains("/search?") {
            let tracks: Vec<_> = (1..=12).map(track_json).collect();
            let body = serde_json::json!({
                "tracks": tracks,
                "pagination": {"offset": 0, "total": 12, "hasMore": false}
            });
            return Ok(respond(200, body.to_string()));
        }
        Ok(respond(404, String::new()))
    });
    http
}

#[derive(Default)]
struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
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

#[derive(Default)]
struct FakeFs {
    files: Mutex<HashSet<PathBuf>>,
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
        self.files.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn write_file(&self, path: &Path, _data: Bytes) -> BridgeResult<()> {
        self.files.lock().insert(path.to_path_buf());
        Ok(())
    }
}

#[derive(Default)]
struct FakeEngine {
    loads: Mutex<Vec<AudioSource>>,
    playing: AtomicBool,
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn load(&self, source: AudioSource) -> BridgeResult<()> {
        self.loads.lock().push(source);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn seek(&self, _position_ms: u64) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_volume(&self, _volume: f32) -> BridgeResult<()> {
        Ok(())
    }
}

/// Notifier and wake-lock that refuse everything, as a host without
/// notification permission would
struct DeniedHost;

#[async_trait]
impl MediaNotifier for DeniedHost {
    async fn show_or_update(&self, _content: NotificationContent) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("notifications".into()))
    }

    async fn hide(&self) -> BridgeResult<()> {
        Ok(())
    }
}

#[async_trait]
impl WakeLock for DeniedHost {
    async fn activate(&self) -> BridgeResult<()> {
        Err(BridgeError::NotAvailable("wake-lock".into()))
    }

    async fn deactivate(&self) -> BridgeResult<()> {
        Ok(())
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    fs: Arc<FakeFs>,
    engine: Arc<FakeEngine>,
    service: PlayerService,
}

async fn start_with(store: Arc<MemoryStore>) -> Fixture {
    let fs = Arc::new(FakeFs::default());
    let engine = Arc::new(FakeEngine::default());
    let config = CoreConfig::builder()
        .api_base_url("https://api.test")
        .settings_store(store.clone())
        .http_client(Arc::new(catalog_http()))
        .file_system(fs.clone())
        .build()
        .unwrap();
    // The engine never reports; tests drive it through the service
    let (_engine_tx, engine_rx) = engine_event_channel();
    let host = Arc::new(DeniedHost);
    let bridges = HostBridges::new(engine.clone(), engine_rx, host.clone(), host);

    let service = PlayerService::bootstrap(config, bridges).await.unwrap();
    Fixture {
        store,
        fs,
        engine,
        service,
    }
}

async fn start() -> Fixture {
    start_with(Arc::new(MemoryStore::default())).await
}

async fn wait_for(service: &PlayerService, condition: impl FnMut(&PlaybackSnapshot) -> bool) -> PlaybackSnapshot {
    let mut rx = service.subscribe_playback();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(condition))
        .await
        .expect("timed out waiting for playback state")
        .expect("synchronizer stopped");
    snapshot.clone()
}

fn playing(id: u64) -> impl FnMut(&PlaybackSnapshot) -> bool {
    move |s| s.state == PlayerState::Playing && s.track.as_ref().map(|t| t.id.get()) == Some(id)
}

#[tokio::test]
async fn test_shelf_to_playback_through_http_catalog() {
    let f = start().await;

    let popular = f.service.popular().await;
    assert_eq!(popular.len(), 10);
    assert_eq!(popular[0].artwork_url(), Some("https://img.test/1.jpg"));

    f.service.play_tracks(popular, 2).await.unwrap();
    wait_for(&f.service, playing(3)).await;

    assert_eq!(
        *f.engine.loads.lock(),
        vec![AudioSource::remote("https://cdn.test/3.mp3")]
    );
    assert!(f.engine.playing.load(Ordering::SeqCst));
    assert_eq!(f.service.queue().len(), 10);
}

#[tokio::test]
async fn test_selecting_current_track_toggles_playback() {
    let f = start().await;
    let track = Track::new(5u64, "Five", "Band");

    f.service.play_track(track.clone()).await.unwrap();
    wait_for(&f.service, playing(5)).await;

    f.service.play_track(track.clone()).await.unwrap();
    let snapshot = f.service.snapshot();
    assert_eq!(snapshot.state, PlayerState::Paused);
    assert!(!snapshot.is_playing);

    f.service.play_track(track).await.unwrap();
    assert_eq!(f.service.snapshot().state, PlayerState::Playing);
    assert_eq!(f.engine.loads.lock().len(), 1);
}

#[tokio::test]
async fn test_media_action_identifiers() {
    let f = start().await;
    f.service
        .play_tracks(vec![Track::new(1u64, "A", "X"), Track::new(2u64, "B", "X")], 0)
        .await
        .unwrap();
    wait_for(&f.service, playing(1)).await;

    f.service.handle_media_action("next").await.unwrap();
    wait_for(&f.service, playing(2)).await;

    f.service.handle_media_action("shuffle_everything").await.unwrap();
    f.service.handle_media_action("play_pause").await.unwrap();
    assert_eq!(f.service.snapshot().state, PlayerState::Paused);
}

#[tokio::test]
async fn test_offline_file_is_played_after_recording() {
    let f = start().await;
    let path = PathBuf::from("/data/offline/9.mp3");
    f.fs.files.lock().insert(path.clone());

    f.service.record_offline(TrackId(9), &path).await.unwrap();
    assert!(f.service.is_available_offline(TrackId(9)).await);
    assert_eq!(
        f.store.values.lock().get("offline_9").map(String::as_str),
        Some(r#"{"fileUri":"file:///data/offline/9.mp3"}"#)
    );

    f.service.play_track(Track::new(9u64, "Nine", "Band")).await.unwrap();
    wait_for(&f.service, playing(9)).await;
    assert_eq!(*f.engine.loads.lock(), vec![AudioSource::local(path)]);

    f.service.forget_offline(TrackId(9)).await.unwrap();
    assert!(!f.service.is_available_offline(TrackId(9)).await);
}

#[tokio::test]
async fn test_download_pauses_then_plays_from_disk() {
    let f = start().await;
    f.service.play_track(Track::new(5u64, "Five", "Band")).await.unwrap();
    wait_for(&f.service, playing(5)).await;

    let six = Track::new(6u64, "Six!", "The Band");
    let mut percents = Vec::new();
    let path = f
        .service
        .download_track(&six, |p| percents.push(p.progress_percent))
        .await
        .unwrap();

    assert_eq!(path, PathBuf::from("/data/Six_The Band.mp3"));
    assert_eq!(percents, vec![0, 100]);
    let snapshot = f.service.snapshot();
    assert_eq!(snapshot.state, PlayerState::Paused);
    assert!(!snapshot.is_playing);
    assert!(f.service.is_available_offline(TrackId(6)).await);
    assert_eq!(f.service.active_download(), None);

    f.service.play_track(six).await.unwrap();
    wait_for(&f.service, playing(6)).await;
    assert_eq!(
        f.engine.loads.lock().last(),
        Some(&AudioSource::local("/data/Six_The Band.mp3"))
    );
}

#[tokio::test]
async fn test_failed_download_is_reported() {
    let f = start().await;
    let mut events = f.service.subscribe_events();

    let err = f
        .service
        .download_track(&Track::new(13u64, "Unlucky", "Band"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::Playback(PlaybackError::Download(_))
    ));
    assert!(!f.service.is_available_offline(TrackId(13)).await);
    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Library(event @ LibraryEvent::DownloadFailed { .. }) = event {
            failed = Some(event);
        }
    }
    assert_eq!(
        failed,
        Some(LibraryEvent::DownloadFailed {
            track_id: 13,
            message: "Download failed: HTTP 500".to_string(),
        })
    );
}

#[tokio::test]
async fn test_likes_persist_across_restarts() {
    let f = start().await;
    let mut events = f.service.subscribe_events();
    let track = Track::new(4u64, "Four", "Band");

    assert!(f.service.toggle_like(&track).await);
    assert!(f.service.is_liked(TrackId(4)));
    let mut liked_event = None;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Library(event) = event {
            liked_event = Some(event);
        }
    }
    assert!(matches!(
        liked_event,
        Some(LibraryEvent::SongLiked { track_id: 4, .. })
    ));

    f.service.shutdown().await.unwrap();
    let restarted = start_with(f.store.clone()).await;
    assert_eq!(restarted.service.liked_songs().len(), 1);
    assert!(restarted.service.is_liked(TrackId(4)));

    restarted.service.play_liked(0).await.unwrap();
    wait_for(&restarted.service, playing(4)).await;
}

#[tokio::test]
async fn test_queue_is_restored_paused_on_bootstrap() {
    let f = start().await;
    f.service
        .play_tracks(vec![Track::new(1u64, "A", "X"), Track::new(2u64, "B", "X")], 1)
        .await
        .unwrap();
    wait_for(&f.service, playing(2)).await;
    f.service.shutdown().await.unwrap();

    let restarted = start_with(f.store.clone()).await;
    let snapshot = wait_for(&restarted.service, |s| s.state == PlayerState::Ready).await;
    assert_eq!(snapshot.track.map(|t| t.id.get()), Some(2));
    assert!(!snapshot.is_playing);
    assert!(!restarted.engine.playing.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_search_session_uses_catalog() {
    let f = start().await;
    let session = f.service.search_session();

    assert_eq!(session.search("band").await.unwrap(), SearchOutcome::Completed);
    let state = session.state();
    assert_eq!(state.results.len(), 12);
    assert!(!state.has_more);
    assert_eq!(session.load_more().await.unwrap(), SearchOutcome::Skipped);
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_final() {
    let f = start().await;

    f.service.shutdown().await.unwrap();
    f.service.shutdown().await.unwrap();

    assert!(matches!(
        f.service.set_playing(true).await,
        Err(CoreError::Playback(PlaybackError::ChannelClosed))
    ));
}

#[tokio::test]
async fn test_out_of_range_start_is_rejected() {
    let f = start().await;

    let err = f
        .service
        .play_tracks(vec![Track::new(1u64, "A", "X")], 3)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Playback(PlaybackError::InvalidNavigation(_))
    ));
    assert!(f.service.queue().is_empty());
}
