//! # Offline Downloads
//!
//! Saves a track's audio into the host data directory and records it in the
//! [`OfflineIndex`], after which the resolver plays the local copy.
//!
//! Only one download runs at a time; a second request while one is in
//! progress is rejected with [`PlaybackError::DownloadInProgress`].

use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::FileSystemAccess;
use core_library::models::{Track, TrackId};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_runtime::logging::{redact_if_sensitive, strip_path};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::resolver::OfflineResolver;

/// Default timeout for fetching a track's audio
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Progress of the running download, reported to the caller's callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub track_id: TrackId,

    /// Expected size, from `Content-Length` when the server sends it
    pub total_bytes: Option<u64>,

    /// Bytes received so far
    pub downloaded_bytes: u64,

    /// 0-100
    pub progress_percent: u8,
}

impl DownloadProgress {
    fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            total_bytes: None,
            downloaded_bytes: 0,
            progress_percent: 0,
        }
    }

    fn update(&mut self, downloaded_bytes: u64) {
        self.downloaded_bytes = downloaded_bytes;
        let total = self.total_bytes.unwrap_or(downloaded_bytes);
        if total > 0 {
            let percent = (downloaded_bytes as f64 / total as f64) * 100.0;
            self.progress_percent = percent.min(100.0) as u8;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress_percent >= 100
    }
}

/// File name for a downloaded track: `{title}_{artist}.mp3`.
///
/// Everything but ASCII letters, digits and whitespace is dropped. Falls back
/// to `track_{id}.mp3` when nothing is left of either name.
pub fn offline_file_name(track: &Track) -> String {
    fn clean(value: &str) -> String {
        value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
            .collect()
    }

    let title = clean(&track.title);
    let artist = clean(&track.artist);
    if title.trim().is_empty() && artist.trim().is_empty() {
        return format!("track_{}.mp3", track.id);
    }
    format!("{}_{}.mp3", title, artist)
}

/// Clears the active slot when the download ends, however it ends.
struct ActiveDownload<'a> {
    slot: &'a Mutex<Option<TrackId>>,
}

impl Drop for ActiveDownload<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// Downloads tracks for offline playback
pub struct TrackDownloader {
    http_client: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    resolver: Arc<OfflineResolver>,
    active: Mutex<Option<TrackId>>,
    events: Option<EventBus>,
    timeout: Duration,
}

impl TrackDownloader {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        resolver: Arc<OfflineResolver>,
    ) -> Self {
        Self {
            http_client,
            fs,
            resolver,
            active: Mutex::new(None),
            events: None,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Track currently being downloaded
    pub fn active_download(&self) -> Option<TrackId> {
        *self.active.lock()
    }

    pub fn is_downloading(&self) -> bool {
        self.active_download().is_some()
    }

    /// Download `track` into the data directory and index it.
    ///
    /// `on_progress` sees 0% once the download starts and 100% once the
    /// audio has arrived. Returns the saved file's path.
    #[instrument(skip(self, track, on_progress), fields(track_id = %track.id))]
    pub async fn download_track<F>(&self, track: &Track, mut on_progress: F) -> Result<PathBuf>
    where
        F: FnMut(&DownloadProgress) + Send,
    {
        let _active = self.claim(track.id)?;
        info!(title = %track.title, "Starting download");

        match self.fetch_and_save(track, &mut on_progress).await {
            Ok((path, bytes)) => {
                let file = path.to_string_lossy();
                info!(bytes, file = %strip_path(&file), "Track saved for offline playback");
                self.emit(LibraryEvent::DownloadCompleted {
                    track_id: track.id.get(),
                    bytes,
                });
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, "Download failed");
                self.emit(LibraryEvent::DownloadFailed {
                    track_id: track.id.get(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn claim(&self, track_id: TrackId) -> Result<ActiveDownload<'_>> {
        let mut slot = self.active.lock();
        if let Some(running) = *slot {
            debug!(running = %running, requested = %track_id, "Download already in progress");
            return Err(PlaybackError::DownloadInProgress(running.get()));
        }
        *slot = Some(track_id);
        Ok(ActiveDownload { slot: &self.active })
    }

    async fn fetch_and_save<F>(&self, track: &Track, on_progress: &mut F) -> Result<(PathBuf, u64)>
    where
        F: FnMut(&DownloadProgress) + Send,
    {
        let mut progress = DownloadProgress::new(track.id);
        on_progress(&progress);

        let url = self.resolver.catalog().stream_url(track.id).await?;
        debug!(url = %redact_if_sensitive("stream_url", &url), "Fetching audio");

        let request = HttpRequest::get(url).timeout(self.timeout);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| PlaybackError::Download(e.to_string()))?;
        if !response.is_success() {
            return Err(PlaybackError::Download(format!("HTTP {}", response.status)));
        }
        if response.body.is_empty() {
            return Err(PlaybackError::Download("empty response body".to_string()));
        }

        let received = response.body.len() as u64;
        progress.total_bytes = content_length(&response);
        if let Some(expected) = progress.total_bytes {
            if expected != received {
                return Err(PlaybackError::Download(format!(
                    "expected {} bytes, received {}",
                    expected, received
                )));
            }
        }
        progress.update(received);
        on_progress(&progress);

        let path = self
            .fs
            .get_data_directory()
            .await?
            .join(offline_file_name(track));
        self.fs.write_file(&path, response.body).await?;
        self.resolver.index().record(track.id, &path).await?;

        Ok((path, received))
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(events) = &self.events {
            let _ = events.emit(CoreEvent::Library(event));
        }
    }
}

fn content_length(response: &HttpResponse) -> Option<u64> {
    response
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
