//! # Side Effects
//!
//! Lock-screen notification and wake-lock updates run on their own task so a
//! slow or failing host service never blocks the playback state machine.
//! Failures are logged and dropped.

use bridge_traits::media::{MediaNotifier, NotificationContent, WakeLock};
use core_library::models::Track;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Notification content for `track`
pub fn notification_for(track: &Track, is_playing: bool) -> NotificationContent {
    NotificationContent {
        track_id: track.id.get(),
        title: track.title.clone(),
        artist: track.artist.clone(),
        artwork_url: track.artwork_url().map(str::to_string),
        is_playing,
    }
}

enum SideEffect {
    Initialize,
    Playing(NotificationContent),
    Paused(NotificationContent),
    Teardown,
    Flush(oneshot::Sender<()>),
}

/// Sender half of the side-effect worker
#[derive(Clone)]
pub struct SideEffects {
    tx: mpsc::UnboundedSender<SideEffect>,
}

impl SideEffects {
    /// Spawn the worker on the current runtime.
    pub fn spawn(notifier: Arc<dyn MediaNotifier>, wake_lock: Arc<dyn WakeLock>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = SideEffectWorker {
            notifier,
            wake_lock,
            wake_lock_held: false,
            notification_visible: false,
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { tx }, handle)
    }

    /// Host notification setup (permissions, channels)
    pub fn initialize(&self) {
        self.send(SideEffect::Initialize);
    }

    /// Hold the wake-lock and show the playing notification
    pub fn playing(&self, track: &Track) {
        self.send(SideEffect::Playing(notification_for(track, true)));
    }

    /// Release the wake-lock and show the paused notification
    pub fn paused(&self, track: &Track) {
        self.send(SideEffect::Paused(notification_for(track, false)));
    }

    /// Release the wake-lock and hide the notification. Idempotent.
    pub fn teardown(&self) {
        self.send(SideEffect::Teardown);
    }

    /// Wait until everything queued so far has been applied
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(SideEffect::Flush(tx));
        let _ = rx.await;
    }

    fn send(&self, effect: SideEffect) {
        if self.tx.send(effect).is_err() {
            debug!("Side-effect worker stopped, dropping update");
        }
    }
}

struct SideEffectWorker {
    notifier: Arc<dyn MediaNotifier>,
    wake_lock: Arc<dyn WakeLock>,
    wake_lock_held: bool,
    notification_visible: bool,
}

impl SideEffectWorker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SideEffect>) {
        while let Some(effect) = rx.recv().await {
            match effect {
                SideEffect::Initialize => {
                    if let Err(e) = self.notifier.initialize().await {
                        warn!(error = %e, "Media notifier initialization failed");
                    }
                }
                SideEffect::Playing(content) => {
                    self.acquire_wake_lock().await;
                    self.show(content).await;
                }
                SideEffect::Paused(content) => {
                    self.release_wake_lock().await;
                    self.show(content).await;
                }
                SideEffect::Teardown => {
                    self.release_wake_lock().await;
                    self.hide().await;
                }
                SideEffect::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Side-effect worker finished");
    }

    async fn acquire_wake_lock(&mut self) {
        if self.wake_lock_held {
            return;
        }
        match self.wake_lock.activate().await {
            Ok(()) => self.wake_lock_held = true,
            Err(e) => warn!(error = %e, "Failed to acquire wake-lock"),
        }
    }

    async fn release_wake_lock(&mut self) {
        if !self.wake_lock_held {
            return;
        }
        // Treated as released even on failure; the next play re-acquires
        self.wake_lock_held = false;
        if let Err(e) = self.wake_lock.deactivate().await {
            warn!(error = %e, "Failed to release wake-lock");
        }
    }

    async fn show(&mut self, content: NotificationContent) {
        match self.notifier.show_or_update(content).await {
            Ok(()) => self.notification_visible = true,
            Err(e) => warn!(error = %e, "Failed to update media notification"),
        }
    }

    async fn hide(&mut self) {
        if !self.notification_visible {
            return;
        }
        self.notification_visible = false;
        if let Err(e) = self.notifier.hide().await {
            warn!(error = %e, "Failed to hide media notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail_wake_lock: bool,
    }

    #[async_trait]
    impl MediaNotifier for Recorder {
        async fn show_or_update(&self, content: NotificationContent) -> Result<()> {
            self.calls.lock().push(format!("show:{}", content.is_playing));
            Ok(())
        }

        async fn hide(&self) -> Result<()> {
            self.calls.lock().push("hide".into());
            Ok(())
        }
    }

    #[async_trait]
    impl WakeLock for Recorder {
        async fn activate(&self) -> Result<()> {
            self.calls.lock().push("wake:on".into());
            if self.fail_wake_lock {
                return Err(BridgeError::NotAvailable("wake-lock".into()));
            }
            Ok(())
        }

        async fn deactivate(&self) -> Result<()> {
            self.calls.lock().push("wake:off".into());
            Ok(())
        }
    }

    fn track() -> Track {
        Track::new(1u64, "Teardrop", "Massive Attack")
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let recorder = Arc::new(Recorder::default());
        let (effects, _worker) = SideEffects::spawn(recorder.clone(), recorder.clone());

        effects.playing(&track());
        effects.playing(&track());
        effects.teardown();
        effects.teardown();
        effects.flush().await;

        assert_eq!(
            *recorder.calls.lock(),
            vec!["wake:on", "show:true", "show:true", "wake:off", "hide"]
        );
    }

    #[tokio::test]
    async fn test_wake_lock_failure_does_not_block_notification() {
        let recorder = Arc::new(Recorder {
            fail_wake_lock: true,
            ..Default::default()
        });
        let (effects, _worker) = SideEffects::spawn(recorder.clone(), recorder.clone());

        effects.playing(&track());
        effects.paused(&track());
        effects.flush().await;

        // Nothing was acquired, so nothing is released
        assert_eq!(
            *recorder.calls.lock(),
            vec!["wake:on", "show:true", "show:false"]
        );
    }

    #[test]
    fn test_notification_content() {
        let content = notification_for(&track(), false);
        assert_eq!(content.track_id, 1);
        assert_eq!(content.body(), "Paused • Massive Attack");
        assert_eq!(content.artwork_url, None);
    }
}
