//! Desktop media session stand-ins
//!
//! Desktops have no lock-screen notification or screen wake-lock the core
//! can reach portably, so these implementations record state and log it.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    media::{MediaNotifier, NotificationContent, WakeLock},
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Media notifier that logs what a mobile host would render
#[derive(Default)]
pub struct DesktopMediaSession {
    current: Mutex<Option<NotificationContent>>,
}

impl DesktopMediaSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content currently "shown", if any
    pub fn current(&self) -> Option<NotificationContent> {
        self.current.lock().clone()
    }
}

#[async_trait]
impl MediaNotifier for DesktopMediaSession {
    async fn initialize(&self) -> Result<()> {
        info!("Desktop media session ready");
        Ok(())
    }

    async fn show_or_update(&self, content: NotificationContent) -> Result<()> {
        debug!(
            track_id = content.track_id,
            title = %content.title,
            body = %content.body(),
            "Now playing"
        );
        *self.current.lock() = Some(content);
        Ok(())
    }

    async fn hide(&self) -> Result<()> {
        if self.current.lock().take().is_some() {
            debug!("Now playing cleared");
        }
        Ok(())
    }
}

/// In-process wake-lock flag
#[derive(Default)]
pub struct DesktopWakeLock {
    active: AtomicBool,
}

impl DesktopWakeLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WakeLock for DesktopWakeLock {
    async fn activate(&self) -> Result<()> {
        if !self.active.swap(true, Ordering::SeqCst) {
            debug!("Wake lock activated");
        }
        Ok(())
    }

    async fn deactivate(&self) -> Result<()> {
        if self.active.swap(false, Ordering::SeqCst) {
            debug!("Wake lock released");
        }
        Ok(())
    }
}
