//! Media session side effects: lock-screen notification and wake-lock.
//!
//! Both are best-effort. The core logs and absorbs every error returned from
//! these traits; implementations should still report failures honestly so
//! they show up in diagnostics.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content rendered in the media notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub track_id: u64,
    pub title: String,
    pub artist: String,
    pub artwork_url: Option<String>,
    pub is_playing: bool,
}

impl NotificationContent {
    /// Secondary line, e.g. `"Playing • Daft Punk"`.
    pub fn body(&self) -> String {
        let state = if self.is_playing { "Playing" } else { "Paused" };
        format!("{} • {}", state, self.artist)
    }
}

/// Buttons exposed by the media notification / lock screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaAction {
    PlayPause,
    Next,
    Previous,
    Close,
}

impl MediaAction {
    /// Map a host action identifier (`"play_pause"`, `"next"`, ...) to an action.
    pub fn from_identifier(id: &str) -> Option<Self> {
        match id {
            "play_pause" => Some(MediaAction::PlayPause),
            "next" => Some(MediaAction::Next),
            "previous" => Some(MediaAction::Previous),
            "close" => Some(MediaAction::Close),
            _ => None,
        }
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            MediaAction::PlayPause => "play_pause",
            MediaAction::Next => "next",
            MediaAction::Previous => "previous",
            MediaAction::Close => "close",
        }
    }
}

/// Lock-screen / notification-shade media controls.
#[async_trait]
pub trait MediaNotifier: Send + Sync {
    /// Request permissions and register action categories. Called once.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Show the notification, or update it in place if already visible.
    async fn show_or_update(&self, content: NotificationContent) -> Result<()>;

    /// Dismiss the notification. Hiding an absent notification is a no-op.
    async fn hide(&self) -> Result<()>;
}

/// Keeps the device awake during playback.
#[async_trait]
pub trait WakeLock: Send + Sync {
    async fn activate(&self) -> Result<()>;

    async fn deactivate(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_reflects_playing_state() {
        let mut content = NotificationContent {
            track_id: 1,
            title: "One More Time".into(),
            artist: "Daft Punk".into(),
            artwork_url: None,
            is_playing: true,
        };
        assert_eq!(content.body(), "Playing • Daft Punk");

        content.is_playing = false;
        assert_eq!(content.body(), "Paused • Daft Punk");
    }

    #[test]
    fn action_identifiers_match_host_categories() {
        for action in [
            MediaAction::PlayPause,
            MediaAction::Next,
            MediaAction::Previous,
            MediaAction::Close,
        ] {
            assert_eq!(MediaAction::from_identifier(action.identifier()), Some(action));
        }
        assert_eq!(MediaAction::from_identifier("dismiss"), None);
    }
}
