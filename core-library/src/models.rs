//! Domain models for the catalog client
//!
//! Tracks arrive from the catalog API as camelCase JSON and are kept by value
//! everywhere (queue, liked songs, persisted snapshots). They are never
//! mutated after creation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{LibraryError, Result};

// =============================================================================
// ID Types
// =============================================================================

/// Catalog identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Artwork variants served by the catalog. Any of them may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackImages {
    #[serde(default)]
    pub small: String,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub large: String,
    #[serde(default)]
    pub back: Option<String>,
}

impl TrackImages {
    /// Best artwork for display: large, else small, else thumbnail
    pub fn optimal(&self) -> Option<&str> {
        [&self.large, &self.small, &self.thumbnail]
            .into_iter()
            .map(String::as_str)
            .find(|url| !url.is_empty())
    }
}

/// Source quality reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioQuality {
    pub maximum_bit_depth: u32,
    #[serde(default)]
    pub maximum_sampling_rate: Option<f64>,
    #[serde(default)]
    pub is_hi_res: bool,
}

impl Default for AudioQuality {
    fn default() -> Self {
        Self {
            maximum_bit_depth: 16,
            maximum_sampling_rate: Some(44_100.0),
            is_hi_res: false,
        }
    }
}

/// A playable catalog track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_title: Option<String>,
    /// Duration in seconds; 0 when unknown
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub images: TrackImages,
    #[serde(default = "default_streamable")]
    pub streamable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_quality: Option<AudioQuality>,
}

fn default_streamable() -> bool {
    true
}

impl Track {
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album_title: None,
            duration: 0,
            images: TrackImages::default(),
            streamable: true,
            audio_quality: None,
        }
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_album(mut self, album_title: impl Into<String>) -> Self {
        self.album_title = Some(album_title.into());
        self
    }

    pub fn with_images(mut self, images: TrackImages) -> Self {
        self.images = images;
        self
    }

    pub fn with_audio_quality(mut self, quality: AudioQuality) -> Self {
        self.audio_quality = Some(quality);
        self
    }

    /// Reject tracks the player can't do anything useful with
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "title".to_string(),
                message: format!("track {} has an empty title", self.id),
            });
        }
        if !self.streamable {
            return Err(LibraryError::InvalidInput {
                field: "streamable".to_string(),
                message: format!("track {} is not streamable", self.id),
            });
        }
        Ok(())
    }

    pub fn is_high_quality(&self) -> bool {
        self.audio_quality
            .as_ref()
            .map_or(false, |q| q.is_hi_res || q.maximum_bit_depth >= 24)
    }

    /// Badge shown next to the title: `Hi-Res`, `HD` or nothing
    pub fn quality_badge(&self) -> Option<&'static str> {
        let quality = self.audio_quality.as_ref()?;
        if quality.is_hi_res {
            Some("Hi-Res")
        } else if quality.maximum_bit_depth >= 24 {
            Some("HD")
        } else {
            None
        }
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.images.optimal()
    }

    pub fn duration_label(&self) -> String {
        format_duration(u64::from(self.duration))
    }
}

/// One page of search results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    pub tracks: Vec<Track>,
    pub has_more: bool,
    /// Offset this page was requested at
    pub offset: u32,
    pub total: Option<u64>,
}

impl SearchPage {
    /// Offset to request the following page at
    pub fn next_offset(&self) -> u32 {
        self.offset + self.tracks.len() as u32
    }
}

// =============================================================================
// Presentation helpers
// =============================================================================

/// `m:ss` for a duration in seconds, e.g. `3:07`
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// `m:ss` for a playback position in milliseconds
pub fn format_position(millis: u64) -> String {
    format_duration(millis / 1000)
}
