//! OpenSpot API response types

use core_library::models::Track;
use serde::Deserialize;

/// `/search` response
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub tracks: Vec<Track>,

    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub offset: Option<u32>,

    #[serde(default)]
    pub total: Option<u64>,

    #[serde(default)]
    pub has_more: bool,
}

/// `/stream` response
#[derive(Debug, Deserialize)]
pub struct StreamResponse {
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_tolerates_missing_pagination() {
        let response: SearchResponse = serde_json::from_str(r#"{"tracks": []}"#).unwrap();
        assert!(response.tracks.is_empty());
        assert!(!response.pagination.has_more);
    }

    #[test]
    fn test_search_response_parses_track_shape() {
        let body = r#"{
            "tracks": [{
                "id": 12,
                "title": "Roygbiv",
                "artist": "Boards of Canada",
                "albumTitle": "Music Has the Right to Children",
                "duration": 151,
                "images": {"small": "s.jpg", "thumbnail": "t.jpg", "large": "l.jpg"},
                "streamable": true,
                "audioQuality": {"maximumBitDepth": 24, "maximumSamplingRate": 96000.0, "isHiRes": true}
            }],
            "pagination": {"offset": 0, "total": 1, "hasMore": false}
        }"#;

        let response: SearchResponse = serde_json::from_str(body).unwrap();
        let track = &response.tracks[0];
        assert_eq!(track.id.get(), 12);
        assert_eq!(track.duration, 151);
        assert_eq!(track.quality_badge(), Some("Hi-Res"));
        assert_eq!(response.pagination.total, Some(1));
    }
}
