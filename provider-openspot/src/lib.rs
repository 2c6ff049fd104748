//! # OpenSpot Catalog Provider
//!
//! Implements `TrackCatalog` against the OpenSpot HTTP API.
//!
//! ## Overview
//!
//! - `GET {base}/search?q=..&offset=..&type=track` returns a page of tracks
//! - `GET {base}/stream?trackId=..` returns a short-lived stream URL
//!
//! Requests go through the injected `HttpClient` bridge. Failures are mapped
//! onto `CatalogError` and surfaced as-is; this crate never retries.

pub mod connector;
pub mod types;

pub use connector::OpenSpotCatalog;
