//! # Library Module
//!
//! Catalog-facing domain model for the player.
//!
//! ## Overview
//!
//! - [`models`]: `Track`, `TrackId`, artwork and quality helpers, search pages
//! - [`catalog`]: the `TrackCatalog` contract implemented by remote providers
//! - [`liked`]: the persisted liked-songs collection

pub mod catalog;
pub mod error;
pub mod liked;
pub mod models;

pub use catalog::{CatalogError, CatalogResult, TrackCatalog};
pub use error::{LibraryError, Result};
pub use liked::{LikedSong, LikedSongs};
pub use models::{
    format_duration, format_position, AudioQuality, SearchPage, Track, TrackId, TrackImages,
};
