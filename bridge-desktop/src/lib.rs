//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux), used by the `desktop-shims` feature and by
//! development builds of the player.
//!
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `FileSystemAccess` using `tokio::fs`
//! - `HttpClient` using `reqwest`
//! - `MediaNotifier` / `WakeLock` as logging stand-ins
//!
//! The audio engine is always host-provided.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = SqliteSettingsStore::new("settings.db".into()).await?;
//!     let http = ReqwestHttpClient::new();
//!     let fs = TokioFileSystem::new();
//!     // Hand to CoreConfig::builder()
//! }
//! ```

mod filesystem;
mod http;
mod media;
mod settings;

pub use filesystem::{default_data_dir, TokioFileSystem};
pub use http::ReqwestHttpClient;
pub use media::{DesktopMediaSession, DesktopWakeLock};
pub use settings::SqliteSettingsStore;
