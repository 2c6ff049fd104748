//! Workspace placeholder crate.
//!
//! Exposes the player core through one dependency: enable `desktop-shims`
//! (the default) to get [`core_service`] wired to the desktop bridges.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
