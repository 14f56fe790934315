//! Workspace umbrella crate.
//!
//! This crate exposes the playback core through a single dependency. Host
//! applications can depend on `podcast-core-workspace` with the default
//! `service` feature instead of wiring `core-service`, `core-playback` and
//! `bridge-traits` individually.

#[cfg(feature = "service")]
pub use core_service::*;
