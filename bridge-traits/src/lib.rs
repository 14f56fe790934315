//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the playback core and the
//! platform-specific media primitives it drives. Each trait represents a
//! capability that the core requires but that must be implemented differently
//! per platform (desktop, iOS, Android, web).
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaEngine`](media::MediaEngine) - One concrete audio or video playback primitive
//! - [`EngineEventSink`](media::EngineEventSink) - Receiver for raw engine notifications
//! - [`ManifestClient`](streaming::ManifestClient) - HLS/DASH level ladder and level pinning
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Capability       | Required | Notes |
//! |------------------|----------|-------|
//! | Audio engine     | Yes      | Every episode has an audio source |
//! | Video engine     | No       | Supplied per surface when a video surface mounts |
//! | Manifest client  | No       | Only for video engines that play adaptive streams |
//! | Clock            | No       | Defaults to [`SystemClock`](time::SystemClock) |
//! | Logger sink      | No       | Logs stay in `tracing` when absent |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let audio_engine = builder.audio_engine.ok_or_else(|| Error::CapabilityMissing {
//!     capability: "MediaEngine(audio)".to_string(),
//!     message: "No audio engine provided. Inject the host's audio element adapter."
//!         .to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report autoplay refusals as [`BridgeError::AutoplayBlocked`] rather than
//!   failing silently
//! - Avoid placing signed media URLs in error messages
//!
//! ## Thread Safety
//!
//! On native targets all bridge traits require `Send + Sync` (via
//! [`PlatformSendSync`](platform::PlatformSendSync)). On `wasm32` the bounds
//! are relaxed so DOM handles can be wrapped directly.
//!
//! ## Examples
//!
//! ### Implementing MediaEngine
//!
//! ```ignore
//! use bridge_traits::media::{EngineEventSink, MediaEngine, MediaKind, MediaSource};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct HtmlAudioEngine {
//!     element: web_sys::HtmlAudioElement,
//! }
//!
//! #[async_trait(?Send)]
//! impl MediaEngine for HtmlAudioEngine {
//!     fn kind(&self) -> MediaKind {
//!         MediaKind::Audio
//!     }
//!
//!     async fn load(&self, source: MediaSource, start: std::time::Duration) -> Result<()> {
//!         self.element.set_src(&source.url);
//!         self.element.set_current_time(start.as_secs_f64());
//!         Ok(())
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod media;
pub mod platform;
pub mod streaming;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use media::{EngineErrorKind, EngineEvent, EngineEventSink, MediaEngine, MediaKind, MediaSource};
pub use platform::PlatformSendSync;
pub use streaming::{ManifestClient, ManifestLevel};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
