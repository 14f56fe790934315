//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the host bridges and ambient settings the core needs.
//! It enforces fail-fast validation so a host that forgot to inject a required
//! bridge finds out at startup rather than on the first `play()`.
//!
//! ## Required Dependencies
//!
//! - `MediaEngine` (audio) - Every episode has an audio source
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `Clock` - Defaults to [`SystemClock`]
//! - `ManifestClient` - Fallback streaming client for video engines that do not
//!   carry their own
//! - `LoggerSink` - Host log forwarding
//!
//! Video engines are not part of the configuration: each Full Player or Mini
//! Player surface brings its own when it mounts.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .audio_engine(Arc::new(MyAudioEngine::new()))
//!     .event_buffer_size(256)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: no audio engine injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing audio engine");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use bridge_traits::{
    media::{MediaEngine, MediaKind},
    streaming::ManifestClient,
    time::{Clock, LoggerSink, SystemClock},
};
use std::sync::Arc;

/// Upper bound for the event bus buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Engine rendering the audio enclosure of every episode
    pub audio_engine: Arc<dyn MediaEngine>,

    /// Time source for rate limiting and position aging
    pub clock: Arc<dyn Clock>,

    /// Streaming client used when a video engine has none of its own
    pub manifest_client: Option<Arc<dyn ManifestClient>>,

    /// Host log forwarding
    pub logger_sink: Option<Arc<dyn LoggerSink>>,

    /// Installs a global subscriber at bootstrap when set
    pub logging: Option<LoggingConfig>,

    /// Per-subscriber event bus buffer
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("audio_engine", &"<MediaEngine>")
            .field("clock", &"<Clock>")
            .field(
                "manifest_client",
                &self.manifest_client.as_ref().map(|_| "<ManifestClient>"),
            )
            .field(
                "logger_sink",
                &self.logger_sink.as_ref().map(|_| "<LoggerSink>"),
            )
            .field("logging", &self.logging.is_some())
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The audio engine actually renders audio
    /// - The event buffer size is within `1..=65536`
    pub fn validate(&self) -> Result<()> {
        if self.audio_engine.kind() != MediaKind::Audio {
            return Err(Error::Config(format!(
                "audio_engine must render audio, got a {} engine",
                self.audio_engine.kind()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size exceeds maximum of {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        Ok(())
    }
}

fn audio_engine_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaEngine(audio)".to_string(),
        message: "An audio engine is required to play episode enclosures. \
                 Web: wrap an HTMLAudioElement. \
                 iOS: wrap an AVPlayer. \
                 Android: wrap an ExoPlayer instance."
            .to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    audio_engine: Option<Arc<dyn MediaEngine>>,
    clock: Option<Arc<dyn Clock>>,
    manifest_client: Option<Arc<dyn ManifestClient>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    logging: Option<LoggingConfig>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the audio engine implementation (required).
    pub fn audio_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.audio_engine = Some(engine);
        self
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn manifest_client(mut self, client: Arc<dyn ManifestClient>) -> Self {
        self.manifest_client = Some(client);
        self
    }

    /// Sets the logger sink for host integration.
    ///
    /// When logging is also configured without a sink, this sink is attached
    /// to it.
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when no audio engine was injected
    /// - [`Error::Config`] when validation fails
    pub fn build(self) -> Result<CoreConfig> {
        let audio_engine = self.audio_engine.ok_or_else(audio_engine_missing_error)?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let logging = match (self.logging, &self.logger_sink) {
            (Some(logging), Some(sink)) if logging.logger_sink.is_none() => {
                Some(logging.with_logger_sink(Arc::clone(sink)))
            }
            (logging, _) => logging,
        };

        let config = CoreConfig {
            audio_engine,
            clock,
            manifest_client: self.manifest_client,
            logger_sink: self.logger_sink,
            logging,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
