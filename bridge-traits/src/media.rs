//! Media engine bridge traits and supporting types.
//!
//! A [`MediaEngine`] wraps exactly one concrete playback primitive owned by the
//! host: an `<audio>`/`<video>` element on the web, an `AVPlayer` on iOS, an
//! ExoPlayer instance on Android. The core never talks to those primitives
//! directly; it drives them through this trait and receives their raw
//! notifications through an [`EngineEventSink`] it attaches before each load.

use crate::{
    error::Result,
    platform::PlatformSendSync,
    streaming::ManifestClient,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Kind of media a source carries (and therefore which engine renders it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// The opposite kind; handy when addressing the shadow engine.
    pub fn other(self) -> Self {
        match self {
            MediaKind::Audio => MediaKind::Video,
            MediaKind::Video => MediaKind::Audio,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of one playable rendition of an episode.
///
/// An episode carries one audio source plus zero or more alternate video
/// sources (Podcasting 2.0 `<podcast:alternateEnclosure>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    /// Fully-qualified URL of the media or its streaming manifest.
    pub url: String,
    /// Audio or video.
    pub kind: MediaKind,
    /// MIME type as declared by the feed (e.g. `audio/mpeg`, `application/x-mpegURL`).
    pub mime_type: String,
    /// Declared bitrate in bits per second, when the feed provides one.
    #[serde(default)]
    pub bitrate: Option<u32>,
    /// Declared vertical resolution for video sources.
    #[serde(default)]
    pub height: Option<u32>,
    /// Whether the publisher marked this rendition as the default.
    #[serde(default)]
    pub is_default: bool,
}

impl MediaSource {
    /// Create a new source descriptor.
    pub fn new(url: impl Into<String>, kind: MediaKind, mime_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            mime_type: mime_type.into(),
            bitrate: None,
            height: None,
            is_default: false,
        }
    }

    /// Audio source with the given MIME type.
    pub fn audio(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::new(url, MediaKind::Audio, mime_type)
    }

    /// Video source with the given MIME type.
    pub fn video(url: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::new(url, MediaKind::Video, mime_type)
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Returns `true` when the source is an adaptive streaming manifest
    /// (HLS or DASH) rather than a progressive file.
    pub fn is_adaptive(&self) -> bool {
        let mime = self.mime_type.to_ascii_lowercase();
        if mime.contains("mpegurl") || mime.contains("dash+xml") {
            return true;
        }

        let path = self
            .url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        path.ends_with(".m3u8") || path.ends_with(".mpd")
    }
}

/// Error categories a host engine can report asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    /// The source could not be fetched or decoded.
    SourceLoadFailed,
    /// Playback was rejected pending a user gesture.
    AutoplayBlocked,
    /// The network dropped mid-stream.
    Network,
    /// Media data was corrupt or the codec is unsupported.
    Decode,
    /// Anything the host could not classify.
    Other,
}

/// Raw notification emitted by a host engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback position advanced (or jumped).
    TimeUpdate { position: Duration },
    /// The engine learned the media's total length.
    DurationKnown { duration: Duration },
    /// The engine started or stopped producing output.
    PlayingChanged { playing: bool },
    /// Playback reached the end of the media.
    Ended,
    /// The engine failed after a successful load.
    Error {
        kind: EngineErrorKind,
        message: String,
    },
}

/// Receiver for raw engine notifications.
///
/// The core hands a fresh sink to the engine before every load; hosts should
/// drop any previously attached sink at that point.
pub trait EngineEventSink: PlatformSendSync {
    /// Deliver an event. Must not block.
    fn emit(&self, event: EngineEvent);
}

/// Trait implemented by hosts for every concrete playback primitive.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait MediaEngine: PlatformSendSync {
    /// The kind of media this engine renders.
    fn kind(&self) -> MediaKind;

    /// Route subsequent events to `sink`, replacing any previous sink.
    fn attach(&self, sink: Arc<dyn EngineEventSink>);

    /// Streaming client bound to this engine, if it plays adaptive manifests.
    ///
    /// Audio engines return `None`.
    fn manifest_client(&self) -> Option<Arc<dyn ManifestClient>> {
        None
    }

    /// Load a source and position the engine at `start_position` without
    /// starting playback.
    async fn load(&self, source: MediaSource, start_position: Duration) -> Result<()>;

    /// Start or resume playback. Hosts that block autoplay must return
    /// [`BridgeError::AutoplayBlocked`](crate::error::BridgeError::AutoplayBlocked)
    /// rather than silently ignoring the request.
    async fn play(&self) -> Result<()>;

    /// Pause without releasing the source.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Change the playback rate (1.0 = normal speed).
    async fn set_rate(&self, rate: f32) -> Result<()>;

    /// Mute or unmute output.
    async fn set_muted(&self, muted: bool) -> Result<()>;

    /// Current playback position as reported by the primitive.
    async fn position(&self) -> Result<Duration>;

    /// Release the loaded source and any buffers.
    async fn unload(&self) -> Result<()>;
}
