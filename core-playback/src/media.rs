//! # Episode Model
//!
//! The playable unit handed to the coordinator, and the identifiers that
//! scope a playback session.

use bridge_traits::media::{MediaKind, MediaSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Audio or video presentation of the active session.
pub use bridge_traits::media::MediaKind as MediaMode;

/// MIME type assumed when a feed omits the enclosure type.
const FALLBACK_AUDIO_MIME: &str = "audio/mpeg";

/// A podcast or livestream episode.
///
/// Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Primary enclosure; every episode is playable as audio.
    pub audio_url: String,
    #[serde(default)]
    pub audio_mime_type: Option<String>,
    /// Duration declared by the feed. Engines may report a more precise value.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Alternate renditions, typically video.
    #[serde(default)]
    pub alternate_sources: Vec<MediaSource>,
    /// Resume hint from the previous listening session.
    #[serde(default)]
    pub last_played_position: Option<f64>,
    /// Cover art shown when video is not presented.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl Episode {
    pub fn new(id: impl Into<String>, audio_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            audio_url: audio_url.into(),
            audio_mime_type: None,
            duration: None,
            alternate_sources: Vec::new(),
            last_played_position: None,
            image_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_audio_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.audio_mime_type = Some(mime.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_alternate_source(mut self, source: MediaSource) -> Self {
        self.alternate_sources.push(source);
        self
    }

    pub fn with_last_played_position(mut self, seconds: f64) -> Self {
        self.last_played_position = Some(seconds);
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// The audio enclosure as a loadable source.
    pub fn audio_source(&self) -> MediaSource {
        MediaSource::audio(
            self.audio_url.clone(),
            self.audio_mime_type
                .clone()
                .unwrap_or_else(|| FALLBACK_AUDIO_MIME.to_string()),
        )
    }

    /// The video rendition to present: the publisher default if one is
    /// marked, otherwise the tallest, then the highest bitrate.
    pub fn video_source(&self) -> Option<&MediaSource> {
        self.alternate_sources
            .iter()
            .filter(|source| source.kind == MediaKind::Video)
            .max_by_key(|source| {
                (
                    source.is_default,
                    source.height.unwrap_or(0),
                    source.bitrate.unwrap_or(0),
                )
            })
    }

    /// Source for the given mode, if the episode has one.
    pub fn source_for(&self, mode: MediaMode) -> Option<MediaSource> {
        match mode {
            MediaMode::Audio => Some(self.audio_source()),
            MediaMode::Video => self.video_source().cloned(),
        }
    }

    pub fn has_video(&self) -> bool {
        self.video_source().is_some()
    }

    /// Declared duration, or 0 when unknown.
    pub fn duration_hint(&self) -> f64 {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(0.0)
    }

    /// Initial play-head position for a new session.
    ///
    /// An explicit positive `start` wins, then a positive resume hint, then 0.
    /// The result is clamped to the declared duration when one is known.
    pub fn resolve_start_position(&self, start: Option<f64>) -> f64 {
        let positive = |value: Option<f64>| value.filter(|v| v.is_finite() && *v > 0.0);

        let position = positive(start)
            .or_else(|| positive(self.last_played_position))
            .unwrap_or(0.0);

        match self.duration_hint() {
            d if d > 0.0 => position.min(d),
            _ => position,
        }
    }
}

/// Identifier of one `load_episode` .. `stop` lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
