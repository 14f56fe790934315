//! # Playback Error Types
//!
//! Error types for the playback synchronization core.

use bridge_traits::error::BridgeError;
use bridge_traits::media::MediaKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Attempted an operation that needs an active episode.
    #[error("No episode loaded")]
    NoEpisodeLoaded,

    /// Video mode was requested for an episode without a video rendition.
    #[error("Episode has no video source")]
    NoVideoSource,

    /// No engine is bound for the requested media kind.
    #[error("No {0} engine available")]
    EngineUnavailable(MediaKind),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine could not fetch or decode the source.
    #[error("Failed to load media source: {0}")]
    SourceLoadFailed(String),

    /// The host refused to start playback without a user gesture.
    #[error("Playback blocked by autoplay policy")]
    AutoplayBlocked,

    /// Seek target lies outside the media. Intents clamp instead of failing.
    #[error("Seek position out of range: {0:.3}s")]
    SeekOutOfRange(f64),

    /// Playback rate outside the configured cycle.
    #[error("Unsupported playback rate: {0}")]
    InvalidPlaybackRate(f32),

    /// Playback operation failed.
    #[error("Playback operation failed: {0}")]
    PlaybackFailed(String),

    /// An engine call did not complete within `engine_timeout`.
    #[error("Engine operation timed out: {0}")]
    Timeout(String),

    // ========================================================================
    // Mode Switch Errors
    // ========================================================================
    /// The audio/video handoff could not complete.
    #[error("Media mode switch failed: {0}")]
    ModeSwitchFailed(String),

    /// The surface that owned the pending operation was unmounted.
    #[error("Video surface detached")]
    SurfaceDetached,

    // ========================================================================
    // Quality Errors
    // ========================================================================
    /// The streaming manifest could not be read.
    #[error("Quality manifest error: {0}")]
    QualityManifestError(String),

    /// Quality control is only available for adaptive video in video mode.
    #[error("Quality selection unavailable")]
    QualityUnavailable,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Bridge error from a host engine.
    #[error("Engine error: {0}")]
    Engine(#[from] BridgeError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable classification surfaced in the player phase and error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SourceLoadFailed,
    AutoplayBlocked,
    SeekOutOfRange,
    ModeSwitchFailed,
    QualityManifestError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::SourceLoadFailed => "source_load_failed",
            ErrorKind::AutoplayBlocked => "autoplay_blocked",
            ErrorKind::SeekOutOfRange => "seek_out_of_range",
            ErrorKind::ModeSwitchFailed => "mode_switch_failed",
            ErrorKind::QualityManifestError => "quality_manifest_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlaybackError {
    /// Maps the error onto one of the user-visible kinds, if it has one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PlaybackError::SourceLoadFailed(_)
            | PlaybackError::Timeout(_)
            | PlaybackError::Engine(BridgeError::LoadFailed(_)) => Some(ErrorKind::SourceLoadFailed),
            PlaybackError::AutoplayBlocked | PlaybackError::Engine(BridgeError::AutoplayBlocked) => {
                Some(ErrorKind::AutoplayBlocked)
            }
            PlaybackError::SeekOutOfRange(_) | PlaybackError::Engine(BridgeError::OutOfRange(_)) => {
                Some(ErrorKind::SeekOutOfRange)
            }
            PlaybackError::ModeSwitchFailed(_) => Some(ErrorKind::ModeSwitchFailed),
            PlaybackError::QualityManifestError(_)
            | PlaybackError::Engine(BridgeError::Manifest(_)) => {
                Some(ErrorKind::QualityManifestError)
            }
            _ => None,
        }
    }

    /// Returns `true` if a user action can recover without reloading the episode.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            Some(ErrorKind::AutoplayBlocked)
                | Some(ErrorKind::SeekOutOfRange)
                | Some(ErrorKind::QualityManifestError)
                | Some(ErrorKind::ModeSwitchFailed)
        ) || matches!(self, PlaybackError::SurfaceDetached)
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_errors_classify_like_native_ones() {
        let blocked: PlaybackError = BridgeError::AutoplayBlocked.into();
        assert_eq!(blocked.kind(), Some(ErrorKind::AutoplayBlocked));
        assert!(blocked.is_recoverable());

        let load: PlaybackError = BridgeError::LoadFailed("404".into()).into();
        assert_eq!(load.kind(), Some(ErrorKind::SourceLoadFailed));
        assert!(!load.is_recoverable());

        let generic: PlaybackError = BridgeError::OperationFailed("boom".into()).into();
        assert_eq!(generic.kind(), None);
    }

    #[test]
    fn timeouts_count_as_load_failures() {
        let err = PlaybackError::Timeout("load video".into());
        assert_eq!(err.kind(), Some(ErrorKind::SourceLoadFailed));
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ModeSwitchFailed).unwrap();
        assert_eq!(json, "\"mode_switch_failed\"");
        assert_eq!(ErrorKind::QualityManifestError.to_string(), "quality_manifest_error");
    }
}
