//! # Engine Adapter
//!
//! Normalizes one host [`MediaEngine`] into the contract the coordinator
//! relies on:
//!
//! - every call is bounded by `engine_timeout`
//! - autoplay refusals surface as [`PlaybackError::AutoplayBlocked`]
//! - raw events are stamped with the adapter's slot and load generation, so
//!   events from a superseded load never reach the play head
//! - `seek` is idempotent and suppresses stale time reports while it settles
//! - a polling fallback reads the position when native time reports go quiet
//!
//! ```text
//!  host engine ──emit──> EnvelopeSink ──mpsc──> coordinator inbox
//!                         (slot, generation)        │
//!                                                   ▼
//!                                     EngineAdapter::accept_event
//!                                                   │
//!                                                   ▼
//!                                             AdapterUpdate
//! ```

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::media::MediaMode;
use crate::quality::{QualityController, QualitySelection};
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    media::{EngineErrorKind, EngineEvent, EngineEventSink, MediaEngine, MediaSource},
    streaming::ManifestClient,
};
use core_runtime::logging::redact_url;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace, warn};

/// Positions closer than this are the same seek target.
const SEEK_TARGET_EPSILON: f64 = 0.001;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

fn secs(duration: Duration) -> f64 {
    duration.as_secs_f64()
}

fn to_duration(seconds: f64) -> Duration {
    Duration::from_secs_f64(seconds.max(0.0))
}

// ============================================================================
// Event plumbing
// ============================================================================

/// A raw engine event tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEnvelope {
    pub slot: MediaMode,
    pub generation: u64,
    pub event: EngineEvent,
}

/// Receiving half of an engine inbox.
pub type EngineInbox = mpsc::UnboundedReceiver<EngineEnvelope>;

/// Sending half of an engine inbox, shared by every adapter feeding it.
pub type EngineOutbox = mpsc::UnboundedSender<EngineEnvelope>;

/// Creates a new inbox for engine envelopes.
pub fn engine_inbox() -> (EngineOutbox, EngineInbox) {
    mpsc::unbounded_channel()
}

struct EnvelopeSink {
    slot: MediaMode,
    generation: u64,
    outbox: EngineOutbox,
}

impl EngineEventSink for EnvelopeSink {
    fn emit(&self, event: EngineEvent) {
        // A closed inbox means the owner shut down.
        let _ = self.outbox.send(EngineEnvelope {
            slot: self.slot,
            generation: self.generation,
            event,
        });
    }
}

/// Normalized, generation-checked engine notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterUpdate {
    Time(f64),
    Duration(f64),
    Playing(bool),
    Ended,
    Error {
        kind: EngineErrorKind,
        message: String,
    },
}

// ============================================================================
// Seek settling
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    target: f64,
    issued_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct SeekWindow {
    tolerance: f64,
    timeout: Duration,
}

impl SeekWindow {
    /// Whether a reported position should be dropped, clearing `pending`
    /// once the seek has landed or the window expired.
    fn filter(&self, pending: &mut Option<PendingSeek>, position: f64, now: Instant) -> bool {
        let Some(seek) = *pending else {
            return false;
        };

        if (position - seek.target).abs() <= self.tolerance {
            *pending = None;
            return false;
        }

        if now.saturating_duration_since(seek.issued_at) < self.timeout {
            trace!(position, target = seek.target, "Dropping stale time report during seek");
            return true;
        }

        debug!(position, target = seek.target, "Seek settle window expired");
        *pending = None;
        false
    }
}

// ============================================================================
// Engine Adapter
// ============================================================================

/// One bound engine plus the bookkeeping that makes it well-behaved.
pub struct EngineAdapter {
    slot: MediaMode,
    engine: Arc<dyn MediaEngine>,
    outbox: EngineOutbox,
    generation: u64,
    source: Option<MediaSource>,
    muted: bool,
    rate: f32,
    playing: bool,
    position: f64,
    duration: Option<f64>,
    last_native_at: Option<Instant>,
    pending_seek: Option<PendingSeek>,
    seek_window: SeekWindow,
    timeout: Duration,
    quality: Option<QualityController>,
}

impl EngineAdapter {
    pub fn new(engine: Arc<dyn MediaEngine>, outbox: EngineOutbox, config: &PlayerConfig) -> Self {
        Self {
            slot: engine.kind(),
            engine,
            outbox,
            generation: 0,
            source: None,
            muted: false,
            rate: 1.0,
            playing: false,
            position: 0.0,
            duration: None,
            last_native_at: None,
            pending_seek: None,
            seek_window: SeekWindow {
                tolerance: secs(config.seek_settle_tolerance),
                timeout: config.seek_settle_timeout,
            },
            timeout: config.engine_timeout,
            quality: None,
        }
    }

    /// Attach a streaming client. Ignored for audio engines.
    pub fn with_manifest_client(mut self, client: Option<Arc<dyn ManifestClient>>) -> Self {
        if self.slot == MediaMode::Video {
            self.quality = client.map(QualityController::new);
        }
        self
    }

    pub fn kind(&self) -> MediaMode {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    pub fn source(&self) -> Option<&MediaSource> {
        self.source.as_ref()
    }

    /// Last accepted position in seconds.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Duration reported by the engine, if any.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn is_seeking(&self) -> bool {
        self.pending_seek.is_some()
    }

    /// Whether `envelope` belongs to this adapter's current load.
    pub fn accepts(&self, envelope: &EngineEnvelope) -> bool {
        self.is_loaded() && envelope.slot == self.slot && envelope.generation == self.generation
    }

    async fn call<T, F>(&self, operation: &str, future: F) -> Result<BridgeResult<T>>
    where
        F: Future<Output = BridgeResult<T>>,
    {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| PlaybackError::Timeout(format!("{} {}", self.slot, operation)))
    }

    /// Load `source` positioned at `start` seconds without starting playback.
    ///
    /// Mute state and rate carry over from before the load.
    #[instrument(skip(self, source), fields(slot = %self.slot, url = %redact_url(&source.url)))]
    pub async fn load(&mut self, source: MediaSource, start: f64, now: Instant) -> Result<()> {
        let generation = next_generation();
        self.generation = generation;
        self.source = None;
        self.playing = false;
        self.pending_seek = None;
        self.duration = None;

        self.engine.attach(Arc::new(EnvelopeSink {
            slot: self.slot,
            generation,
            outbox: self.outbox.clone(),
        }));

        self.call("load", self.engine.load(source.clone(), to_duration(start)))
            .await?
            .map_err(|e| PlaybackError::SourceLoadFailed(e.to_string()))?;

        self.source = Some(source);
        self.position = start.max(0.0);
        self.last_native_at = Some(now);

        self.call("set_muted", self.engine.set_muted(self.muted))
            .await?
            .map_err(PlaybackError::from)?;
        if (self.rate - 1.0).abs() > f32::EPSILON {
            self.call("set_rate", self.engine.set_rate(self.rate))
                .await?
                .map_err(PlaybackError::from)?;
        }

        debug!(generation, start, "Source loaded");
        Ok(())
    }

    pub async fn play(&mut self) -> Result<()> {
        if !self.is_loaded() {
            return Err(PlaybackError::EngineUnavailable(self.slot));
        }

        match self.call("play", self.engine.play()).await? {
            Ok(()) => {
                self.playing = true;
                Ok(())
            }
            Err(BridgeError::AutoplayBlocked) => {
                self.playing = false;
                warn!(slot = %self.slot, "Play rejected by autoplay policy");
                Err(PlaybackError::AutoplayBlocked)
            }
            Err(e) => Err(PlaybackError::PlaybackFailed(e.to_string())),
        }
    }

    pub async fn pause(&mut self) -> Result<()> {
        if !self.is_loaded() {
            return Ok(());
        }

        self.call("pause", self.engine.pause())
            .await?
            .map_err(|e| PlaybackError::PlaybackFailed(e.to_string()))?;
        self.playing = false;
        Ok(())
    }

    /// Seek to `target` seconds.
    ///
    /// Repeating the in-flight target is a no-op; a different target
    /// supersedes the pending one.
    pub async fn seek(&mut self, target: f64, now: Instant) -> Result<()> {
        if !self.is_loaded() {
            return Err(PlaybackError::EngineUnavailable(self.slot));
        }

        let target = target.max(0.0);
        if let Some(pending) = self.pending_seek {
            if (pending.target - target).abs() < SEEK_TARGET_EPSILON {
                trace!(target, "Seek already in flight");
                return Ok(());
            }
        }

        match self.call("seek", self.engine.seek(to_duration(target))).await? {
            Ok(()) => {}
            Err(BridgeError::OutOfRange(_)) => return Err(PlaybackError::SeekOutOfRange(target)),
            Err(e) => return Err(PlaybackError::PlaybackFailed(e.to_string())),
        }

        self.pending_seek = Some(PendingSeek {
            target,
            issued_at: now,
        });
        self.position = target;
        Ok(())
    }

    pub async fn set_rate(&mut self, rate: f32) -> Result<()> {
        if self.is_loaded() {
            self.call("set_rate", self.engine.set_rate(rate))
                .await?
                .map_err(PlaybackError::from)?;
        }
        self.rate = rate;
        Ok(())
    }

    pub async fn set_muted(&mut self, muted: bool) -> Result<()> {
        if self.is_loaded() {
            self.call("set_muted", self.engine.set_muted(muted))
                .await?
                .map_err(PlaybackError::from)?;
        }
        self.muted = muted;
        Ok(())
    }

    /// Release the source. Events from the old load are dropped from now on.
    pub async fn unload(&mut self) -> Result<()> {
        if !self.is_loaded() {
            return Ok(());
        }

        self.generation = next_generation();
        self.source = None;
        self.playing = false;
        self.pending_seek = None;
        self.duration = None;
        self.last_native_at = None;
        if let Some(quality) = self.quality.as_mut() {
            quality.clear();
        }

        self.call("unload", self.engine.unload())
            .await?
            .map_err(PlaybackError::from)
    }

    /// Translate an envelope from the inbox.
    ///
    /// Returns `None` for events of a superseded load and for time reports
    /// suppressed while a seek settles.
    pub fn accept_event(&mut self, envelope: EngineEnvelope, now: Instant) -> Option<AdapterUpdate> {
        if !self.accepts(&envelope) {
            trace!(
                slot = %envelope.slot,
                generation = envelope.generation,
                current = self.generation,
                "Dropping event from superseded load"
            );
            return None;
        }

        match envelope.event {
            EngineEvent::TimeUpdate { position } => {
                let position = secs(position);
                if self.seek_window.filter(&mut self.pending_seek, position, now) {
                    return None;
                }
                self.position = position;
                self.last_native_at = Some(now);
                Some(AdapterUpdate::Time(position))
            }
            EngineEvent::DurationKnown { duration } => {
                let duration = secs(duration);
                if !(duration.is_finite() && duration > 0.0) {
                    return None;
                }
                self.duration = Some(duration);
                Some(AdapterUpdate::Duration(duration))
            }
            EngineEvent::PlayingChanged { playing } => {
                self.playing = playing;
                Some(AdapterUpdate::Playing(playing))
            }
            EngineEvent::Ended => {
                self.playing = false;
                Some(AdapterUpdate::Ended)
            }
            EngineEvent::Error { kind, message } => {
                self.playing = false;
                Some(AdapterUpdate::Error { kind, message })
            }
        }
    }

    /// Whether native time reports have been silent for at least `stale_after`.
    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        self.is_loaded()
            && self.playing
            && self
                .last_native_at
                .map_or(true, |at| now.saturating_duration_since(at) >= stale_after)
    }

    /// Read the position directly when native reports went stale.
    ///
    /// Returns `Ok(None)` when native reports are fresh; they always take
    /// precedence over polled samples.
    pub async fn poll_position(&mut self, now: Instant, stale_after: Duration) -> Result<Option<f64>> {
        if !self.is_stale(now, stale_after) {
            return Ok(None);
        }

        let generation = self.generation;
        let position = secs(
            self.call("position", self.engine.position())
                .await?
                .map_err(PlaybackError::from)?,
        );

        // A load or unload raced the read.
        if generation != self.generation {
            return Ok(None);
        }

        if self.seek_window.filter(&mut self.pending_seek, position, now) {
            return Ok(None);
        }

        trace!(slot = %self.slot, position, "Polled position");
        self.position = position;
        Ok(Some(position))
    }

    /// Whether quality control applies to the loaded source.
    pub fn supports_quality(&self) -> bool {
        self.quality.is_some() && self.source.as_ref().is_some_and(MediaSource::is_adaptive)
    }

    /// Re-read the manifest of the loaded source.
    pub async fn refresh_quality(&mut self) -> Result<Option<QualitySelection>> {
        if !self.supports_quality() {
            return Ok(None);
        }
        let (Some(quality), Some(source)) = (self.quality.as_mut(), self.source.as_ref()) else {
            return Ok(None);
        };

        let selection = tokio::time::timeout(self.timeout, quality.reload(source))
            .await
            .map_err(|_| PlaybackError::Timeout("video manifest".to_string()))??;
        Ok(Some(selection.clone()))
    }

    /// Drop the ladder and any pinned level so the next manifest load
    /// starts in auto.
    pub async fn reset_quality(&mut self) -> Result<()> {
        let Some(quality) = self.quality.as_mut() else {
            return Ok(());
        };
        let pinned = !quality.selection().is_auto;
        quality.clear();
        if pinned {
            quality.set_auto().await?;
        }
        Ok(())
    }

    /// Current ladder, when quality control applies.
    pub fn quality_selection(&self) -> Option<QualitySelection> {
        if !self.supports_quality() {
            return None;
        }
        self.quality.as_ref().map(|q| q.selection().clone())
    }

    /// Mutable access for level changes.
    pub fn quality_mut(&mut self) -> Option<&mut QualityController> {
        if !self.supports_quality() {
            return None;
        }
        self.quality.as_mut()
    }
}

impl std::fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("slot", &self.slot)
            .field("generation", &self.generation)
            .field("loaded", &self.is_loaded())
            .field("playing", &self.playing)
            .field("muted", &self.muted)
            .field("position", &self.position)
            .finish()
    }
}
