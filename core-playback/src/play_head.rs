//! # Play Head State
//!
//! The single logical play head shared by every surface. The coordinator is
//! the only writer; surfaces hold a [`PlayHeadObserver`] and react to change
//! notifications delivered through a `tokio::sync::watch` channel.
//!
//! Engine-driven position updates are rate limited to one notification per
//! `frame_interval`. Intent-driven writes (seek, skip, mode switch) publish
//! immediately. A throttled update is never lost: it stays pending until the
//! next publish or [`PlayHeadStore::flush`].

use crate::error::{ErrorKind, PlaybackError};
use crate::media::{Episode, MediaMode, SessionId};
use crate::quality::QualitySelection;
use bridge_traits::time::Clock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Position and transport state of the active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayHead {
    pub episode_id: String,
    /// Seconds. Within `[0, duration]` once the duration is known.
    pub current_time: f64,
    /// Seconds; 0 when unknown.
    pub duration: f64,
    pub is_playing: bool,
    pub playback_rate: f32,
    pub media_mode: MediaMode,
}

impl PlayHead {
    pub fn new(episode_id: impl Into<String>, current_time: f64, duration: f64, playback_rate: f32) -> Self {
        let mut head = Self {
            episode_id: episode_id.into(),
            current_time: 0.0,
            duration: 0.0,
            is_playing: false,
            playback_rate,
            media_mode: MediaMode::Audio,
        };
        head.apply_duration(duration);
        head.current_time = head.clamp(current_time);
        head
    }

    /// Clamp `time` into `[0, duration]`, or `[0, ∞)` while the duration is unknown.
    pub fn clamp(&self, time: f64) -> f64 {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        if self.duration > 0.0 {
            time.min(self.duration)
        } else {
            time
        }
    }

    /// Apply a duration report. A known positive duration never regresses to 0.
    ///
    /// Returns `true` if the duration changed.
    pub fn apply_duration(&mut self, duration: f64) -> bool {
        if !(duration.is_finite() && duration > 0.0) {
            return false;
        }
        if (self.duration - duration).abs() < f64::EPSILON {
            return false;
        }
        self.duration = duration;
        self.current_time = self.clamp(self.current_time);
        true
    }

    pub fn position_ms(&self) -> u64 {
        (self.current_time * 1000.0).round() as u64
    }

    pub fn duration_ms(&self) -> u64 {
        (self.duration * 1000.0).round() as u64
    }

    /// Fraction played, `0.0..=1.0`; 0 while the duration is unknown.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Coordinator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PlayerPhase {
    Idle,
    Loaded { mode: MediaMode },
    Switching { from: MediaMode, to: MediaMode },
    Error { kind: ErrorKind },
}

impl PlayerPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlayerPhase::Idle)
    }

    pub fn is_switching(&self) -> bool {
        matches!(self, PlayerPhase::Switching { .. })
    }
}

/// Last error surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerError {
    pub kind: Option<ErrorKind>,
    pub message: String,
    pub recoverable: bool,
}

impl From<&PlaybackError> for PlayerError {
    fn from(error: &PlaybackError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        }
    }
}

/// Everything a surface renders, published as one value.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub session_id: Option<SessionId>,
    pub episode: Option<Arc<Episode>>,
    /// `None` while idle.
    pub head: Option<PlayHead>,
    pub phase: PlayerPhase,
    pub show_mini_player: bool,
    pub quality: Option<QualitySelection>,
    pub last_error: Option<PlayerError>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            session_id: None,
            episode: None,
            head: None,
            phase: PlayerPhase::Idle,
            show_mini_player: false,
            quality: None,
            last_error: None,
        }
    }
}

impl PlayerSnapshot {
    pub fn is_playing(&self) -> bool {
        self.head.as_ref().is_some_and(|h| h.is_playing)
    }

    pub fn current_time(&self) -> f64 {
        self.head.as_ref().map_or(0.0, |h| h.current_time)
    }

    pub fn duration(&self) -> f64 {
        self.head.as_ref().map_or(0.0, |h| h.duration)
    }

    pub fn playback_rate(&self) -> f32 {
        self.head.as_ref().map_or(1.0, |h| h.playback_rate)
    }

    /// Audio while idle.
    pub fn media_mode(&self) -> MediaMode {
        self.head.as_ref().map_or(MediaMode::Audio, |h| h.media_mode)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Single-writer store behind the coordinator.
pub struct PlayHeadStore {
    sender: watch::Sender<PlayerSnapshot>,
    /// Working copy; may be ahead of what subscribers have seen.
    state: PlayerSnapshot,
    clock: Arc<dyn Clock>,
    frame_interval: Duration,
    last_publish: Option<Instant>,
    dirty: bool,
}

impl PlayHeadStore {
    pub fn new(clock: Arc<dyn Clock>, frame_interval: Duration) -> Self {
        let (sender, _) = watch::channel(PlayerSnapshot::default());
        Self {
            sender,
            state: PlayerSnapshot::default(),
            clock,
            frame_interval,
            last_publish: None,
            dirty: false,
        }
    }

    pub fn observe(&self) -> PlayHeadObserver {
        PlayHeadObserver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Working state, including throttled changes not yet published.
    pub fn state(&self) -> &PlayerSnapshot {
        &self.state
    }

    pub fn head(&self) -> Option<&PlayHead> {
        self.state.head.as_ref()
    }

    pub fn now(&self) -> Instant {
        self.clock.instant()
    }

    /// Apply an intent-driven change and publish it immediately.
    pub fn update(&mut self, apply: impl FnOnce(&mut PlayerSnapshot)) {
        apply(&mut self.state);
        self.publish();
    }

    /// Apply a change to the play head, if a session is active, and publish.
    pub fn update_head(&mut self, apply: impl FnOnce(&mut PlayHead)) {
        if let Some(head) = self.state.head.as_mut() {
            apply(head);
            self.publish();
        }
    }

    /// Record an engine time report, publishing at most once per frame.
    ///
    /// Returns `true` if subscribers were notified.
    pub fn report_time(&mut self, time: f64) -> bool {
        let Some(head) = self.state.head.as_mut() else {
            return false;
        };
        let clamped = head.clamp(time);
        if (head.current_time - clamped).abs() < f64::EPSILON {
            return false;
        }
        head.current_time = clamped;
        self.dirty = true;

        let now = self.clock.instant();
        let frame_elapsed = self
            .last_publish
            .map_or(true, |at| now.saturating_duration_since(at) >= self.frame_interval);

        if frame_elapsed {
            self.publish();
            true
        } else {
            false
        }
    }

    /// Publish a throttled update whose frame has elapsed.
    pub fn flush(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        let now = self.clock.instant();
        let frame_elapsed = self
            .last_publish
            .map_or(true, |at| now.saturating_duration_since(at) >= self.frame_interval);
        if frame_elapsed {
            self.publish();
        }
        frame_elapsed
    }

    pub fn has_pending(&self) -> bool {
        self.dirty
    }

    /// Drop the session and publish the idle state.
    pub fn reset(&mut self, show_mini_player: bool) {
        self.state = PlayerSnapshot {
            show_mini_player,
            ..PlayerSnapshot::default()
        };
        self.publish();
    }

    fn publish(&mut self) {
        self.dirty = false;
        self.last_publish = Some(self.clock.instant());
        // send_replace never fails, even with no receivers.
        self.sender.send_replace(self.state.clone());
    }
}

impl std::fmt::Debug for PlayHeadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayHeadStore")
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .finish()
    }
}

/// Read side of the store, one per surface.
#[derive(Debug, Clone)]
pub struct PlayHeadObserver {
    receiver: watch::Receiver<PlayerSnapshot>,
}

impl PlayHeadObserver {
    /// Latest published snapshot.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.receiver.borrow().clone()
    }

    /// Whether a snapshot was published since the last `snapshot_and_mark`.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Latest snapshot, marking it as seen.
    pub fn snapshot_and_mark(&mut self) -> PlayerSnapshot {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next publish. Returns `None` once the coordinator is gone.
    pub async fn changed(&mut self) -> Option<PlayerSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }
}
