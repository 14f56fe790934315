//! # Event Bus System
//!
//! Provides an event-driven architecture for the playback core using `tokio::sync::broadcast`.
//! This module lets the coordinator, surfaces and host UI communicate through typed events
//! without holding references to each other.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for different domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//! - **Subscription Management**: Multiple subscribers can listen independently
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐
//! │ Coordinator ├──────────────>│           │
//! └─────────────┘               │           │
//!                               │ EventBus  │
//! ┌─────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │ Quality Ctl ├──────────────>│  channel) ├─────────────────>│  Host UI   │
//! └─────────────┘               │           │                  └────────────┘
//!                               │           │
//! ┌─────────────┐     emit      │           │     subscribe    ┌────────────┐
//! │ Full Player ├──────────────>│           ├─────────────────>│ Analytics  │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! The play head itself is *not* carried on the bus: position updates arrive at
//! frame rate and are delivered through a `tokio::sync::watch` channel owned by
//! the coordinator. The bus carries discrete transitions only.
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, PlaybackEvent};
//!
//! let event_bus = EventBus::new(100);
//! let event = CoreEvent::Playback(PlaybackEvent::Started {
//!     episode_id: "ep-42".to_string(),
//!     position_ms: 420_000,
//! });
//!
//! event_bus.emit(event).ok();
//! ```
//!
//! ### Filtering Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, EventStream, CoreEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = EventStream::new(event_bus.subscribe())
//!     .filter(|event| matches!(event, CoreEvent::Mode(_)));
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = stream.recv().await {
//!         println!("Mode event: {}", event.description());
//!     }
//! });
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Playback Events
//! - `EpisodeLoaded`: A new episode became the active session
//! - `Started` / `Paused`: The primary engine started or stopped producing output
//! - `Seeked`: The play head jumped (seek, skip or scrub release)
//! - `RateChanged`: Playback speed changed
//! - `Completed`: The primary engine reached the end of the media
//! - `Stopped`: The session was torn down
//! - `Error`: An engine or intent failed
//!
//! ### Mode Events
//! - `SwitchStarted` / `Switched` / `SwitchFailed`: Audio/video handoff lifecycle
//! - `MiniPlayerVisibilityChanged`: Navigation toggled the mini player
//!
//! ### Quality Events
//! - `LevelsChanged`: The streaming manifest was (re)parsed
//! - `LevelSelected`: A level was pinned, or adaptive selection restored
//! - `ManifestError`: The manifest could not be read; playback continues in auto
//!
//! ## Error Handling
//!
//! The event bus uses `tokio::sync::broadcast`, which can produce two types of errors:
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Subscribers should handle `Lagged` gracefully and treat `Closed` as a signal to exit.

use bridge_traits::media::MediaKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Play head transitions of the active session
    Playback(PlaybackEvent),
    /// Audio/video mode handoff and surface visibility
    Mode(ModeEvent),
    /// Adaptive streaming level changes
    Quality(QualityEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Mode(e) => e.description(),
            CoreEvent::Quality(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    ///
    /// Useful for filtering or routing events to different handlers.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Mode(ModeEvent::SwitchFailed { .. }) => EventSeverity::Error,
            CoreEvent::Quality(QualityEvent::ManifestError { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::EpisodeLoaded { .. }) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Mode(ModeEvent::Switched { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Discrete transitions of the active playback session.
///
/// Positions are in milliseconds so payloads stay integer-only on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    EpisodeLoaded {
        episode_id: String,
        title: Option<String>,
        position_ms: u64,
        /// 0 when the duration is not yet known
        duration_ms: u64,
        has_video: bool,
    },
    Started {
        episode_id: String,
        position_ms: u64,
    },
    Paused {
        episode_id: String,
        position_ms: u64,
    },
    Seeked {
        episode_id: String,
        from_ms: u64,
        to_ms: u64,
    },
    RateChanged {
        episode_id: String,
        rate: f32,
    },
    Completed {
        episode_id: String,
    },
    Stopped {
        episode_id: String,
    },
    Error {
        episode_id: Option<String>,
        /// Stable error kind identifier (e.g. `source_load_failed`)
        kind: String,
        message: String,
        /// Whether a user action (typically `play()`) can recover
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::EpisodeLoaded { .. } => "Episode loaded",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Seeked { .. } => "Play head moved",
            PlaybackEvent::RateChanged { .. } => "Playback rate changed",
            PlaybackEvent::Completed { .. } => "Episode completed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Mode Events
// ============================================================================

/// Audio/video handoff lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ModeEvent {
    SwitchStarted {
        episode_id: String,
        from: MediaKind,
        to: MediaKind,
        position_ms: u64,
    },
    Switched {
        episode_id: String,
        mode: MediaKind,
        position_ms: u64,
        playing: bool,
    },
    SwitchFailed {
        episode_id: String,
        from: MediaKind,
        to: MediaKind,
        message: String,
    },
    MiniPlayerVisibilityChanged {
        visible: bool,
    },
}

impl ModeEvent {
    fn description(&self) -> &str {
        match self {
            ModeEvent::SwitchStarted { .. } => "Media mode switch started",
            ModeEvent::Switched { .. } => "Media mode switched",
            ModeEvent::SwitchFailed { .. } => "Media mode switch failed",
            ModeEvent::MiniPlayerVisibilityChanged { .. } => "Mini player visibility changed",
        }
    }
}

// ============================================================================
// Quality Events
// ============================================================================

/// Adaptive streaming level changes for the primary video engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QualityEvent {
    LevelsChanged {
        episode_id: String,
        /// Level names, highest resolution first
        levels: Vec<String>,
    },
    LevelSelected {
        episode_id: String,
        /// `None` when adaptive selection is active
        index: Option<usize>,
        name: Option<String>,
    },
    ManifestError {
        episode_id: String,
        message: String,
    },
}

impl QualityEvent {
    fn description(&self) -> &str {
        match self {
            QualityEvent::LevelsChanged { .. } => "Quality levels changed",
            QualityEvent::LevelSelected { .. } => "Quality level selected",
            QualityEvent::ManifestError { .. } => "Streaming manifest error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` call creates an
/// independent receiver that sees events published after it subscribed.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent, ModeEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let mut ui = event_bus.subscribe();
///
/// event_bus
///     .emit(CoreEvent::Mode(ModeEvent::MiniPlayerVisibilityChanged { visible: true }))
///     .ok();
///
/// assert!(ui.recv().await.is_ok());
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening. Publishers inside the core ignore that error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. Returns `None` when no matching event is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
