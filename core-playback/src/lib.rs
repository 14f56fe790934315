//! # Playback Synchronization Core
//!
//! Keeps one logical play head consistent while an episode is presented as
//! audio or video, across a Full Player and a Mini Player.
//!
//! ## Overview
//!
//! This crate handles:
//! - Normalizing host audio/video engines behind one adapter ([`engine`])
//! - The shared play head and its change notifications ([`play_head`])
//! - Audio/video handoff without losing position or play state ([`coordinator`])
//! - Adaptive streaming level selection ([`quality`])
//! - Surface-side state for the Full Player, Mini Player and scrub bar ([`surface`])
//!
//! Host engines are injected through [`bridge_traits::media::MediaEngine`];
//! this crate never touches a concrete player.

pub mod binding;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod media;
pub mod play_head;
pub mod quality;
pub mod surface;

pub use config::PlayerConfig;
pub use coordinator::{Coordinator, VideoLease};
pub use error::{ErrorKind, PlaybackError, Result};
pub use media::{Episode, MediaMode, SessionId};
pub use play_head::{PlayHead, PlayHeadObserver, PlayerError, PlayerPhase, PlayerSnapshot};
pub use quality::{QualityLevel, QualitySelection};
pub use surface::{FullPlayer, MiniPlayer, MiniPlayerView, ScrubBar};
