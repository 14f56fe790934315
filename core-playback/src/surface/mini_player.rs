//! # Mini Player
//!
//! A reduced surface bound to the same play head as the Full Player. It owns
//! a separate, always-muted video engine and only loads it while the episode
//! is presented as video and the mini player is visible. Otherwise it shows
//! the cover art.
//!
//! The shadow follows the play head loosely: it mirrors play state and rate
//! on every [`MiniPlayer::sync`], but is only reseeked once it drifts beyond
//! `drift_tolerance`.

use crate::config::PlayerConfig;
use crate::coordinator::Coordinator;
use crate::engine::{engine_inbox, AdapterUpdate, EngineAdapter, EngineInbox};
use crate::error::{PlaybackError, Result};
use crate::media::{MediaMode, SessionId};
use crate::play_head::{PlayHeadObserver, PlayerPhase, PlayerSnapshot};
use bridge_traits::{media::MediaEngine, time::Clock};
use std::sync::Arc;
use tracing::{debug, warn};

/// What the mini player renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiniPlayerView {
    Hidden,
    Cover { image_url: Option<String> },
    Video,
}

pub struct MiniPlayer {
    observer: PlayHeadObserver,
    adapter: EngineAdapter,
    inbox: EngineInbox,
    clock: Arc<dyn Clock>,
    drift_tolerance: f64,
    loaded_for: Option<SessionId>,
    view: MiniPlayerView,
}

impl MiniPlayer {
    pub fn new(coordinator: &Coordinator, video_engine: Arc<dyn MediaEngine>) -> Result<Self> {
        if video_engine.kind() != MediaMode::Video {
            return Err(PlaybackError::Config(format!(
                "mini player needs a video engine, got {}",
                video_engine.kind()
            )));
        }
        Ok(Self::with_config(
            coordinator.observe(),
            video_engine,
            coordinator.clock().clone(),
            coordinator.config(),
        ))
    }

    fn with_config(
        observer: PlayHeadObserver,
        video_engine: Arc<dyn MediaEngine>,
        clock: Arc<dyn Clock>,
        config: &PlayerConfig,
    ) -> Self {
        let (outbox, inbox) = engine_inbox();
        Self {
            observer,
            adapter: EngineAdapter::new(video_engine, outbox, config),
            inbox,
            clock,
            drift_tolerance: config.drift_tolerance.as_secs_f64(),
            loaded_for: None,
            view: MiniPlayerView::Hidden,
        }
    }

    pub fn view(&self) -> &MiniPlayerView {
        &self.view
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.observer.snapshot()
    }

    /// Whether the shadow engine currently holds a source.
    pub fn has_shadow(&self) -> bool {
        self.adapter.is_loaded()
    }

    /// Wait for the next play head change. Returns `false` once the
    /// coordinator is gone.
    pub async fn changed(&mut self) -> bool {
        self.observer.changed().await.is_some()
    }

    /// Reconcile the shadow engine with the latest play head.
    pub async fn sync(&mut self) -> Result<&MiniPlayerView> {
        let now = self.clock.instant();
        while let Ok(envelope) = self.inbox.try_recv() {
            if let Some(AdapterUpdate::Error { kind, message }) = self.adapter.accept_event(envelope, now) {
                warn!(?kind, %message, "Mini player video failed; showing cover");
                self.release().await?;
            }
        }

        let snapshot = self.observer.snapshot_and_mark();
        let episode = snapshot.episode.clone();
        let wants_video = snapshot.show_mini_player
            && snapshot.media_mode() == MediaMode::Video
            && matches!(snapshot.phase, PlayerPhase::Loaded { .. });
        let source = episode.as_ref().and_then(|episode| episode.video_source().cloned());

        let (Some(head), Some(source), true) = (snapshot.head.as_ref(), source, wants_video) else {
            self.release().await?;
            self.view = if snapshot.show_mini_player && snapshot.head.is_some() {
                MiniPlayerView::Cover {
                    image_url: episode.and_then(|episode| episode.image_url.clone()),
                }
            } else {
                MiniPlayerView::Hidden
            };
            return Ok(&self.view);
        };

        if !self.adapter.is_loaded() || self.loaded_for != snapshot.session_id {
            self.adapter.set_muted(true).await?;
            self.adapter.set_rate(head.playback_rate).await?;
            self.adapter.load(source, head.current_time, now).await?;
            self.loaded_for = snapshot.session_id;
            debug!(time = head.current_time, "Mini player shadow loaded");
        } else if (self.adapter.position() - head.current_time).abs() > self.drift_tolerance {
            debug!(
                drift = (self.adapter.position() - head.current_time).abs(),
                "Mini player shadow resync"
            );
            self.adapter.seek(head.current_time, now).await?;
        }

        if (self.adapter.rate() - head.playback_rate).abs() > f32::EPSILON {
            self.adapter.set_rate(head.playback_rate).await?;
        }

        if head.is_playing && !self.adapter.is_playing() {
            if let Err(e) = self.adapter.play().await {
                debug!(error = %e, "Mini player shadow could not start");
            }
        } else if !head.is_playing && self.adapter.is_playing() {
            self.adapter.pause().await?;
        }

        self.view = MiniPlayerView::Video;
        Ok(&self.view)
    }

    /// Drop the shadow source, keeping the engine for later.
    pub async fn release(&mut self) -> Result<()> {
        if self.adapter.is_loaded() {
            self.adapter.pause().await?;
            self.adapter.unload().await?;
            debug!("Mini player shadow released");
        }
        self.loaded_for = None;
        Ok(())
    }
}

impl std::fmt::Debug for MiniPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniPlayer")
            .field("view", &self.view)
            .field("adapter", &self.adapter)
            .finish()
    }
}
