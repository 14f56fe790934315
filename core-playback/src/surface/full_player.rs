//! # Full Player
//!
//! The expanded surface. It owns the video engine for as long as it is
//! mounted and leases it to the coordinator; unmounting while video is
//! primary hands playback back to audio.

use super::scrub::ScrubBar;
use crate::coordinator::{Coordinator, VideoLease};
use crate::error::Result;
use crate::media::MediaMode;
use crate::play_head::{PlayHeadObserver, PlayerSnapshot};
use bridge_traits::media::MediaEngine;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FullPlayer {
    coordinator: Arc<Coordinator>,
    observer: PlayHeadObserver,
    lease: Option<VideoLease>,
    scrub: ScrubBar,
    fullscreen: bool,
}

impl FullPlayer {
    /// Mount the player. Without a video engine only audio is offered.
    pub async fn mount(coordinator: Arc<Coordinator>, video_engine: Option<Arc<dyn MediaEngine>>) -> Result<Self> {
        let lease = match video_engine {
            Some(engine) => Some(coordinator.attach_video_surface(engine).await?),
            None => None,
        };

        let mut observer = coordinator.observe();
        let mut scrub = ScrubBar::new();
        scrub.on_play_head(&observer.snapshot_and_mark());

        Ok(Self {
            coordinator,
            observer,
            lease,
            scrub,
            fullscreen: false,
        })
    }

    /// Release the video engine, switching to audio first if it is primary.
    pub async fn unmount(mut self) -> Result<()> {
        match self.lease.take() {
            Some(lease) => self.coordinator.release_video_surface(&lease).await,
            None => Ok(()),
        }
    }

    /// Pull the latest play head. Returns `true` if anything changed.
    pub fn refresh(&mut self) -> bool {
        if !self.observer.has_changed() {
            return false;
        }
        let snapshot = self.observer.snapshot_and_mark();
        if snapshot.media_mode() == MediaMode::Audio {
            self.fullscreen = false;
        }
        self.scrub.on_play_head(&snapshot);
        true
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.observer.snapshot()
    }

    pub fn scrub_bar(&self) -> &ScrubBar {
        &self.scrub
    }

    /// Whether the mode toggle should be offered.
    pub fn can_show_video(&self) -> bool {
        self.lease.is_some()
            && self
                .observer
                .snapshot()
                .episode
                .as_ref()
                .is_some_and(|episode| episode.has_video())
    }

    // ========================================================================
    // Controls
    // ========================================================================

    pub async fn play(&self) -> Result<()> {
        self.coordinator.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        self.coordinator.pause().await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.coordinator.toggle_play_pause().await
    }

    pub async fn skip_forward(&self) -> Result<()> {
        self.coordinator.skip_forward(None).await
    }

    pub async fn skip_backward(&self) -> Result<()> {
        self.coordinator.skip_backward(None).await
    }

    pub async fn cycle_playback_rate(&self) -> Result<f32> {
        self.coordinator.cycle_playback_rate().await
    }

    pub async fn set_media_mode(&self, mode: MediaMode) -> Result<()> {
        self.coordinator.set_media_mode(mode).await
    }

    /// Flip between audio and video.
    pub async fn toggle_media_mode(&self) -> Result<()> {
        let target = self.observer.snapshot().media_mode().other();
        self.coordinator.set_media_mode(target).await
    }

    pub async fn set_quality_level(&self, index: usize) -> Result<bool> {
        self.coordinator.set_quality_level(index).await
    }

    pub async fn set_auto_quality(&self) -> Result<()> {
        self.coordinator.set_auto_quality().await
    }

    /// Fullscreen is only meaningful in video mode. Returns the new state.
    pub fn toggle_fullscreen(&mut self) -> bool {
        if self.observer.snapshot().media_mode() == MediaMode::Video {
            self.fullscreen = !self.fullscreen;
        } else {
            self.fullscreen = false;
        }
        self.fullscreen
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    // ========================================================================
    // Scrubbing
    // ========================================================================

    pub fn begin_scrub(&mut self, at: f64) {
        self.scrub.begin_drag(at);
    }

    pub fn scrub_to(&mut self, at: f64) {
        self.scrub.drag_to(at);
    }

    /// Finish the drag with a single seek. Returns the target, if a drag was active.
    pub async fn end_scrub(&mut self) -> Result<Option<f64>> {
        let Some(target) = self.scrub.release() else {
            return Ok(None);
        };
        self.coordinator.seek(target).await?;
        let snapshot = self.observer.snapshot_and_mark();
        self.scrub.on_play_head(&snapshot);
        Ok(Some(target))
    }
}

impl Drop for FullPlayer {
    fn drop(&mut self) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        lease.cancel();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let coordinator = Arc::clone(&self.coordinator);
                handle.spawn(async move {
                    if let Err(e) = coordinator.release_video_surface(&lease).await {
                        warn!(error = %e, "Releasing video surface after drop failed");
                    }
                });
                debug!("Full player dropped without unmount; release scheduled");
            }
            Err(_) => warn!("Full player dropped outside a runtime; video engine left bound"),
        }
    }
}

impl std::fmt::Debug for FullPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullPlayer")
            .field("lease", &self.lease)
            .field("scrub", &self.scrub)
            .field("fullscreen", &self.fullscreen)
            .finish()
    }
}
