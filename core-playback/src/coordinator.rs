//! # Mode-Switch Coordinator
//!
//! Owns the engine bindings and the play head store, and applies every
//! intent issued by the surfaces.
//!
//! ## Workflow
//!
//! 1. `load_episode` loads the audio engine eagerly and enters `Loaded(audio)`.
//!    The video engine stays unloaded until video is requested.
//! 2. `set_media_mode` hands the primary role to the other engine:
//!    - capture time and play state from the play head
//!    - pause the source engine
//!    - load the target at the captured time, or seek it if it is a shadow
//!    - swap primary and mute the source
//!    - resume the target if playback was running
//! 3. Engine events arrive through the inbox. Only the primary engine moves
//!    the play head.
//! 4. `tick` polls engines whose native time reports went quiet, flushes
//!    throttled updates and reseeks the shadow when it drifts too far.
//!
//! Intents are serialized by an async mutex, so a mode switch requested while
//! another is in flight runs after it completes.

use crate::binding::{Bindings, EngineBinding};
use crate::config::PlayerConfig;
use crate::engine::{engine_inbox, AdapterUpdate, EngineAdapter, EngineEnvelope, EngineInbox, EngineOutbox};
use crate::error::{ErrorKind, PlaybackError, Result};
use crate::media::{Episode, MediaMode, SessionId};
use crate::play_head::{PlayHead, PlayHeadObserver, PlayHeadStore, PlayerError, PlayerPhase, PlayerSnapshot};
use crate::quality::QualitySelection;
use bridge_traits::{
    media::{EngineErrorKind, MediaEngine},
    streaming::ManifestClient,
    time::Clock,
};
use core_runtime::events::{CoreEvent, EventBus, ModeEvent, PlaybackEvent, QualityEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

static NEXT_LEASE: AtomicU64 = AtomicU64::new(1);

fn to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

// ============================================================================
// Video lease
// ============================================================================

/// Handle held by the surface that attached a video engine.
///
/// Cancelling the lease abandons any pending load or play on that engine.
/// The engine itself is released by [`Coordinator::release_video_surface`].
#[derive(Debug, Clone)]
pub struct VideoLease {
    id: u64,
    token: CancellationToken,
}

impl VideoLease {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

// ============================================================================
// Coordinator
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Captured {
    time: f64,
    was_playing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Playing,
    Paused,
    AutoplayBlocked,
}

struct Inner {
    bindings: Bindings,
    store: PlayHeadStore,
    /// Kept across episodes.
    playback_rate: f32,
    video_lease: Option<u64>,
}

impl Inner {
    fn head(&self) -> Result<&PlayHead> {
        self.store.head().ok_or(PlaybackError::NoEpisodeLoaded)
    }

    fn episode(&self) -> Result<Arc<Episode>> {
        self.store
            .state()
            .episode
            .clone()
            .ok_or(PlaybackError::NoEpisodeLoaded)
    }

    fn episode_id(&self) -> Option<String> {
        self.store.head().map(|head| head.episode_id.clone())
    }

    fn phase(&self) -> PlayerPhase {
        self.store.state().phase
    }
}

/// Serializes playback intents and owns the shared play head.
pub struct Coordinator {
    config: PlayerConfig,
    inner: Mutex<Inner>,
    inbox: Mutex<EngineInbox>,
    outbox: EngineOutbox,
    observer: PlayHeadObserver,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    manifest_client: Option<Arc<dyn ManifestClient>>,
    shutdown: CancellationToken,
}

impl Coordinator {
    /// Create a coordinator around the session-owned audio engine.
    ///
    /// `manifest_client` is used for video engines that do not carry their
    /// own streaming client.
    pub fn new(
        config: PlayerConfig,
        audio_engine: Arc<dyn MediaEngine>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
        manifest_client: Option<Arc<dyn ManifestClient>>,
    ) -> Result<Arc<Self>> {
        config.validate().map_err(PlaybackError::Config)?;
        if audio_engine.kind() != MediaMode::Audio {
            return Err(PlaybackError::Config(format!(
                "expected an audio engine, got {}",
                audio_engine.kind()
            )));
        }

        let (outbox, inbox) = engine_inbox();
        let audio = EngineAdapter::new(audio_engine, outbox.clone(), &config);
        let store = PlayHeadStore::new(clock.clone(), config.frame_interval);
        let observer = store.observe();

        Ok(Arc::new(Self {
            inner: Mutex::new(Inner {
                bindings: Bindings::new(EngineBinding::owned(audio)),
                store,
                playback_rate: 1.0,
                video_lease: None,
            }),
            inbox: Mutex::new(inbox),
            outbox,
            observer,
            event_bus,
            clock,
            manifest_client,
            shutdown: CancellationToken::new(),
            config,
        }))
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// A fresh observer of the shared play head.
    pub fn observe(&self) -> PlayHeadObserver {
        self.observer.clone()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.observer.snapshot()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn emit(&self, event: CoreEvent) {
        self.event_bus.emit(event).ok();
    }

    /// Record `error` as the last error and broadcast it.
    fn surface_error(&self, inner: &mut Inner, error: &PlaybackError, enter_error_phase: bool) {
        let player_error = PlayerError::from(error);
        let kind = player_error.kind;
        let episode_id = inner.episode_id();

        inner.store.update(|state| {
            state.last_error = Some(player_error.clone());
            if enter_error_phase {
                state.phase = PlayerPhase::Error {
                    kind: kind.unwrap_or(ErrorKind::SourceLoadFailed),
                };
                if let Some(head) = state.head.as_mut() {
                    head.is_playing = false;
                }
            }
        });

        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            episode_id,
            kind: kind.map_or("playback_failed", ErrorKind::as_str).to_string(),
            message: player_error.message,
            recoverable: player_error.recoverable,
        }));
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Start a session for `episode`, positioned at `start` seconds if given
    /// and positive, else at the episode's resume hint, else at 0.
    #[instrument(skip(self, episode), fields(episode_id = %episode.id))]
    pub async fn load_episode(&self, episode: Episode, start: Option<f64>) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        for adapter in inner.bindings.adapters_mut() {
            if let Err(e) = adapter.unload().await {
                warn!(slot = %adapter.kind(), error = %e, "Failed to release previous source");
            }
        }
        inner.bindings.clear_primary();

        let episode = Arc::new(episode);
        let position = episode.resolve_start_position(start);
        let rate = inner.playback_rate;
        let show_mini_player = inner.store.state().show_mini_player;

        inner.store.reset(show_mini_player);
        inner.store.update(|state| {
            state.session_id = Some(SessionId::new());
            state.episode = Some(episode.clone());
            state.head = Some(PlayHead::new(
                episode.id.clone(),
                position,
                episode.duration_hint(),
                rate,
            ));
        });

        let now = self.clock.instant();
        let audio = inner
            .bindings
            .adapter_mut(MediaMode::Audio)
            .ok_or(PlaybackError::EngineUnavailable(MediaMode::Audio))?;
        audio.set_muted(false).await?;
        audio.set_rate(rate).await?;

        if let Err(e) = audio.load(episode.audio_source(), position, now).await {
            error!(error = %e, "Audio source failed to load");
            self.surface_error(inner, &e, true);
            return Err(e);
        }

        inner.bindings.set_primary(MediaMode::Audio);
        inner.store.update(|state| {
            state.phase = PlayerPhase::Loaded {
                mode: MediaMode::Audio,
            };
        });

        info!(position, has_video = episode.has_video(), "Episode loaded");
        self.emit(CoreEvent::Playback(PlaybackEvent::EpisodeLoaded {
            episode_id: episode.id.clone(),
            title: episode.title.clone(),
            position_ms: to_ms(position),
            duration_ms: to_ms(episode.duration_hint()),
            has_video: episode.has_video(),
        }));

        if self.config.autoplay_on_load {
            self.play_locked(inner).await?;
        }
        Ok(())
    }

    /// Pause and release every engine and return to `Idle`.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let episode_id = inner.episode_id();

        for adapter in inner.bindings.adapters_mut() {
            if let Err(e) = adapter.pause().await {
                debug!(slot = %adapter.kind(), error = %e, "Pause during stop failed");
            }
            if let Err(e) = adapter.unload().await {
                warn!(slot = %adapter.kind(), error = %e, "Unload during stop failed");
            }
        }
        inner.bindings.clear_primary();

        let show_mini_player = inner.store.state().show_mini_player;
        inner.store.reset(show_mini_player);

        if let Some(episode_id) = episode_id {
            info!(%episode_id, "Playback stopped");
            self.emit(CoreEvent::Playback(PlaybackEvent::Stopped { episode_id }));
        }
        Ok(())
    }

    // ========================================================================
    // Transport
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        self.play_locked(&mut guard).await
    }

    async fn play_locked(&self, inner: &mut Inner) -> Result<()> {
        let head = inner.head()?.clone();
        let mode = inner.bindings.primary_mode().unwrap_or(head.media_mode);

        // Recovery: the primary may have lost its source to a failed load.
        let needs_reload = inner
            .bindings
            .adapter(mode)
            .is_some_and(|adapter| !adapter.is_loaded());
        if needs_reload {
            let source = inner
                .episode()?
                .source_for(mode)
                .ok_or(PlaybackError::NoVideoSource)?;
            let now = self.clock.instant();
            let adapter = inner
                .bindings
                .adapter_mut(mode)
                .ok_or(PlaybackError::EngineUnavailable(mode))?;
            if let Err(e) = adapter.load(source, head.current_time, now).await {
                self.surface_error(inner, &e, true);
                return Err(e);
            }
            inner.bindings.set_primary(mode);
        }

        let adapter = inner
            .bindings
            .primary_mut()
            .ok_or(PlaybackError::EngineUnavailable(mode))?;

        // The primary is the only audible engine.
        if adapter.is_muted() {
            if let Err(e) = adapter.set_muted(false).await {
                warn!(slot = %mode, error = %e, "Unmute of primary failed");
            }
        }

        match adapter.play().await {
            Ok(()) => {
                inner.store.update(|state| {
                    state.phase = PlayerPhase::Loaded { mode };
                    state.last_error = None;
                    if let Some(head) = state.head.as_mut() {
                        head.is_playing = true;
                        head.media_mode = mode;
                    }
                });
                self.resume_shadow(inner).await;
                self.emit(CoreEvent::Playback(PlaybackEvent::Started {
                    episode_id: head.episode_id.clone(),
                    position_ms: head.position_ms(),
                }));
                Ok(())
            }
            Err(e) => {
                inner.store.update_head(|head| head.is_playing = false);
                self.surface_error(inner, &e, false);
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn pause(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        self.pause_locked(&mut guard).await
    }

    async fn pause_locked(&self, inner: &mut Inner) -> Result<()> {
        let head = inner.head()?.clone();

        if let Some(adapter) = inner.bindings.primary_mut() {
            adapter.pause().await?;
        }
        if let Some(shadow) = inner.bindings.shadow_mut() {
            if let Err(e) = shadow.pause().await {
                debug!(slot = %shadow.kind(), error = %e, "Shadow pause failed");
            }
        }

        inner.store.update_head(|head| head.is_playing = false);
        self.emit(CoreEvent::Playback(PlaybackEvent::Paused {
            episode_id: head.episode_id.clone(),
            position_ms: head.position_ms(),
        }));
        Ok(())
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        if guard.head()?.is_playing {
            self.pause_locked(&mut guard).await
        } else {
            self.play_locked(&mut guard).await
        }
    }

    /// Keep a loaded shadow running muted alongside the primary.
    async fn resume_shadow(&self, inner: &mut Inner) {
        if let Some(shadow) = inner.bindings.shadow_mut() {
            if let Err(e) = shadow.set_muted(true).await {
                debug!(slot = %shadow.kind(), error = %e, "Shadow mute failed");
                return;
            }
            if let Err(e) = shadow.play().await {
                debug!(slot = %shadow.kind(), error = %e, "Shadow play failed");
            }
        }
    }

    /// Move the play head to `time` seconds, clamped to `[0, duration]`.
    ///
    /// The play head updates immediately; engine reports that still carry the
    /// old position are suppressed while the seek settles.
    #[instrument(skip(self))]
    pub async fn seek(&self, time: f64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        self.seek_locked(&mut guard, time).await
    }

    async fn seek_locked(&self, inner: &mut Inner, time: f64) -> Result<()> {
        let head = inner.head()?.clone();
        let target = head.clamp(time);
        if target != time {
            debug!(requested = time, clamped = target, "Seek target clamped");
        }

        let now = self.clock.instant();
        if let Some(adapter) = inner.bindings.primary_mut() {
            match adapter.seek(target, now).await {
                Ok(()) => {}
                Err(PlaybackError::SeekOutOfRange(position)) => {
                    warn!(position, "Engine rejected seek target; keeping play head");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        if let Some(shadow) = inner.bindings.shadow_mut() {
            if let Err(e) = shadow.seek(target, now).await {
                debug!(slot = %shadow.kind(), error = %e, "Shadow seek failed");
            }
        }

        inner.store.update_head(|head| head.current_time = target);
        self.emit(CoreEvent::Playback(PlaybackEvent::Seeked {
            episode_id: head.episode_id.clone(),
            from_ms: head.position_ms(),
            to_ms: to_ms(target),
        }));
        Ok(())
    }

    /// Seek relative to the current position.
    pub async fn skip_by(&self, seconds: f64) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let target = guard.head()?.current_time + seconds;
        self.seek_locked(&mut guard, target).await
    }

    /// Skip ahead by `seconds`, or by the configured step.
    pub async fn skip_forward(&self, seconds: Option<f64>) -> Result<()> {
        self.skip_by(seconds.unwrap_or(self.config.skip_seconds).abs()).await
    }

    /// Skip back by `seconds`, or by the configured step.
    pub async fn skip_backward(&self, seconds: Option<f64>) -> Result<()> {
        self.skip_by(-seconds.unwrap_or(self.config.skip_seconds).abs()).await
    }

    /// Apply one of the configured rates to every bound engine.
    ///
    /// The rate is kept for later episodes.
    #[instrument(skip(self))]
    pub async fn set_playback_rate(&self, rate: f32) -> Result<()> {
        if !self.config.accepts_rate(rate) {
            return Err(PlaybackError::InvalidPlaybackRate(rate));
        }

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let primary = inner.bindings.primary_mode();
        for adapter in inner.bindings.adapters_mut() {
            match adapter.set_rate(rate).await {
                Ok(()) => {}
                Err(e) if Some(adapter.kind()) == primary => return Err(e),
                Err(e) => debug!(slot = %adapter.kind(), error = %e, "Shadow rate change failed"),
            }
        }

        inner.playback_rate = rate;
        inner.store.update_head(|head| head.playback_rate = rate);

        if let Some(episode_id) = inner.episode_id() {
            self.emit(CoreEvent::Playback(PlaybackEvent::RateChanged { episode_id, rate }));
        }
        Ok(())
    }

    /// Advance to the next rate in the cycle. Returns the new rate.
    pub async fn cycle_playback_rate(&self) -> Result<f32> {
        let current = self.inner.lock().await.playback_rate;
        let next = self.config.next_rate(current);
        self.set_playback_rate(next).await?;
        Ok(next)
    }

    pub async fn set_show_mini_player(&self, visible: bool) {
        let mut guard = self.inner.lock().await;
        if guard.store.state().show_mini_player == visible {
            return;
        }
        guard.store.update(|state| state.show_mini_player = visible);
        self.emit(CoreEvent::Mode(ModeEvent::MiniPlayerVisibilityChanged { visible }));
    }

    // ========================================================================
    // Mode switch
    // ========================================================================

    /// Present the episode as `target`.
    ///
    /// On success the play head stays within the continuity tolerance of its
    /// position at the call and keeps its play state, unless the target
    /// engine refused to autoplay; that case returns
    /// [`PlaybackError::AutoplayBlocked`] with the switch otherwise complete.
    #[instrument(skip(self))]
    pub async fn set_media_mode(&self, target: MediaMode) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let head = inner.head()?.clone();
        let episode = inner.episode()?;
        let current = inner.bindings.primary_mode().unwrap_or(head.media_mode);

        if target == current {
            if matches!(inner.phase(), PlayerPhase::Error { .. }) {
                return self.recover_locked(inner, current).await;
            }
            return Ok(());
        }

        if target == MediaMode::Video && !episode.has_video() {
            return Err(PlaybackError::NoVideoSource);
        }
        if !inner.bindings.is_bound(target) {
            return Err(PlaybackError::EngineUnavailable(target));
        }

        self.switch_locked(inner, current, target).await
    }

    /// Reload the primary if its source is gone and leave the error phase.
    async fn recover_locked(&self, inner: &mut Inner, mode: MediaMode) -> Result<()> {
        let head = inner.head()?.clone();
        let loaded = inner.bindings.adapter(mode).is_some_and(EngineAdapter::is_loaded);
        if !loaded {
            let source = inner
                .episode()?
                .source_for(mode)
                .ok_or(PlaybackError::NoVideoSource)?;
            let now = self.clock.instant();
            let adapter = inner
                .bindings
                .adapter_mut(mode)
                .ok_or(PlaybackError::EngineUnavailable(mode))?;
            if let Err(e) = adapter.load(source, head.current_time, now).await {
                self.surface_error(inner, &e, true);
                return Err(e);
            }
        }
        inner.bindings.set_primary(mode);
        inner.store.update(|state| {
            state.phase = PlayerPhase::Loaded { mode };
            state.last_error = None;
        });
        Ok(())
    }

    async fn switch_locked(&self, inner: &mut Inner, from: MediaMode, to: MediaMode) -> Result<()> {
        let head = inner.head()?.clone();
        let captured = Captured {
            time: head.current_time,
            was_playing: head.is_playing,
        };

        info!(%from, %to, time = captured.time, playing = captured.was_playing, "Switching media mode");
        inner.store.update(|state| state.phase = PlayerPhase::Switching { from, to });
        self.emit(CoreEvent::Mode(ModeEvent::SwitchStarted {
            episode_id: head.episode_id.clone(),
            from,
            to,
            position_ms: head.position_ms(),
        }));

        // Only a switch into video can be abandoned by the surface that owns it.
        let lease = match to {
            MediaMode::Video => inner
                .bindings
                .get(MediaMode::Video)
                .and_then(|binding| binding.lease.clone()),
            MediaMode::Audio => None,
        };

        let outcome = match lease {
            Some(lease) => {
                tokio::select! {
                    biased;
                    _ = lease.cancelled() => Err(PlaybackError::SurfaceDetached),
                    result = self.handoff(inner, from, to, captured) => result,
                }
            }
            None => self.handoff(inner, from, to, captured).await,
        };

        match outcome {
            Ok(resume) => self.finish_switch(inner, to, captured, resume).await,
            Err(PlaybackError::SurfaceDetached) => {
                warn!(%from, %to, "Video surface detached mid-switch; staying on {}", from);
                self.revert_switch(inner, from, to, captured).await;
                Err(PlaybackError::SurfaceDetached)
            }
            Err(e) => {
                error!(%from, %to, error = %e, "Media mode switch failed");
                let e = match e {
                    PlaybackError::ModeSwitchFailed(_) => e,
                    other => PlaybackError::ModeSwitchFailed(other.to_string()),
                };
                self.strand_at_source(inner, from, to, captured).await;
                self.emit(CoreEvent::Mode(ModeEvent::SwitchFailed {
                    episode_id: head.episode_id,
                    from,
                    to,
                    message: e.to_string(),
                }));
                self.surface_error(inner, &e, true);
                Err(e)
            }
        }
    }

    /// Steps 2 to 5 of a switch. Leaves the target primary on success.
    async fn handoff(&self, inner: &mut Inner, from: MediaMode, to: MediaMode, captured: Captured) -> Result<Resume> {
        let source = inner.episode()?.source_for(to).ok_or(PlaybackError::NoVideoSource)?;
        let rate = inner.playback_rate;
        let now = self.clock.instant();

        if let Some(adapter) = inner.bindings.adapter_mut(from) {
            adapter.pause().await?;
        }

        let target = inner
            .bindings
            .adapter_mut(to)
            .ok_or(PlaybackError::EngineUnavailable(to))?;
        if target.is_loaded() {
            debug!(slot = %to, "Promoting shadow");
            target.pause().await?;
            target.seek(captured.time, now).await?;
        } else {
            target.set_rate(rate).await?;
            target
                .load(source, captured.time, now)
                .await
                .map_err(|e| PlaybackError::ModeSwitchFailed(e.to_string()))?;
        }
        target.set_muted(false).await?;

        if let Some(adapter) = inner.bindings.adapter_mut(from) {
            adapter.set_muted(true).await?;
        }
        inner.bindings.set_primary(to);

        if !captured.was_playing {
            return Ok(Resume::Paused);
        }
        let target = inner
            .bindings
            .adapter_mut(to)
            .ok_or(PlaybackError::EngineUnavailable(to))?;
        match target.play().await {
            Ok(()) => Ok(Resume::Playing),
            Err(PlaybackError::AutoplayBlocked) => Ok(Resume::AutoplayBlocked),
            Err(e) => Err(e),
        }
    }

    async fn finish_switch(&self, inner: &mut Inner, to: MediaMode, captured: Captured, resume: Resume) -> Result<()> {
        let tolerance = self.config.continuity_tolerance.as_secs_f64();
        let reported = inner
            .bindings
            .adapter(to)
            .map_or(captured.time, EngineAdapter::position);
        let time = if (reported - captured.time).abs() <= tolerance {
            reported
        } else {
            warn!(reported, captured = captured.time, "Target engine landed outside tolerance");
            captured.time
        };
        let playing = resume == Resume::Playing;

        inner.store.update(|state| {
            state.phase = PlayerPhase::Loaded { mode: to };
            state.last_error = None;
            state.quality = None;
            if let Some(head) = state.head.as_mut() {
                head.media_mode = to;
                head.current_time = head.clamp(time);
                head.is_playing = playing;
            }
        });

        if playing {
            self.resume_shadow(inner).await;
        }
        match to {
            MediaMode::Video => self.refresh_quality_locked(inner).await,
            MediaMode::Audio => {
                if let Some(video) = inner.bindings.adapter_mut(MediaMode::Video) {
                    if let Err(e) = video.reset_quality().await {
                        debug!(error = %e, "Quality reset on leaving video failed");
                    }
                }
            }
        }

        let episode_id = inner.episode_id().unwrap_or_default();
        info!(mode = %to, time, playing, "Media mode switched");
        self.emit(CoreEvent::Mode(ModeEvent::Switched {
            episode_id,
            mode: to,
            position_ms: to_ms(time),
            playing,
        }));

        if resume == Resume::AutoplayBlocked {
            let e = PlaybackError::AutoplayBlocked;
            self.surface_error(inner, &e, false);
            return Err(e);
        }
        Ok(())
    }

    /// Undo a switch whose target surface went away; playback continues on `from`.
    async fn revert_switch(&self, inner: &mut Inner, from: MediaMode, to: MediaMode, captured: Captured) {
        if let Some(target) = inner.bindings.adapter_mut(to) {
            if let Err(e) = target.unload().await {
                debug!(slot = %to, error = %e, "Unload of detached engine failed");
            }
        }
        inner.bindings.set_primary(from);

        let mut playing = false;
        if let Some(source) = inner.bindings.adapter_mut(from) {
            if let Err(e) = source.set_muted(false).await {
                warn!(slot = %from, error = %e, "Unmute after revert failed");
            }
            if captured.was_playing {
                playing = source.play().await.is_ok();
            }
        }

        inner.store.update(|state| {
            state.phase = PlayerPhase::Loaded { mode: from };
            state.quality = None;
            if let Some(head) = state.head.as_mut() {
                head.media_mode = from;
                head.is_playing = playing;
            }
        });
    }

    /// Leave the source paused at the captured time after a failed switch.
    async fn strand_at_source(&self, inner: &mut Inner, from: MediaMode, to: MediaMode, captured: Captured) {
        let now = self.clock.instant();

        if let Some(target) = inner.bindings.adapter_mut(to) {
            if let Err(e) = target.pause().await {
                debug!(slot = %to, error = %e, "Pause of failed target failed");
            }
            if let Err(e) = target.set_muted(true).await {
                debug!(slot = %to, error = %e, "Mute of failed target failed");
            }
        }
        inner.bindings.set_primary(from);

        if let Some(source) = inner.bindings.adapter_mut(from) {
            if let Err(e) = source.set_muted(false).await {
                warn!(slot = %from, error = %e, "Unmute after failed switch failed");
            }
            if source.is_loaded() && (source.position() - captured.time).abs() > f64::EPSILON {
                if let Err(e) = source.seek(captured.time, now).await {
                    warn!(slot = %from, error = %e, "Seek back after failed switch failed");
                }
            }
        }

        inner.store.update(|state| {
            state.quality = None;
            if let Some(head) = state.head.as_mut() {
                head.media_mode = from;
                head.current_time = head.clamp(captured.time);
                head.is_playing = false;
            }
        });
    }

    // ========================================================================
    // Video surface lifecycle
    // ========================================================================

    /// Bind the video engine owned by a Full Player.
    ///
    /// A previously attached engine is released first.
    #[instrument(skip(self, engine))]
    pub async fn attach_video_surface(&self, engine: Arc<dyn MediaEngine>) -> Result<VideoLease> {
        if engine.kind() != MediaMode::Video {
            return Err(PlaybackError::Config(format!(
                "expected a video engine, got {}",
                engine.kind()
            )));
        }

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        if let Some(previous) = inner.video_lease {
            debug!(lease = previous, "Replacing attached video surface");
            if inner.bindings.is_primary(MediaMode::Video) {
                if let Err(e) = self.switch_locked(inner, MediaMode::Video, MediaMode::Audio).await {
                    warn!(error = %e, "Hand-off to audio before surface replacement failed");
                }
            }
            self.detach_video_locked(inner).await;
        }

        let client = engine.manifest_client().or_else(|| self.manifest_client.clone());
        let adapter = EngineAdapter::new(engine, self.outbox.clone(), &self.config).with_manifest_client(client);

        let lease = VideoLease {
            id: NEXT_LEASE.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        inner
            .bindings
            .bind(EngineBinding::leased(adapter, lease.token.clone()));
        inner.video_lease = Some(lease.id);

        info!(lease = lease.id, "Video surface attached");
        Ok(lease)
    }

    /// Release the video engine of an unmounted Full Player.
    ///
    /// While video is primary this first switches back to audio at the same
    /// position and play state. Stale leases are ignored.
    #[instrument(skip(self, lease), fields(lease = lease.id))]
    pub async fn release_video_surface(&self, lease: &VideoLease) -> Result<()> {
        lease.cancel();

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if inner.video_lease != Some(lease.id) {
            debug!("Ignoring stale video lease");
            return Ok(());
        }

        let result = if inner.bindings.is_primary(MediaMode::Video) {
            info!("Video surface unmounted while primary; handing off to audio");
            self.switch_locked(inner, MediaMode::Video, MediaMode::Audio).await
        } else {
            Ok(())
        };

        self.detach_video_locked(inner).await;
        result
    }

    async fn detach_video_locked(&self, inner: &mut Inner) {
        if let Some(binding) = inner.bindings.get(MediaMode::Video) {
            if let Some(lease) = &binding.lease {
                lease.cancel();
            }
        }

        // Never strand the session without an audible engine.
        if inner.bindings.is_primary(MediaMode::Video) {
            let time = inner.store.head().map_or(0.0, |head| head.current_time);
            let now = self.clock.instant();
            inner.bindings.set_primary(MediaMode::Audio);
            if let Some(audio) = inner.bindings.adapter_mut(MediaMode::Audio) {
                if let Err(e) = audio.pause().await {
                    debug!(error = %e, "Pause of promoted audio engine failed");
                }
                if let Err(e) = audio.set_muted(false).await {
                    warn!(error = %e, "Unmute of promoted audio engine failed");
                }
                if audio.is_loaded() && (audio.position() - time).abs() > f64::EPSILON {
                    if let Err(e) = audio.seek(time, now).await {
                        warn!(error = %e, "Seek of promoted audio engine failed");
                    }
                }
            }
            inner.store.update_head(|head| {
                head.media_mode = MediaMode::Audio;
                head.is_playing = false;
            });
        }

        if let Some(mut binding) = inner.bindings.unbind(MediaMode::Video) {
            if let Err(e) = binding.adapter.pause().await {
                debug!(error = %e, "Pause of detached video engine failed");
            }
            if let Err(e) = binding.adapter.unload().await {
                warn!(error = %e, "Unload of detached video engine failed");
            }
        }
        inner.video_lease = None;
        inner.store.update(|state| state.quality = None);
    }

    // ========================================================================
    // Quality
    // ========================================================================

    async fn refresh_quality_locked(&self, inner: &mut Inner) {
        let Some(adapter) = inner.bindings.adapter_mut(MediaMode::Video) else {
            return;
        };

        match adapter.refresh_quality().await {
            Ok(Some(selection)) => {
                let episode_id = inner.episode_id().unwrap_or_default();
                self.emit(CoreEvent::Quality(QualityEvent::LevelsChanged {
                    episode_id,
                    levels: selection.level_names(),
                }));
                inner.store.update(|state| state.quality = Some(selection));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Quality ladder unavailable");
                let episode_id = inner.episode_id().unwrap_or_default();
                self.emit(CoreEvent::Quality(QualityEvent::ManifestError {
                    episode_id,
                    message: e.to_string(),
                }));
                self.surface_error(inner, &e, false);
            }
        }
    }

    fn video_quality_ready(inner: &Inner) -> bool {
        inner.bindings.is_primary(MediaMode::Video)
            && inner
                .bindings
                .adapter(MediaMode::Video)
                .is_some_and(EngineAdapter::supports_quality)
    }

    /// Pin the level at `index` of the published ladder.
    ///
    /// Returns `Ok(false)` when the index no longer exists.
    #[instrument(skip(self))]
    pub async fn set_quality_level(&self, index: usize) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if !Self::video_quality_ready(inner) {
            return Err(PlaybackError::QualityUnavailable);
        }

        let quality = inner
            .bindings
            .adapter_mut(MediaMode::Video)
            .and_then(EngineAdapter::quality_mut)
            .ok_or(PlaybackError::QualityUnavailable)?;
        let changed = quality.set_level(index).await?;
        let selection = quality.selection().clone();

        if changed {
            self.publish_selection(inner, selection);
        }
        Ok(changed)
    }

    /// Hand level selection back to the streaming client.
    #[instrument(skip(self))]
    pub async fn set_auto_quality(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if !Self::video_quality_ready(inner) {
            return Err(PlaybackError::QualityUnavailable);
        }

        let quality = inner
            .bindings
            .adapter_mut(MediaMode::Video)
            .and_then(EngineAdapter::quality_mut)
            .ok_or(PlaybackError::QualityUnavailable)?;
        quality.set_auto().await?;
        let selection = quality.selection().clone();

        self.publish_selection(inner, selection);
        Ok(())
    }

    fn publish_selection(&self, inner: &mut Inner, selection: QualitySelection) {
        let episode_id = inner.episode_id().unwrap_or_default();
        self.emit(CoreEvent::Quality(QualityEvent::LevelSelected {
            episode_id,
            index: selection.current_level_index,
            name: selection.current_level().map(|level| level.name.clone()),
        }));
        inner.store.update(|state| state.quality = Some(selection));
    }

    // ========================================================================
    // Engine events
    // ========================================================================

    /// Apply one engine notification.
    pub async fn handle_engine_event(&self, envelope: EngineEnvelope) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let now = self.clock.instant();
        let slot = envelope.slot;

        let Some(adapter) = inner.bindings.adapter_mut(slot) else {
            return;
        };
        let Some(update) = adapter.accept_event(envelope, now) else {
            return;
        };

        if !inner.bindings.is_primary(slot) {
            if let AdapterUpdate::Error { kind, message } = update {
                warn!(%slot, ?kind, %message, "Shadow engine failed");
            }
            return;
        }

        match update {
            AdapterUpdate::Time(position) => {
                inner.store.report_time(position);
            }
            AdapterUpdate::Duration(duration) => {
                inner.store.update_head(|head| {
                    head.apply_duration(duration);
                });
            }
            AdapterUpdate::Playing(playing) => {
                let Ok(head) = inner.head().cloned() else {
                    return;
                };
                if head.is_playing == playing {
                    return;
                }
                inner.store.update_head(|head| head.is_playing = playing);
                let event = if playing {
                    PlaybackEvent::Started {
                        episode_id: head.episode_id.clone(),
                        position_ms: head.position_ms(),
                    }
                } else {
                    PlaybackEvent::Paused {
                        episode_id: head.episode_id.clone(),
                        position_ms: head.position_ms(),
                    }
                };
                self.emit(CoreEvent::Playback(event));
            }
            AdapterUpdate::Ended => {
                inner.store.update_head(|head| {
                    if head.duration > 0.0 {
                        head.current_time = head.duration;
                    }
                    head.is_playing = false;
                });
                if let Some(shadow) = inner.bindings.shadow_mut() {
                    if let Err(e) = shadow.pause().await {
                        debug!(error = %e, "Shadow pause at end failed");
                    }
                }
                if let Some(episode_id) = inner.episode_id() {
                    info!(%episode_id, "Episode completed");
                    self.emit(CoreEvent::Playback(PlaybackEvent::Completed { episode_id }));
                }
            }
            AdapterUpdate::Error { kind, message } => {
                let (error, fatal) = match kind {
                    EngineErrorKind::AutoplayBlocked => (PlaybackError::AutoplayBlocked, false),
                    EngineErrorKind::SourceLoadFailed => (PlaybackError::SourceLoadFailed(message), true),
                    _ => (PlaybackError::PlaybackFailed(message), true),
                };
                if fatal {
                    error!(%slot, error = %error, "Primary engine failed");
                } else {
                    inner.store.update_head(|head| head.is_playing = false);
                }
                self.surface_error(inner, &error, fatal);
            }
        }
    }

    /// Drain the inbox without blocking. Returns the number of envelopes
    /// handled, or 0 while the event pump owns the inbox.
    pub async fn process_pending_events(&self) -> usize {
        let Ok(mut inbox) = self.inbox.try_lock() else {
            return 0;
        };

        let mut handled = 0;
        while let Ok(envelope) = inbox.try_recv() {
            self.handle_engine_event(envelope).await;
            handled += 1;
        }
        handled
    }

    /// Housekeeping run every `tick_interval`.
    pub async fn tick(&self) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if !matches!(inner.phase(), PlayerPhase::Loaded { .. }) {
            inner.store.flush();
            return;
        }
        let now = self.clock.instant();

        if let Some(primary) = inner.bindings.primary_mut() {
            match primary.poll_position(now, self.config.poll_fallback_after).await {
                Ok(Some(position)) => {
                    inner.store.report_time(position);
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, "Position poll failed"),
            }
        }
        inner.store.flush();

        let Some(time) = inner.store.head().map(|head| head.current_time) else {
            return;
        };
        let tolerance = self.config.drift_tolerance.as_secs_f64();
        if let Some(shadow) = inner.bindings.shadow_mut() {
            // Shadows that stopped reporting time are read directly.
            if let Err(e) = shadow.poll_position(now, self.config.poll_fallback_after).await {
                debug!(slot = %shadow.kind(), error = %e, "Shadow position poll failed");
            }
            let drift = (shadow.position() - time).abs();
            if drift > tolerance {
                debug!(slot = %shadow.kind(), drift, "Resyncing shadow engine");
                if let Err(e) = shadow.seek(time, now).await {
                    debug!(error = %e, "Shadow resync failed");
                }
            }
        }
    }

    // ========================================================================
    // Background tasks
    // ========================================================================

    /// Route engine events to [`handle_engine_event`](Self::handle_engine_event)
    /// until shutdown.
    pub fn spawn_event_pump(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut inbox = coordinator.inbox.lock().await;
            loop {
                tokio::select! {
                    _ = coordinator.shutdown.cancelled() => break,
                    envelope = inbox.recv() => match envelope {
                        Some(envelope) => coordinator.handle_engine_event(envelope).await,
                        None => break,
                    },
                }
            }
            debug!("Engine event pump stopped");
        })
    }

    /// Run [`tick`](Self::tick) every `tick_interval` until shutdown.
    pub fn spawn_ticker(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let period = self.config.tick_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = coordinator.shutdown.cancelled() => break,
                    _ = interval.tick() => coordinator.tick().await,
                }
            }
            debug!("Play head ticker stopped");
        })
    }

    /// Stop background tasks. Engines are left as they are; call
    /// [`stop`](Self::stop) first to release them.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
