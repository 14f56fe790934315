//! Shared fixtures for the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::media::{EngineEvent, EngineEventSink, MediaEngine, MediaKind, MediaSource};
use bridge_traits::streaming::{ManifestClient, ManifestLevel};
use bridge_traits::time::ManualClock;
use core_playback::{Coordinator, Episode, PlayerConfig};
use core_runtime::events::{CoreEvent, EventBus};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;

// ============================================================================
// Mock engine
// ============================================================================

pub struct MockState {
    pub source: Option<MediaSource>,
    pub position: Duration,
    pub playing: bool,
    pub muted: bool,
    pub rate: f32,
    pub seeks: Vec<Duration>,
    pub loads: usize,
    pub plays: usize,
    pub unloads: usize,
    pub fail_load: bool,
    pub block_autoplay: bool,
    pub load_delay: Option<Duration>,
    pub sink: Option<Arc<dyn EngineEventSink>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            source: None,
            position: Duration::ZERO,
            playing: false,
            muted: false,
            rate: 1.0,
            seeks: Vec::new(),
            loads: 0,
            plays: 0,
            unloads: 0,
            fail_load: false,
            block_autoplay: false,
            load_delay: None,
            sink: None,
        }
    }
}

/// In-memory engine that records every call.
pub struct MockEngine {
    kind: MediaKind,
    state: Arc<Mutex<MockState>>,
    manifest: Option<Arc<dyn ManifestClient>>,
}

impl MockEngine {
    pub fn new(kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            state: Arc::new(Mutex::new(MockState::default())),
            manifest: None,
        })
    }

    pub fn audio() -> Arc<Self> {
        Self::new(MediaKind::Audio)
    }

    pub fn video() -> Arc<Self> {
        Self::new(MediaKind::Video)
    }

    pub fn video_with_manifest(client: Arc<dyn ManifestClient>) -> Arc<Self> {
        Arc::new(Self {
            kind: MediaKind::Video,
            state: Arc::new(Mutex::new(MockState::default())),
            manifest: Some(client),
        })
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn position_secs(&self) -> f64 {
        self.state().position.as_secs_f64()
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn is_muted(&self) -> bool {
        self.state().muted
    }

    pub fn is_loaded(&self) -> bool {
        self.state().source.is_some()
    }

    pub fn seeks_secs(&self) -> Vec<f64> {
        self.state().seeks.iter().map(Duration::as_secs_f64).collect()
    }

    pub fn sink(&self) -> Option<Arc<dyn EngineEventSink>> {
        self.state().sink.clone()
    }

    pub fn emit(&self, event: EngineEvent) {
        let sink = self.sink();
        if let Some(sink) = sink {
            sink.emit(event);
        }
    }

    /// Advance the native position and report it.
    pub fn report_time(&self, seconds: f64) {
        let position = Duration::from_secs_f64(seconds);
        self.state().position = position;
        self.emit(EngineEvent::TimeUpdate { position });
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn attach(&self, sink: Arc<dyn EngineEventSink>) {
        self.state().sink = Some(sink);
    }

    fn manifest_client(&self) -> Option<Arc<dyn ManifestClient>> {
        self.manifest.clone()
    }

    async fn load(&self, source: MediaSource, start_position: Duration) -> BridgeResult<()> {
        let delay = self.state().load_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.loads += 1;
        if state.fail_load {
            return Err(BridgeError::LoadFailed(format!("404 for {}", source.url)));
        }
        state.source = Some(source);
        state.position = start_position;
        state.playing = false;
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        let mut state = self.state();
        if state.block_autoplay {
            return Err(BridgeError::AutoplayBlocked);
        }
        state.playing = true;
        state.plays += 1;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.state().playing = false;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        let mut state = self.state();
        state.position = position;
        state.seeks.push(position);
        Ok(())
    }

    async fn set_rate(&self, rate: f32) -> BridgeResult<()> {
        self.state().rate = rate;
        Ok(())
    }

    async fn set_muted(&self, muted: bool) -> BridgeResult<()> {
        self.state().muted = muted;
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(self.state().position)
    }

    async fn unload(&self) -> BridgeResult<()> {
        let mut state = self.state();
        state.source = None;
        state.playing = false;
        state.unloads += 1;
        Ok(())
    }
}

// ============================================================================
// Mock streaming client
// ============================================================================

/// Streaming client with a fixed ladder that records level selections.
pub struct StaticManifest {
    levels: Vec<ManifestLevel>,
    selections: Mutex<Vec<Option<usize>>>,
}

impl StaticManifest {
    pub fn new(levels: Vec<ManifestLevel>) -> Arc<Self> {
        Arc::new(Self {
            levels,
            selections: Mutex::new(Vec::new()),
        })
    }

    pub fn selections(&self) -> Vec<Option<usize>> {
        self.selections.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestClient for StaticManifest {
    async fn load_manifest(&self, _source: MediaSource) -> BridgeResult<Vec<ManifestLevel>> {
        Ok(self.levels.clone())
    }

    async fn select_level(&self, index: Option<usize>) -> BridgeResult<()> {
        self.selections.lock().unwrap().push(index);
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub audio: Arc<MockEngine>,
    pub clock: Arc<ManualClock>,
    pub events: broadcast::Receiver<CoreEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default())
    }

    pub fn with_config(config: PlayerConfig) -> Self {
        let audio = MockEngine::audio();
        let clock = Arc::new(ManualClock::new());
        let event_bus = Arc::new(EventBus::new(256));
        let events = event_bus.subscribe();

        let coordinator = Coordinator::new(config, audio.clone(), clock.clone(), event_bus, None)
            .expect("valid coordinator");

        Self {
            coordinator,
            audio,
            clock,
            events,
        }
    }

    /// Let a frame elapse, then apply queued engine events.
    pub async fn pump(&self) -> usize {
        self.clock.advance(Duration::from_millis(20));
        self.coordinator.process_pending_events().await
    }

    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub const AUDIO_URL: &str = "https://cdn.example.com/shows/deep-dive/ep-42.mp3";
pub const VIDEO_URL: &str = "https://cdn.example.com/shows/deep-dive/ep-42-720.mp4";
pub const HLS_URL: &str = "https://cdn.example.com/shows/deep-dive/ep-42/master.m3u8";

/// 90 minute episode with a progressive video rendition.
pub fn episode() -> Episode {
    Episode::new("ep-42", AUDIO_URL)
        .with_title("Deep Dive #42")
        .with_duration(5400.0)
        .with_image_url("https://cdn.example.com/shows/deep-dive/cover.jpg")
        .with_alternate_source(MediaSource::video(VIDEO_URL, "video/mp4").with_height(720))
}

pub fn audio_only_episode() -> Episode {
    Episode::new("ep-7", "https://cdn.example.com/shows/deep-dive/ep-7.mp3").with_duration(1800.0)
}

pub fn hls_episode() -> Episode {
    Episode::new("ep-43", AUDIO_URL)
        .with_duration(3600.0)
        .with_alternate_source(MediaSource::video(HLS_URL, "application/x-mpegURL"))
}

pub fn ladder() -> Vec<ManifestLevel> {
    vec![
        ManifestLevel::new(0, 360, 800_000),
        ManifestLevel::new(1, 720, 2_500_000),
        ManifestLevel::new(2, 1080, 5_000_000),
    ]
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}
