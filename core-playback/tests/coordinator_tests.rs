//! Coordinator state machine tests against recording mock engines.

mod common;

use bridge_traits::media::{EngineErrorKind, EngineEvent};
use common::*;
use core_playback::{ErrorKind, FullPlayer, MediaMode, PlaybackError, PlayerConfig, PlayerPhase};
use core_runtime::events::{CoreEvent, ModeEvent, PlaybackEvent};
use std::time::Duration;

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn load_resumes_from_last_played_position() {
    let h = Harness::new();
    let episode = episode().with_last_played_position(420.0);

    h.coordinator.load_episode(episode, None).await.unwrap();

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.current_time(), 420.0);
    assert_eq!(snapshot.duration(), 5400.0);
    assert!(!snapshot.is_playing());
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Audio });
    assert_eq!(h.audio.position_secs(), 420.0);
    assert_eq!(h.audio.state().loads, 1);
}

#[tokio::test]
async fn explicit_start_position_wins_over_resume_hint() {
    let h = Harness::new();
    let episode = episode().with_last_played_position(420.0);

    h.coordinator.load_episode(episode, Some(90.0)).await.unwrap();

    assert_eq!(h.coordinator.snapshot().current_time(), 90.0);
}

#[tokio::test]
async fn video_is_not_loaded_until_requested() {
    let h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), None).await.unwrap();

    assert_eq!(video.state().loads, 0);
    assert!(h.audio.is_loaded());
}

#[tokio::test]
async fn failed_audio_load_enters_error_phase() {
    let mut h = Harness::new();
    h.audio.state().fail_load = true;

    let err = h.coordinator.load_episode(episode(), None).await.unwrap_err();
    assert!(matches!(err, PlaybackError::SourceLoadFailed(_)));

    let snapshot = h.coordinator.snapshot();
    assert_eq!(
        snapshot.phase,
        PlayerPhase::Error {
            kind: ErrorKind::SourceLoadFailed
        }
    );
    assert!(snapshot.last_error.is_some());

    let events = h.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, CoreEvent::Playback(PlaybackEvent::Error { kind, .. }) if kind == "source_load_failed")));

    // The user can retry once the source is reachable.
    h.audio.state().fail_load = false;
    h.coordinator.play().await.unwrap();
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Audio });
    assert!(snapshot.is_playing());
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test]
async fn play_and_pause_follow_the_primary_engine() {
    let mut h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();
    h.drain_events();

    h.coordinator.play().await.unwrap();
    assert!(h.coordinator.snapshot().is_playing());
    assert!(h.audio.is_playing());

    h.coordinator.toggle_play_pause().await.unwrap();
    assert!(!h.coordinator.snapshot().is_playing());
    assert!(!h.audio.is_playing());

    let events = h.drain_events();
    assert!(matches!(events[0], CoreEvent::Playback(PlaybackEvent::Started { .. })));
    assert!(matches!(events[1], CoreEvent::Playback(PlaybackEvent::Paused { .. })));
}

#[tokio::test]
async fn intents_without_an_episode_are_rejected() {
    let h = Harness::new();

    assert!(matches!(h.coordinator.play().await, Err(PlaybackError::NoEpisodeLoaded)));
    assert!(matches!(h.coordinator.seek(10.0).await, Err(PlaybackError::NoEpisodeLoaded)));
    assert!(matches!(
        h.coordinator.set_media_mode(MediaMode::Video).await,
        Err(PlaybackError::NoEpisodeLoaded)
    ));
}

#[tokio::test]
async fn repeated_seek_settles_once_without_overshoot() {
    let h = Harness::new();
    h.coordinator.load_episode(episode(), Some(12.0)).await.unwrap();
    h.coordinator.play().await.unwrap();

    h.coordinator.seek(30.0).await.unwrap();
    h.coordinator.seek(30.0).await.unwrap();
    assert_eq!(h.audio.seeks_secs(), vec![30.0]);
    assert_eq!(h.coordinator.snapshot().current_time(), 30.0);

    // A report from before the seek landed must not drag the head back.
    h.audio.emit(EngineEvent::TimeUpdate {
        position: Duration::from_secs(12),
    });
    h.pump().await;
    assert_eq!(h.coordinator.snapshot().current_time(), 30.0);

    h.audio.report_time(30.25);
    h.pump().await;
    assert_eq!(h.coordinator.snapshot().current_time(), 30.25);
}

#[tokio::test]
async fn skip_clamps_to_episode_bounds() {
    let h = Harness::new();
    h.coordinator.load_episode(episode(), Some(5395.0)).await.unwrap();

    h.coordinator.skip_forward(Some(15.0)).await.unwrap();
    assert_eq!(h.coordinator.snapshot().current_time(), 5400.0);

    h.coordinator.seek(5.0).await.unwrap();
    h.coordinator.skip_backward(None).await.unwrap();
    assert_eq!(h.coordinator.snapshot().current_time(), 0.0);

    h.coordinator.seek(-40.0).await.unwrap();
    assert_eq!(h.coordinator.snapshot().current_time(), 0.0);
}

#[tokio::test]
async fn playback_rate_cycles_and_survives_episode_change() {
    let h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();

    assert!(matches!(
        h.coordinator.set_playback_rate(1.1).await,
        Err(PlaybackError::InvalidPlaybackRate(_))
    ));

    h.coordinator.set_playback_rate(1.5).await.unwrap();
    assert_eq!(h.audio.state().rate, 1.5);
    assert_eq!(h.coordinator.cycle_playback_rate().await.unwrap(), 2.0);
    assert_eq!(h.coordinator.cycle_playback_rate().await.unwrap(), 0.5);
    h.coordinator.set_playback_rate(1.5).await.unwrap();

    h.coordinator.load_episode(audio_only_episode(), None).await.unwrap();
    assert_eq!(h.coordinator.snapshot().playback_rate(), 1.5);
    assert_eq!(h.audio.state().rate, 1.5);
}

#[tokio::test]
async fn stop_releases_engines_and_returns_to_idle() {
    let mut h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();
    h.coordinator.play().await.unwrap();
    h.drain_events();

    h.coordinator.stop().await.unwrap();

    let snapshot = h.coordinator.snapshot();
    assert!(snapshot.phase.is_idle());
    assert!(snapshot.head.is_none());
    assert!(!h.audio.is_loaded());
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, CoreEvent::Playback(PlaybackEvent::Stopped { .. }))));
}

// ============================================================================
// Engine events
// ============================================================================

#[tokio::test]
async fn events_from_a_superseded_load_are_dropped() {
    let h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();
    let stale_sink = h.audio.sink().unwrap();

    h.coordinator.load_episode(audio_only_episode(), None).await.unwrap();
    stale_sink.emit(EngineEvent::TimeUpdate {
        position: Duration::from_secs(77),
    });
    h.pump().await;

    assert_eq!(h.coordinator.snapshot().current_time(), 0.0);
}

#[tokio::test]
async fn ended_moves_head_to_duration() {
    let mut h = Harness::new();
    h.coordinator.load_episode(episode(), Some(5390.0)).await.unwrap();
    h.coordinator.play().await.unwrap();
    h.drain_events();

    h.audio.emit(EngineEvent::Ended);
    h.pump().await;

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.current_time(), 5400.0);
    assert!(!snapshot.is_playing());
    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, CoreEvent::Playback(PlaybackEvent::Completed { .. }))));
}

#[tokio::test]
async fn engine_error_enters_error_phase_and_play_recovers() {
    let h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();
    h.coordinator.play().await.unwrap();

    h.audio.emit(EngineEvent::Error {
        kind: EngineErrorKind::SourceLoadFailed,
        message: "connection reset".into(),
    });
    h.pump().await;

    let snapshot = h.coordinator.snapshot();
    assert_eq!(
        snapshot.phase,
        PlayerPhase::Error {
            kind: ErrorKind::SourceLoadFailed
        }
    );
    assert!(!snapshot.is_playing());

    h.coordinator.play().await.unwrap();
    assert_eq!(
        h.coordinator.snapshot().phase,
        PlayerPhase::Loaded { mode: MediaMode::Audio }
    );
}

#[tokio::test]
async fn duration_reports_refine_the_head() {
    let h = Harness::new();
    h.coordinator.load_episode(audio_only_episode(), None).await.unwrap();

    h.audio.emit(EngineEvent::DurationKnown {
        duration: Duration::from_secs_f64(1799.5),
    });
    h.pump().await;

    assert_eq!(h.coordinator.snapshot().duration(), 1799.5);
}

#[tokio::test]
async fn ticker_polls_when_native_reports_go_quiet() {
    let h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();
    h.coordinator.play().await.unwrap();

    h.audio.state().position = Duration::from_secs(42);
    h.clock.advance(Duration::from_millis(500));
    h.coordinator.tick().await;
    assert_eq!(h.coordinator.snapshot().current_time(), 0.0);

    h.clock.advance(Duration::from_millis(500));
    h.coordinator.tick().await;
    assert_eq!(h.coordinator.snapshot().current_time(), 42.0);
}

// ============================================================================
// Mode switching
// ============================================================================

#[tokio::test]
async fn switch_to_video_preserves_position_and_play_state() {
    let mut h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();
    h.drain_events();

    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.media_mode(), MediaMode::Video);
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Video });
    assert!(snapshot.is_playing());
    assert_close(snapshot.current_time(), 120.0, 2.0);

    assert_close(video.position_secs(), 120.0, 2.0);
    assert!(video.is_playing());
    assert!(!video.is_muted());
    assert!(h.audio.is_muted());

    let events = h.drain_events();
    assert!(matches!(events[0], CoreEvent::Mode(ModeEvent::SwitchStarted { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::Mode(ModeEvent::Switched {
            mode: MediaMode::Video,
            playing: true,
            ..
        })
    )));
}

#[tokio::test]
async fn round_trip_returns_near_the_switch_point() {
    let h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();
    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();

    video.report_time(124.0);
    h.pump().await;

    h.coordinator.set_media_mode(MediaMode::Audio).await.unwrap();

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.media_mode(), MediaMode::Audio);
    assert!(snapshot.is_playing());
    assert!(snapshot.current_time() >= 120.0);
    assert_close(snapshot.current_time(), 124.0, 2.0);

    assert!(h.audio.is_playing());
    assert!(!h.audio.is_muted());
    assert_close(h.audio.position_secs(), 124.0, 2.0);
    assert!(video.is_muted());
    assert_eq!(video.state().loads, 1);
}

#[tokio::test]
async fn shadow_time_reports_do_not_move_the_head() {
    let h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();

    h.audio.report_time(999.0);
    h.pump().await;

    assert_eq!(h.coordinator.snapshot().current_time(), 120.0);
}

#[tokio::test]
async fn ticker_resyncs_a_drifting_shadow() {
    let h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();
    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();
    let seeks_before = h.audio.seeks_secs().len();

    video.report_time(121.0);
    h.pump().await;
    h.coordinator.tick().await;
    assert_eq!(h.audio.seeks_secs().len(), seeks_before);

    video.report_time(125.0);
    h.pump().await;
    h.coordinator.tick().await;
    assert_eq!(h.audio.seeks_secs().last().copied(), Some(125.0));
}

#[tokio::test]
async fn quiet_shadow_is_read_before_resync() {
    let h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();
    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();
    let seeks_before = h.audio.seeks_secs().len();

    // The muted audio engine keeps up but never reports time.
    h.audio.state().position = Duration::from_secs(124);
    h.clock.advance(Duration::from_secs(1));
    video.report_time(124.0);
    h.pump().await;
    h.coordinator.tick().await;

    assert_eq!(h.audio.seeks_secs().len(), seeks_before);
}

#[tokio::test]
async fn paused_switch_stays_paused() {
    let h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(60.0)).await.unwrap();
    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();

    assert!(!h.coordinator.snapshot().is_playing());
    assert!(!video.is_playing());
    assert_eq!(video.state().plays, 0);
}

#[tokio::test]
async fn autoplay_block_completes_switch_but_reports_paused() {
    let h = Harness::new();
    let video = MockEngine::video();
    video.state().block_autoplay = true;
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();

    let err = h.coordinator.set_media_mode(MediaMode::Video).await.unwrap_err();
    assert!(matches!(err, PlaybackError::AutoplayBlocked));

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Video });
    assert!(!snapshot.is_playing());
    assert_eq!(snapshot.last_error.unwrap().kind, Some(ErrorKind::AutoplayBlocked));
    assert!(!h.audio.is_playing());

    // A user gesture play() succeeds.
    video.state().block_autoplay = false;
    h.coordinator.play().await.unwrap();
    assert!(h.coordinator.snapshot().is_playing());
    assert!(video.is_playing());
}

#[tokio::test]
async fn failed_switch_leaves_source_paused_at_captured_time() {
    let mut h = Harness::new();
    let video = MockEngine::video();
    video.state().fail_load = true;
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();
    h.drain_events();

    let err = h.coordinator.set_media_mode(MediaMode::Video).await.unwrap_err();
    assert!(matches!(err, PlaybackError::ModeSwitchFailed(_)));

    let snapshot = h.coordinator.snapshot();
    assert_eq!(
        snapshot.phase,
        PlayerPhase::Error {
            kind: ErrorKind::ModeSwitchFailed
        }
    );
    assert_eq!(snapshot.media_mode(), MediaMode::Audio);
    assert_eq!(snapshot.current_time(), 120.0);
    assert!(!snapshot.is_playing());
    assert!(!h.audio.is_playing());
    assert!(!h.audio.is_muted());
    assert_eq!(h.audio.position_secs(), 120.0);

    assert!(h
        .drain_events()
        .iter()
        .any(|e| matches!(e, CoreEvent::Mode(ModeEvent::SwitchFailed { .. }))));

    // Retry play() on the source.
    h.coordinator.play().await.unwrap();
    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Audio });
    assert!(snapshot.is_playing());

    // Or retry the switch once the rendition is reachable.
    video.state().fail_load = false;
    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();
    assert_eq!(h.coordinator.snapshot().media_mode(), MediaMode::Video);
}

#[tokio::test]
async fn video_request_without_rendition_is_rejected() {
    let h = Harness::new();
    let video = MockEngine::video();
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();
    h.coordinator.load_episode(audio_only_episode(), None).await.unwrap();

    let err = h.coordinator.set_media_mode(MediaMode::Video).await.unwrap_err();
    assert!(matches!(err, PlaybackError::NoVideoSource));
    assert_eq!(
        h.coordinator.snapshot().phase,
        PlayerPhase::Loaded { mode: MediaMode::Audio }
    );
}

#[tokio::test]
async fn video_request_without_surface_is_rejected() {
    let h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();

    let err = h.coordinator.set_media_mode(MediaMode::Video).await.unwrap_err();
    assert!(matches!(err, PlaybackError::EngineUnavailable(MediaMode::Video)));
}

#[tokio::test]
async fn switch_to_current_mode_is_a_no_op() {
    let mut h = Harness::new();
    h.coordinator.load_episode(episode(), None).await.unwrap();
    h.drain_events();

    h.coordinator.set_media_mode(MediaMode::Audio).await.unwrap();
    assert!(h.drain_events().is_empty());
}

#[tokio::test]
async fn queued_switches_apply_in_order() {
    let h = Harness::new();
    let video = MockEngine::video();
    video.state().load_delay = Some(Duration::from_millis(50));
    let _full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();

    let to_video = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.set_media_mode(MediaMode::Video).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let to_audio = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.set_media_mode(MediaMode::Audio).await })
    };

    to_video.await.unwrap().unwrap();
    to_audio.await.unwrap().unwrap();

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Audio });
    assert!(snapshot.is_playing());
    assert_close(snapshot.current_time(), 120.0, 2.0);
    assert!(h.audio.is_playing());
}

// ============================================================================
// Video surface lifecycle
// ============================================================================

#[tokio::test]
async fn unmount_in_video_mode_hands_back_to_audio() {
    let h = Harness::new();
    let video = MockEngine::video();
    let full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(300.0)).await.unwrap();
    full.play().await.unwrap();
    full.set_media_mode(MediaMode::Video).await.unwrap();
    video.report_time(301.0);
    h.pump().await;

    full.unmount().await.unwrap();

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.media_mode(), MediaMode::Audio);
    assert!(snapshot.is_playing());
    assert_close(snapshot.current_time(), 301.0, 2.0);
    assert!(h.audio.is_playing());
    assert!(!h.audio.is_muted());
    assert!(!video.is_loaded());
}

#[tokio::test]
async fn unmount_during_pending_video_load_discards_it() {
    let h = Harness::new();
    let video = MockEngine::video();
    video.state().load_delay = Some(Duration::from_millis(200));
    let full = FullPlayer::mount(h.coordinator.clone(), Some(video.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(120.0)).await.unwrap();
    h.coordinator.play().await.unwrap();

    let switch = {
        let coordinator = h.coordinator.clone();
        tokio::spawn(async move { coordinator.set_media_mode(MediaMode::Video).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    full.unmount().await.unwrap();

    let result = switch.await.unwrap();
    assert!(matches!(result, Err(PlaybackError::SurfaceDetached)));

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Audio });
    assert!(snapshot.is_playing());
    assert_close(snapshot.current_time(), 120.0, 2.0);
    assert!(h.audio.is_playing());
    assert!(!h.audio.is_muted());
    assert!(!video.is_loaded());
}

#[tokio::test]
async fn remounting_while_video_plays_hands_back_to_audio() {
    let h = Harness::new();
    let first = MockEngine::video();
    let full = FullPlayer::mount(h.coordinator.clone(), Some(first.clone())).await.unwrap();

    h.coordinator.load_episode(episode(), Some(300.0)).await.unwrap();
    full.play().await.unwrap();
    full.set_media_mode(MediaMode::Video).await.unwrap();
    first.report_time(330.0);
    h.pump().await;

    let second = MockEngine::video();
    let _remounted = FullPlayer::mount(h.coordinator.clone(), Some(second.clone())).await.unwrap();
    drop(full);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.phase, PlayerPhase::Loaded { mode: MediaMode::Audio });
    assert!(snapshot.is_playing());
    assert_close(snapshot.current_time(), 330.0, 2.0);

    assert!(h.audio.is_playing());
    assert!(!h.audio.is_muted());
    assert_close(h.audio.position_secs(), 330.0, 2.0);
    assert!(!first.is_loaded());
    assert!(!second.is_loaded());
}

#[tokio::test]
async fn replacing_a_paused_video_surface_leaves_audio_ready() {
    let h = Harness::new();
    let first = MockEngine::video();
    h.coordinator.attach_video_surface(first.clone()).await.unwrap();

    h.coordinator.load_episode(episode(), Some(300.0)).await.unwrap();
    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();
    first.report_time(310.0);
    h.pump().await;

    h.coordinator.attach_video_surface(MockEngine::video()).await.unwrap();

    let snapshot = h.coordinator.snapshot();
    assert_eq!(snapshot.media_mode(), MediaMode::Audio);
    assert!(!snapshot.is_playing());
    assert!(!h.audio.is_playing());
    assert!(!h.audio.is_muted());
    assert_close(h.audio.position_secs(), snapshot.current_time(), 0.01);
    assert_close(snapshot.current_time(), 310.0, 2.0);

    h.coordinator.play().await.unwrap();
    assert!(h.audio.is_playing());
    assert!(!h.audio.is_muted());
}

#[tokio::test]
async fn stale_lease_release_is_ignored() {
    let h = Harness::new();
    let first = MockEngine::video();
    let second = MockEngine::video();

    let lease = h.coordinator.attach_video_surface(first).await.unwrap();
    let _current = h.coordinator.attach_video_surface(second.clone()).await.unwrap();
    assert!(lease.is_cancelled());

    h.coordinator.load_episode(episode(), Some(10.0)).await.unwrap();
    h.coordinator.release_video_surface(&lease).await.unwrap();

    h.coordinator.set_media_mode(MediaMode::Video).await.unwrap();
    assert!(second.is_loaded());
}

#[tokio::test]
async fn mini_player_visibility_is_published() {
    let mut h = Harness::new();

    h.coordinator.set_show_mini_player(true).await;
    h.coordinator.set_show_mini_player(true).await;

    assert!(h.coordinator.snapshot().show_mini_player);
    let events = h.drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        CoreEvent::Mode(ModeEvent::MiniPlayerVisibilityChanged { visible: true })
    ));
}

#[tokio::test]
async fn autoplay_on_load_starts_playback() {
    let h = Harness::with_config(PlayerConfig::default().with_autoplay_on_load(true));
    h.coordinator.load_episode(episode(), None).await.unwrap();

    assert!(h.coordinator.snapshot().is_playing());
    assert!(h.audio.is_playing());
}
