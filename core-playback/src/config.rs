//! # Player Configuration
//!
//! Tunables for the synchronization core: notification rate, polling fallback,
//! drift and continuity tolerances, engine timeouts and the playback-rate cycle.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback rates offered by the rate button, in cycle order.
pub const DEFAULT_RATE_CYCLE: [f32; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Minimum interval between engine-driven play-head notifications.
    ///
    /// Intent-driven writes (seek, skip, mode switch) ignore this limit.
    ///
    /// Default: 16 ms (one display frame at 60 Hz).
    #[serde(default = "default_frame_interval")]
    pub frame_interval: Duration,

    /// Period of the background ticker that flushes throttled updates, polls
    /// stale engines and resyncs shadows.
    ///
    /// Default: 250 ms.
    #[serde(default = "default_tick_interval")]
    pub tick_interval: Duration,

    /// How long the primary engine may go without a native time report before
    /// the ticker starts polling its position.
    ///
    /// Default: 750 ms.
    #[serde(default = "default_poll_fallback_after")]
    pub poll_fallback_after: Duration,

    /// Maximum play-head jump a mode switch may introduce.
    ///
    /// Default: 2 s.
    #[serde(default = "default_continuity_tolerance")]
    pub continuity_tolerance: Duration,

    /// Drift beyond which a shadow engine is reseeked to the play head.
    ///
    /// Default: 1.5 s.
    #[serde(default = "default_drift_tolerance")]
    pub drift_tolerance: Duration,

    /// While a seek settles, engine time reports farther than this from the
    /// target are treated as stale.
    ///
    /// Default: 0.5 s.
    #[serde(default = "default_seek_settle_tolerance")]
    pub seek_settle_tolerance: Duration,

    /// Upper bound on how long stale reports are suppressed after a seek.
    ///
    /// Default: 1.5 s.
    #[serde(default = "default_seek_settle_timeout")]
    pub seek_settle_timeout: Duration,

    /// Deadline for each engine call during load and mode switch.
    ///
    /// Default: 10 s.
    #[serde(default = "default_engine_timeout")]
    pub engine_timeout: Duration,

    /// Step used by `skip_forward` / `skip_backward`.
    ///
    /// Default: 15 s.
    #[serde(default = "default_skip_seconds")]
    pub skip_seconds: f64,

    /// Accepted playback rates, ascending. Must contain 1.0.
    #[serde(default = "default_rate_cycle")]
    pub rate_cycle: Vec<f32>,

    /// Start playback as soon as `load_episode` completes.
    ///
    /// Default: false.
    #[serde(default)]
    pub autoplay_on_load: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            frame_interval: default_frame_interval(),
            tick_interval: default_tick_interval(),
            poll_fallback_after: default_poll_fallback_after(),
            continuity_tolerance: default_continuity_tolerance(),
            drift_tolerance: default_drift_tolerance(),
            seek_settle_tolerance: default_seek_settle_tolerance(),
            seek_settle_timeout: default_seek_settle_timeout(),
            engine_timeout: default_engine_timeout(),
            skip_seconds: default_skip_seconds(),
            rate_cycle: default_rate_cycle(),
            autoplay_on_load: false,
        }
    }
}

impl PlayerConfig {
    /// Configuration for battery-constrained hosts.
    ///
    /// - Play head notified at most 10 times per second
    /// - Slower ticker and polling
    pub fn low_power() -> Self {
        Self {
            frame_interval: Duration::from_millis(100),
            tick_interval: Duration::from_millis(500),
            poll_fallback_after: Duration::from_millis(1500),
            ..Default::default()
        }
    }

    /// Configuration for hosts on slow or unreliable networks.
    ///
    /// - Longer engine deadlines
    /// - Looser settle window for seeks on high-latency streams
    pub fn slow_network() -> Self {
        Self {
            seek_settle_timeout: Duration::from_secs(4),
            engine_timeout: Duration::from_secs(30),
            ..Default::default()
        }
    }

    pub fn with_skip_seconds(mut self, seconds: f64) -> Self {
        self.skip_seconds = seconds;
        self
    }

    pub fn with_rate_cycle(mut self, rates: Vec<f32>) -> Self {
        self.rate_cycle = rates;
        self
    }

    pub fn with_autoplay_on_load(mut self, autoplay: bool) -> Self {
        self.autoplay_on_load = autoplay;
        self
    }

    pub fn with_engine_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = timeout;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_interval.is_zero() {
            return Err("frame_interval must be > 0".to_string());
        }

        if self.tick_interval < self.frame_interval {
            return Err("tick_interval cannot be shorter than frame_interval".to_string());
        }

        if self.poll_fallback_after.is_zero() {
            return Err("poll_fallback_after must be > 0".to_string());
        }

        if self.drift_tolerance.is_zero() || self.continuity_tolerance.is_zero() {
            return Err("drift_tolerance and continuity_tolerance must be > 0".to_string());
        }

        if self.seek_settle_tolerance.is_zero() || self.seek_settle_timeout.is_zero() {
            return Err("seek settle window must be > 0".to_string());
        }

        if self.engine_timeout.is_zero() {
            return Err("engine_timeout must be > 0".to_string());
        }

        if !(self.skip_seconds.is_finite() && self.skip_seconds > 0.0) {
            return Err("skip_seconds must be a positive number".to_string());
        }

        if self.rate_cycle.is_empty() {
            return Err("rate_cycle cannot be empty".to_string());
        }

        if self
            .rate_cycle
            .iter()
            .any(|rate| !(rate.is_finite() && *rate > 0.0))
        {
            return Err("rate_cycle values must be positive".to_string());
        }

        if self.rate_cycle.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err("rate_cycle must be strictly ascending".to_string());
        }

        if !self.accepts_rate(1.0) {
            return Err("rate_cycle must contain 1.0".to_string());
        }

        Ok(())
    }

    /// Returns `true` if `rate` is one of the configured cycle values.
    pub fn accepts_rate(&self, rate: f32) -> bool {
        self.rate_cycle
            .iter()
            .any(|candidate| (candidate - rate).abs() < f32::EPSILON)
    }

    /// The rate following `current` in the cycle, wrapping to the slowest.
    ///
    /// A rate outside the cycle advances to the first value above it.
    pub fn next_rate(&self, current: f32) -> f32 {
        let slowest = self.rate_cycle.first().copied().unwrap_or(1.0);
        self.rate_cycle
            .iter()
            .copied()
            .find(|rate| *rate > current + f32::EPSILON)
            .unwrap_or(slowest)
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_frame_interval() -> Duration {
    Duration::from_millis(16)
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_poll_fallback_after() -> Duration {
    Duration::from_millis(750)
}

fn default_continuity_tolerance() -> Duration {
    Duration::from_secs(2)
}

fn default_drift_tolerance() -> Duration {
    Duration::from_millis(1500)
}

fn default_seek_settle_tolerance() -> Duration {
    Duration::from_millis(500)
}

fn default_seek_settle_timeout() -> Duration {
    Duration::from_millis(1500)
}

fn default_engine_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_skip_seconds() -> f64 {
    15.0
}

fn default_rate_cycle() -> Vec<f32> {
    DEFAULT_RATE_CYCLE.to_vec()
}
