//! Adaptive streaming client bridge.
//!
//! Video engines that play HLS/DASH manifests are backed by a streaming
//! client (hls.js, AVFoundation variant selection, ExoPlayer track selector)
//! with its own bandwidth estimator. The core only needs to read the level
//! ladder and pin or release a level; everything else stays inside the host.

use crate::{error::Result, media::MediaSource, platform::PlatformSendSync};
use serde::{Deserialize, Serialize};

/// One rendition advertised by a parsed manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLevel {
    /// Index of the level inside the manifest, as the client addresses it.
    pub index: usize,
    /// Vertical resolution in pixels (0 when the manifest omits it).
    pub height: u32,
    /// Peak bitrate in bits per second.
    pub bitrate: u32,
    /// Optional label from the manifest (`NAME=` attribute).
    pub name: Option<String>,
}

impl ManifestLevel {
    pub fn new(index: usize, height: u32, bitrate: u32) -> Self {
        Self {
            index,
            height,
            bitrate,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Streaming-manifest client attached to a video engine.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait ManifestClient: PlatformSendSync {
    /// Parse (or re-parse) the manifest behind `source` and return its levels.
    async fn load_manifest(&self, source: MediaSource) -> Result<Vec<ManifestLevel>>;

    /// Pin the client to the manifest level at `index`, or hand selection back
    /// to the client's bandwidth estimator when `None`.
    async fn select_level(&self, index: Option<usize>) -> Result<()>;
}
