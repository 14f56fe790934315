//! # Quality Controller
//!
//! Exposes the adaptive-streaming level ladder of the primary video engine
//! and lets the user pin a level or hand selection back to the streaming
//! client's bandwidth estimator.
//!
//! Levels are presented highest resolution first. Renditions that share a
//! height collapse into one entry carrying the highest bitrate, so the menu
//! never shows two "720p" rows.

use crate::error::{PlaybackError, Result};
use bridge_traits::{
    media::MediaSource,
    streaming::{ManifestClient, ManifestLevel},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One selectable rendition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLevel {
    pub height: u32,
    pub bitrate: u32,
    pub name: String,
    /// Index the streaming client uses to address this rendition.
    pub manifest_index: usize,
}

impl QualityLevel {
    fn from_manifest(level: &ManifestLevel) -> Self {
        let name = match (&level.name, level.height) {
            (Some(name), _) if !name.trim().is_empty() => name.trim().to_string(),
            (_, 0) => format!("{} kbps", level.bitrate / 1000),
            (_, height) => format!("{}p", height),
        };

        Self {
            height: level.height,
            bitrate: level.bitrate,
            name,
            manifest_index: level.index,
        }
    }
}

/// Snapshot of the level ladder and the active choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualitySelection {
    /// Highest resolution first.
    pub levels: Vec<QualityLevel>,
    /// Index into `levels` when a level is pinned; `None` in auto.
    pub current_level_index: Option<usize>,
    pub is_auto: bool,
}

impl QualitySelection {
    fn auto(levels: Vec<QualityLevel>) -> Self {
        Self {
            levels,
            current_level_index: None,
            is_auto: true,
        }
    }

    /// The pinned level, if any.
    pub fn current_level(&self) -> Option<&QualityLevel> {
        self.current_level_index.and_then(|index| self.levels.get(index))
    }

    pub fn level_names(&self) -> Vec<String> {
        self.levels.iter().map(|level| level.name.clone()).collect()
    }
}

/// Dedupe by height (higher bitrate wins) and sort tallest first.
pub fn build_levels(manifest: &[ManifestLevel]) -> Vec<QualityLevel> {
    let mut by_height: BTreeMap<u32, &ManifestLevel> = BTreeMap::new();

    for level in manifest {
        let outranked = by_height
            .get(&level.height)
            .is_some_and(|existing| existing.bitrate >= level.bitrate);
        if !outranked {
            by_height.insert(level.height, level);
        }
    }

    by_height
        .values()
        .rev()
        .map(|level| QualityLevel::from_manifest(level))
        .collect()
}

/// Wraps the streaming client attached to a video engine.
pub struct QualityController {
    client: Arc<dyn ManifestClient>,
    selection: QualitySelection,
}

impl QualityController {
    pub fn new(client: Arc<dyn ManifestClient>) -> Self {
        Self {
            client,
            selection: QualitySelection::auto(Vec::new()),
        }
    }

    pub fn selection(&self) -> &QualitySelection {
        &self.selection
    }

    /// Forget the ladder, e.g. when the source is unloaded.
    pub fn clear(&mut self) {
        self.selection = QualitySelection::auto(Vec::new());
    }

    /// Parse the manifest behind `source` and rebuild the ladder.
    ///
    /// A pinned level survives the reload when a level of the same height is
    /// still advertised; otherwise selection returns to auto.
    pub async fn reload(&mut self, source: &MediaSource) -> Result<&QualitySelection> {
        let manifest = self
            .client
            .load_manifest(source.clone())
            .await
            .map_err(|e| PlaybackError::QualityManifestError(e.to_string()))?;

        let levels = build_levels(&manifest);
        let pinned_height = self.selection.current_level().map(|level| level.height);

        let carried = pinned_height
            .and_then(|height| levels.iter().position(|level| level.height == height));

        debug!(
            levels = levels.len(),
            pinned = ?carried,
            "Quality ladder rebuilt"
        );

        match carried {
            Some(index) => {
                self.selection = QualitySelection {
                    levels,
                    current_level_index: Some(index),
                    is_auto: false,
                };
            }
            None => {
                if pinned_height.is_some() {
                    warn!("Pinned quality level vanished from manifest; returning to auto");
                    self.client
                        .select_level(None)
                        .await
                        .map_err(|e| PlaybackError::QualityManifestError(e.to_string()))?;
                }
                self.selection = QualitySelection::auto(levels);
            }
        }

        Ok(&self.selection)
    }

    /// Pin the level at `index` (an index into [`QualitySelection::levels`]).
    ///
    /// Returns `Ok(false)` without touching the client when `index` does not
    /// exist, which happens when the ladder changed under a stale menu.
    pub async fn set_level(&mut self, index: usize) -> Result<bool> {
        let Some(level) = self.selection.levels.get(index) else {
            debug!(index, available = self.selection.levels.len(), "Ignoring missing quality level");
            return Ok(false);
        };

        self.client
            .select_level(Some(level.manifest_index))
            .await
            .map_err(|e| PlaybackError::QualityManifestError(e.to_string()))?;

        self.selection.current_level_index = Some(index);
        self.selection.is_auto = false;
        Ok(true)
    }

    /// Return selection to the streaming client's estimator.
    pub async fn set_auto(&mut self) -> Result<()> {
        self.client
            .select_level(None)
            .await
            .map_err(|e| PlaybackError::QualityManifestError(e.to_string()))?;

        self.selection.current_level_index = None;
        self.selection.is_auto = true;
        Ok(())
    }
}

impl std::fmt::Debug for QualityController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityController")
            .field("selection", &self.selection)
            .finish()
    }
}
