//! # Engine Bindings
//!
//! The coordinator holds at most two engines per session: the session-owned
//! audio engine and a video engine leased from the Full Player. Exactly one of
//! them drives the play head (the primary); the other, if loaded, is a muted
//! shadow. Which one is primary is stored once, in [`Bindings::primary`].

use crate::engine::EngineAdapter;
use crate::media::MediaMode;
use tokio_util::sync::CancellationToken;

/// One adapter plus the lease that scopes it.
#[derive(Debug)]
pub struct EngineBinding {
    pub adapter: EngineAdapter,
    /// Cancelled when the owning surface unmounts. `None` for session-owned engines.
    pub lease: Option<CancellationToken>,
}

impl EngineBinding {
    pub fn owned(adapter: EngineAdapter) -> Self {
        Self {
            adapter,
            lease: None,
        }
    }

    pub fn leased(adapter: EngineAdapter, lease: CancellationToken) -> Self {
        Self {
            adapter,
            lease: Some(lease),
        }
    }

    pub fn mode(&self) -> MediaMode {
        self.adapter.kind()
    }

    /// Whether the owning surface has gone away.
    pub fn is_detached(&self) -> bool {
        self.lease.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// Audio and video bindings of the active session.
#[derive(Debug, Default)]
pub struct Bindings {
    audio: Option<EngineBinding>,
    video: Option<EngineBinding>,
    primary: Option<MediaMode>,
}

impl Bindings {
    pub fn new(audio: EngineBinding) -> Self {
        Self {
            audio: Some(audio),
            video: None,
            primary: None,
        }
    }

    fn slot(&self, mode: MediaMode) -> &Option<EngineBinding> {
        match mode {
            MediaMode::Audio => &self.audio,
            MediaMode::Video => &self.video,
        }
    }

    fn slot_mut(&mut self, mode: MediaMode) -> &mut Option<EngineBinding> {
        match mode {
            MediaMode::Audio => &mut self.audio,
            MediaMode::Video => &mut self.video,
        }
    }

    pub fn get(&self, mode: MediaMode) -> Option<&EngineBinding> {
        self.slot(mode).as_ref()
    }

    pub fn get_mut(&mut self, mode: MediaMode) -> Option<&mut EngineBinding> {
        self.slot_mut(mode).as_mut()
    }

    pub fn adapter(&self, mode: MediaMode) -> Option<&EngineAdapter> {
        self.get(mode).map(|b| &b.adapter)
    }

    pub fn adapter_mut(&mut self, mode: MediaMode) -> Option<&mut EngineAdapter> {
        self.get_mut(mode).map(|b| &mut b.adapter)
    }

    /// Install a binding, returning the one it replaced.
    pub fn bind(&mut self, binding: EngineBinding) -> Option<EngineBinding> {
        self.slot_mut(binding.mode()).replace(binding)
    }

    /// Remove a binding. If it was primary, no engine is primary afterwards.
    pub fn unbind(&mut self, mode: MediaMode) -> Option<EngineBinding> {
        if self.primary == Some(mode) {
            self.primary = None;
        }
        self.slot_mut(mode).take()
    }

    pub fn is_bound(&self, mode: MediaMode) -> bool {
        self.slot(mode).is_some()
    }

    pub fn primary_mode(&self) -> Option<MediaMode> {
        self.primary
    }

    pub fn is_primary(&self, mode: MediaMode) -> bool {
        self.primary == Some(mode)
    }

    /// Make `mode` primary. Fails if nothing is bound there.
    pub fn set_primary(&mut self, mode: MediaMode) -> bool {
        if !self.is_bound(mode) {
            return false;
        }
        self.primary = Some(mode);
        true
    }

    pub fn clear_primary(&mut self) {
        self.primary = None;
    }

    pub fn primary(&self) -> Option<&EngineAdapter> {
        self.primary.and_then(|mode| self.adapter(mode))
    }

    pub fn primary_mut(&mut self) -> Option<&mut EngineAdapter> {
        let mode = self.primary?;
        self.adapter_mut(mode)
    }

    /// The loaded non-primary adapter, if any.
    pub fn shadow_mut(&mut self) -> Option<&mut EngineAdapter> {
        let mode = self.primary?.other();
        self.adapter_mut(mode).filter(|adapter| adapter.is_loaded())
    }

    /// All bound adapters.
    pub fn adapters_mut(&mut self) -> impl Iterator<Item = &mut EngineAdapter> {
        self.audio
            .iter_mut()
            .chain(self.video.iter_mut())
            .map(|binding| &mut binding.adapter)
    }
}
