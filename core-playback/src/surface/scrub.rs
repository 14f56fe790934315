//! Scrub bar state.
//!
//! While the user drags, the bar shows its own local time and ignores play
//! head updates. Releasing yields exactly one seek target.

use crate::play_head::PlayerSnapshot;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrubBar {
    displayed: f64,
    duration: f64,
    drag: Option<f64>,
}

impl ScrubBar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow the play head. Returns `true` if the displayed value changed.
    ///
    /// Ignored while a drag is active.
    pub fn on_play_head(&mut self, snapshot: &PlayerSnapshot) -> bool {
        self.duration = snapshot.duration();
        if self.drag.is_some() {
            return false;
        }
        let time = snapshot.current_time();
        let changed = (self.displayed - time).abs() > f64::EPSILON;
        self.displayed = time;
        changed
    }

    pub fn begin_drag(&mut self, at: f64) {
        let at = self.clamp(at);
        self.drag = Some(at);
        self.displayed = at;
    }

    /// Move the thumb. No effect unless a drag is active.
    pub fn drag_to(&mut self, at: f64) {
        if self.drag.is_some() {
            let at = self.clamp(at);
            self.drag = Some(at);
            self.displayed = at;
        }
    }

    /// End the drag and return the seek target, once.
    pub fn release(&mut self) -> Option<f64> {
        self.drag.take()
    }

    /// Abandon the drag without seeking.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn displayed_time(&self) -> f64 {
        self.displayed
    }

    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.displayed / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn clamp(&self, at: f64) -> f64 {
        let at = if at.is_finite() { at.max(0.0) } else { 0.0 };
        if self.duration > 0.0 {
            at.min(self.duration)
        } else {
            at
        }
    }
}
