//! # Presentation Surfaces
//!
//! Views over the shared play head. Surfaces never write the play head
//! directly; every control is an intent sent to the [`Coordinator`].
//!
//! - [`FullPlayer`]: transport controls, mode toggle, quality menu and the
//!   video engine lease
//! - [`MiniPlayer`]: reduced view with its own muted video shadow
//! - [`ScrubBar`]: drag-aware position control
//!
//! [`Coordinator`]: crate::coordinator::Coordinator

pub mod full_player;
pub mod mini_player;
pub mod scrub;

pub use full_player::FullPlayer;
pub use mini_player::{MiniPlayer, MiniPlayerView};
pub use scrub::ScrubBar;
