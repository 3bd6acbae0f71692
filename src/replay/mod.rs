//! Interactive playback: playhead, triggered reactions and display buffers.

mod display;
mod session;

pub use display::{
    DisplayFrame, FORWARD, HIGHLIGHT_DIMMED, HIGHLIGHT_NORMAL, HIGHLIGHT_REACTING,
    surface_rotation,
};
pub use session::ReplaySession;
