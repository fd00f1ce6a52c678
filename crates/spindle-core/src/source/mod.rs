//! Internal playback sources
//!
//! A channel renders its internal source whenever passthrough is not in
//! effect. Rendering is "generate, don't transform": the source overwrites
//! the whole buffer.

mod player;

pub use player::{PlayerAtomics, TrackPlayer};

use crate::types::StereoBuffer;

/// Something a channel can play when it is not passing input through
///
/// `render` runs on the audio thread and must not block or allocate.
pub trait PlaybackSource: Send {
    /// Overwrite `output` with the next `output.len()` frames
    fn render(&mut self, output: &mut StereoBuffer);

    /// Whether content is loaded (the channel counts as active if so)
    fn is_loaded(&self) -> bool;

    /// Drop any internal processing state
    fn reset(&mut self) {}
}
