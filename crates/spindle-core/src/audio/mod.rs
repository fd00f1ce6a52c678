//! Device-layer boundary types
//!
//! The device layer owns the input threads. It describes each input port with
//! an [`AudioInput`] and hands buffers to the channel's input handle (directly
//! or through the [`crate::engine::InputRouter`]). Rejections come back as
//! [`InputError`].

mod error;
mod input;

pub use error::{InputError, InputResult};
pub use input::{AudioInput, AudioPathType};
