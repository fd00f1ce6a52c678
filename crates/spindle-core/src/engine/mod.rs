//! Audio engine - channel pipelines, passthrough hand-off, mixer
//!
//! This module contains the render-side machinery:
//! - SampleRing: wait-free SPSC sample queue
//! - Passthrough: the ring plus toggle, split into render, input and control handles
//! - ChannelPipeline: per-callback source selection and the stage chain
//! - InputRouter: device input index to channel dispatch
//! - Mixer: renders channels and sums the active ones
//! - Commands and deferred deallocation for control-thread changes

mod channel;
mod command;
mod gc;
mod mixer;
mod passthrough;
mod ring;
mod router;

pub use channel::*;
pub use command::*;
pub use gc::*;
pub use mixer::*;
pub use passthrough::*;
pub use ring::*;
pub use router::*;
