//! Input router - dispatches device buffers to channel inputs
//!
//! Input index N feeds channel N. A channel only receives audio while a
//! device is connected to its index; connect and disconnect reset the
//! channel's passthrough ring so audio from the previous device is never
//! played.
//!
//! The router lives on the input-delivery thread and is borrowed mutably for
//! every event, so connection changes are serialized with buffer delivery.

use super::channel::ChannelInput;
use crate::audio::{AudioInput, InputError, InputResult};
use crate::types::Sample;

pub struct InputRouter {
    /// Indexed by input index
    inputs: Vec<ChannelInput>,
    connected: Vec<bool>,
}

impl InputRouter {
    pub fn new(inputs: Vec<ChannelInput>) -> Self {
        let connected = vec![false; inputs.len()];
        Self { inputs, connected }
    }

    fn slot(&self, input: AudioInput) -> InputResult<usize> {
        let idx = input.index() as usize;
        if idx < self.inputs.len() {
            Ok(idx)
        } else {
            Err(InputError::NoSuchChannel(input.index()))
        }
    }

    pub fn is_connected(&self, index: u8) -> bool {
        self.connected.get(index as usize).copied().unwrap_or(false)
    }

    pub fn channel_input(&self, index: u8) -> Option<&ChannelInput> {
        self.inputs.get(index as usize)
    }

    /// A device was connected to `input`
    ///
    /// Reconnecting an already connected index replaces the old device.
    pub fn connect(&mut self, input: AudioInput) -> InputResult<()> {
        let idx = self.slot(input)?;
        let channel = &self.inputs[idx];
        channel.on_input_connected(input)?;

        if self.connected[idx] {
            log::info!("{} reconnected to {}", input, channel.id());
        } else {
            log::info!("{} connected to {}", input, channel.id());
        }
        self.connected[idx] = true;
        Ok(())
    }

    pub fn disconnect(&mut self, input: AudioInput) -> InputResult<()> {
        let idx = self.slot(input)?;
        if !self.connected[idx] {
            log::warn!("{} disconnected but was never connected", input);
            return Err(InputError::NotConnected(input.index()));
        }

        let channel = &self.inputs[idx];
        channel.on_input_disconnected(input)?;
        self.connected[idx] = false;
        log::info!("{} disconnected from {}", input, channel.id());
        Ok(())
    }

    /// Deliver one device buffer
    ///
    /// Buffers for unconnected inputs are dropped without logging; devices
    /// can deliver them at audio rate while a connection is torn down.
    pub fn receive_buffer(
        &mut self,
        input: AudioInput,
        samples: &[Sample],
        frames: usize,
    ) -> InputResult<usize> {
        let idx = self.slot(input)?;
        if !self.connected[idx] {
            return Err(InputError::NotConnected(input.index()));
        }
        self.inputs[idx].receive_buffer(input, samples, frames)
    }
}
