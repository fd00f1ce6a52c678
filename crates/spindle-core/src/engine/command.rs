//! Lock-free command queue from the control thread to the render thread
//!
//! The control thread pushes [`ChannelCommand`]s into an `rtrb` ring; the
//! mixer drains it at the start of each callback, so state never changes in
//! the middle of a buffer. Neither side blocks or allocates.
//!
//! ```ignore
//! let (tx, mut rx) = command_channel(256);
//!
//! // Control thread
//! tx.send(ChannelCommand::Play { channel: 0 })?;
//!
//! // Render thread
//! mixer.process_commands(&mut rx);
//! ```
//!
//! The passthrough toggle does not go through this queue: it is a single
//! atomic flag set via [`ChannelControl`](super::ChannelControl).

use basedrop::Shared;

use crate::stage::StageSlot;
use crate::types::{StereoBuffer, NUM_CHANNELS};

/// Commands sent from the control thread to the mixer
pub enum ChannelCommand {
    // ─────────────────────────────────────────────────────────────
    // Track Management
    // ─────────────────────────────────────────────────────────────
    /// Load a prepared track (see [`prepare_track`](super::prepare_track)),
    /// stopped at the start
    LoadTrack {
        channel: usize,
        track: Shared<StereoBuffer>,
    },
    UnloadTrack { channel: usize },

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────
    Play { channel: usize },
    Pause { channel: usize },
    TogglePlay { channel: usize },
    /// Move the playhead to a frame position
    Seek { channel: usize, position: usize },

    // ─────────────────────────────────────────────────────────────
    // Stages
    // ─────────────────────────────────────────────────────────────
    /// Set a chain stage parameter (normalized 0.0-1.0)
    SetStageParam {
        channel: usize,
        slot: StageSlot,
        param: usize,
        value: f32,
    },
    /// Set a vinyl emulation parameter (normalized 0.0-1.0)
    SetEmulationParam {
        channel: usize,
        param: usize,
        value: f32,
    },
    /// Reset every stage of a channel
    ResetChannel { channel: usize },

    // ─────────────────────────────────────────────────────────────
    // Global
    // ─────────────────────────────────────────────────────────────
    /// Master volume (0.0 to 1.0)
    SetMasterVolume(f32),
}

impl ChannelCommand {
    /// Target channel, if the command addresses one
    pub fn channel(&self) -> Option<usize> {
        match self {
            ChannelCommand::LoadTrack { channel, .. }
            | ChannelCommand::UnloadTrack { channel }
            | ChannelCommand::Play { channel }
            | ChannelCommand::Pause { channel }
            | ChannelCommand::TogglePlay { channel }
            | ChannelCommand::Seek { channel, .. }
            | ChannelCommand::SetStageParam { channel, .. }
            | ChannelCommand::SetEmulationParam { channel, .. }
            | ChannelCommand::ResetChannel { channel } => Some(*channel),
            ChannelCommand::SetMasterVolume(_) => None,
        }
    }
}

impl std::fmt::Debug for ChannelCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelCommand::LoadTrack { channel, track } => f
                .debug_struct("LoadTrack")
                .field("channel", channel)
                .field("frames", &track.len())
                .finish(),
            ChannelCommand::UnloadTrack { channel } => write!(f, "UnloadTrack({})", channel),
            ChannelCommand::Play { channel } => write!(f, "Play({})", channel),
            ChannelCommand::Pause { channel } => write!(f, "Pause({})", channel),
            ChannelCommand::TogglePlay { channel } => write!(f, "TogglePlay({})", channel),
            ChannelCommand::Seek { channel, position } => {
                write!(f, "Seek({}, {})", channel, position)
            }
            ChannelCommand::SetStageParam {
                channel,
                slot,
                param,
                value,
            } => write!(
                f,
                "SetStageParam({}, {}, {}, {})",
                channel,
                slot.name(),
                param,
                value
            ),
            ChannelCommand::SetEmulationParam {
                channel,
                param,
                value,
            } => write!(f, "SetEmulationParam({}, {}, {})", channel, param, value),
            ChannelCommand::ResetChannel { channel } => write!(f, "ResetChannel({})", channel),
            ChannelCommand::SetMasterVolume(volume) => write!(f, "SetMasterVolume({})", volume),
        }
    }
}

/// Control-side end of the command queue
pub struct CommandSender {
    producer: rtrb::Producer<ChannelCommand>,
}

impl CommandSender {
    /// Queue a command without blocking
    ///
    /// A full queue hands the command back so the caller can retry or drop it.
    /// Commands addressing a channel that does not exist are handed back too;
    /// the render thread never sees them.
    pub fn send(&mut self, command: ChannelCommand) -> Result<(), ChannelCommand> {
        if command.channel().is_some_and(|idx| idx >= NUM_CHANNELS) {
            log::warn!("Ignoring {:?}, no such channel", command);
            return Err(command);
        }
        self.producer.push(command).map_err(|rtrb::PushError::Full(command)| {
            log::warn!("Command queue full, dropping {:?}", command);
            command
        })
    }

    /// Free slots in the queue
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }
}

/// Create a command queue with room for `capacity` commands
pub fn command_channel(capacity: usize) -> (CommandSender, rtrb::Consumer<ChannelCommand>) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity);
    (CommandSender { producer }, consumer)
}
