//! Input validation error types

use thiserror::Error;

use super::AudioPathType;

/// Reasons an external input buffer or connection event is rejected
///
/// None of these are fatal: the buffer is dropped and the ring is left
/// untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// Input routed to a channel that accepts a different kind
    #[error("channel accepts {expected} input, got {actual}")]
    WrongKind {
        expected: AudioPathType,
        actual: AudioPathType,
    },

    /// Only mono and stereo input can be converted
    #[error("unsupported input channel count: {0}")]
    UnsupportedChannelCount(usize),

    /// Fewer samples supplied than `frames * channels`
    #[error("input buffer holds {len} samples, {frames} frames x {channels} channels expected")]
    ShortBuffer {
        len: usize,
        frames: usize,
        channels: usize,
    },

    /// Input index beyond the channels the router serves
    #[error("no channel for input index {0}")]
    NoSuchChannel(u8),

    /// Input index valid but no device connected to it
    #[error("input index {0} is not connected")]
    NotConnected(u8),
}

/// Result type for input operations
pub type InputResult<T> = Result<T, InputError>;
