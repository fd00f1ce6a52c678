//! Common types for Spindle
//!
//! Fundamental audio types shared by the channel pipeline, the stages and the
//! mixer: stereo samples, stereo buffers and buffer sizing constants.

use std::ops::{Deref, DerefMut};

/// Default sample rate used by the default stages (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Number of channels (decks) in the mixer
pub const NUM_CHANNELS: usize = 4;

/// Largest render callback the engine is prepared for, in frames.
/// Covers all common JACK/ALSA period sizes (64 ... 4096).
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Passthrough conversion buffer length in interleaved samples.
///
/// Worst-case callback length times the widest supported input (stereo).
/// The passthrough ring holds exactly this many samples.
pub const MAX_BUFFER_LEN: usize = MAX_BUFFER_SIZE * 2;

/// Audio sample type
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// `#[repr(C)]` keeps the layout `[left, right]` so `&[StereoSample]` can be
/// viewed as interleaved `&[f32]` through bytemuck without copying.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(mut self, gain: Sample) -> Self {
        self *= gain;
        self
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, gain: Sample) {
        self.left *= gain;
        self.right *= gain;
    }
}

/// Owned run of stereo frames: a render buffer or a decoded track
///
/// Derefs to `[StereoSample]`. Render buffers are allocated once at
/// [`MAX_BUFFER_SIZE`] frames and resized per callback with
/// [`StereoBuffer::set_len_from_capacity`], which never reallocates.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    frames: Vec<StereoSample>,
}

impl StereoBuffer {
    pub fn silence(frames: usize) -> Self {
        Self {
            frames: vec![StereoSample::silence(); frames],
        }
    }

    /// Build from `[L, R, L, R, ...]`; a trailing half frame is ignored
    pub fn from_interleaved(interleaved: &[Sample]) -> Self {
        let frames = interleaved
            .chunks_exact(2)
            .map(|pair| StereoSample::new(pair[0], pair[1]))
            .collect();
        Self { frames }
    }

    pub fn from_vec(frames: Vec<StereoSample>) -> Self {
        Self { frames }
    }

    /// Change the working length without reallocating
    ///
    /// Frames exposed by growing are silent. `frames` must not exceed the
    /// length the buffer was allocated with.
    #[inline]
    pub fn set_len_from_capacity(&mut self, frames: usize) {
        debug_assert!(frames <= self.frames.capacity(), "render buffer would reallocate");
        self.frames.resize(frames, StereoSample::silence());
    }

    pub fn fill_silence(&mut self) {
        self.frames.fill(StereoSample::silence());
    }

    /// The frames as interleaved samples, without copying
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.frames)
    }

    #[inline]
    pub fn as_interleaved_mut(&mut self) -> &mut [Sample] {
        bytemuck::cast_slice_mut(&mut self.frames)
    }

    /// Sum `other` into this buffer frame by frame
    pub fn add_buffer(&mut self, other: &StereoBuffer) {
        debug_assert_eq!(self.len(), other.len());
        for (dst, &src) in self.frames.iter_mut().zip(other.iter()) {
            *dst += src;
        }
    }

    pub fn scale(&mut self, gain: Sample) {
        self.frames.iter_mut().for_each(|frame| *frame *= gain);
    }

    /// Largest absolute sample on either side
    pub fn peak(&self) -> Sample {
        self.frames.iter().map(StereoSample::peak).fold(0.0, Sample::max)
    }

    pub fn is_silent(&self) -> bool {
        self.frames.iter().all(|f| f.left == 0.0 && f.right == 0.0)
    }
}

impl Deref for StereoBuffer {
    type Target = [StereoSample];

    #[inline]
    fn deref(&self) -> &[StereoSample] {
        &self.frames
    }
}

impl DerefMut for StereoBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut [StereoSample] {
        &mut self.frames
    }
}

/// Mixer channel identifier (0-3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub usize);

impl ChannelId {
    /// Panics if `id >= NUM_CHANNELS`
    pub fn new(id: usize) -> Self {
        assert!(id < NUM_CHANNELS, "no channel {}, the mixer has {}", id, NUM_CHANNELS);
        Self(id)
    }
}

/// Transport state of an internal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Numbered from 1, as printed on the hardware
        write!(f, "[Channel{}]", self.0 + 1)
    }
}
