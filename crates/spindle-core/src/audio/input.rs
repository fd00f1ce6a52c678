//! Audio input descriptors delivered by the device layer

use serde::{Deserialize, Serialize};

/// What an input port carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioPathType {
    /// Turntable or CDJ timecode signal, stereo
    VinylControl,
    /// Microphone, mono
    Microphone,
    /// Line-level auxiliary input, stereo
    Auxiliary,
}

impl AudioPathType {
    /// Number of interleaved channels the device layer delivers for this kind
    pub fn channels_needed(&self) -> usize {
        match self {
            AudioPathType::VinylControl => 2,
            AudioPathType::Microphone => 1,
            AudioPathType::Auxiliary => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AudioPathType::VinylControl => "vinylcontrol",
            AudioPathType::Microphone => "microphone",
            AudioPathType::Auxiliary => "auxiliary",
        }
    }
}

impl std::fmt::Display for AudioPathType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete input port: its kind plus the index of the kind
/// (vinyl control input 0 feeds channel 1, and so on)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioInput {
    kind: AudioPathType,
    index: u8,
}

impl AudioInput {
    pub fn new(kind: AudioPathType, index: u8) -> Self {
        Self { kind, index }
    }

    #[inline]
    pub fn kind(&self) -> AudioPathType {
        self.kind
    }

    #[inline]
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Channel count the device layer delivers for this input
    #[inline]
    pub fn channels(&self) -> usize {
        self.kind.channels_needed()
    }
}

impl std::fmt::Display for AudioInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.index)
    }
}
