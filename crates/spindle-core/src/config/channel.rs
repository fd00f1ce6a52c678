//! Channel and mixer settings

use serde::{Deserialize, Serialize};

use crate::audio::AudioPathType;
use crate::types::{MAX_BUFFER_LEN, SAMPLE_RATE};

/// Per-channel settings, applied when the pipeline is built
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// The one input kind this channel passes through
    pub input_kind: AudioPathType,
    /// Passthrough ring capacity in interleaved samples.
    /// Also the size of the mono-to-stereo conversion buffer.
    pub ring_len: usize,
    /// Sample rate the built-in stages are tuned for
    pub sample_rate: u32,
    /// Initial pregain in dB (-24 to +12)
    pub pregain_db: f32,
    /// Initial EQ knobs, low/mid/high (0.0 = kill, 0.5 = flat, 1.0 = +6 dB)
    pub eq: [f32; 3],
    /// Initial flanger wet amount (0.0 = off)
    pub flanger_mix: f32,
    /// Clipper threshold in dBFS (-12 to 0)
    pub clip_threshold_db: f32,
    /// VU meter fall rate in dB per second
    pub meter_falloff_db_per_sec: f32,
    /// Request passthrough as soon as the channel is created
    pub passthrough_on_start: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            input_kind: AudioPathType::VinylControl,
            ring_len: MAX_BUFFER_LEN,
            sample_rate: SAMPLE_RATE,
            pregain_db: 0.0,
            eq: [0.5; 3],
            flanger_mix: 0.0,
            clip_threshold_db: 0.0,
            meter_falloff_db_per_sec: 20.0,
            passthrough_on_start: false,
        }
    }
}

impl ChannelConfig {
    /// `ring_len` rounded down to whole stereo frames, at least one frame
    pub fn passthrough_ring_len(&self) -> usize {
        let len = (self.ring_len & !1).max(2);
        if len != self.ring_len {
            log::warn!(
                "ring_len {} is not a positive number of whole stereo frames, using {}",
                self.ring_len,
                len
            );
        }
        len
    }
}

/// Mixer-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Master volume (0.0 to 1.0)
    pub master_volume: f32,
    /// Slots in the control-to-audio command queue
    pub command_queue_capacity: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            command_queue_capacity: 256,
        }
    }
}

/// Top-level config file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpindleConfig {
    pub mixer: MixerConfig,
    /// Template applied to every channel
    pub channel: ChannelConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "channel:\n  input_kind: Auxiliary\n  pregain_db: 6.0\n";
        let config: SpindleConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.channel.input_kind, AudioPathType::Auxiliary);
        assert_eq!(config.channel.pregain_db, 6.0);
        assert_eq!(config.channel.ring_len, MAX_BUFFER_LEN);
        assert_eq!(config.mixer.command_queue_capacity, 256);
    }

    #[test]
    fn test_ring_len_rounded_to_whole_frames() {
        let yaml = "channel:\n  ring_len: 1\n";
        let config: SpindleConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.channel.passthrough_ring_len(), 2);

        let odd = ChannelConfig {
            ring_len: 9,
            ..Default::default()
        };
        assert_eq!(odd.passthrough_ring_len(), 8);
        assert_eq!(ChannelConfig::default().passthrough_ring_len(), MAX_BUFFER_LEN);
    }
}
