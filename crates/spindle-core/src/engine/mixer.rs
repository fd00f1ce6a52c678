//! Mixer - renders every channel and sums the active ones to master
//!
//! Per callback:
//! 1. Drain the command queue
//! 2. Snapshot `is_active()` for every channel
//! 3. Render active channels in parallel (Rayon), each into its own
//!    pre-allocated buffer
//! 4. Sum active channels to master, then apply master volume
//!
//! Inactive channels are not rendered at all. A channel whose passthrough was
//! just switched off still reports active for the one callback that emits its
//! deactivation silence.

use rayon::prelude::*;

use super::channel::{ChannelInput, ChannelPipeline};
use super::command::ChannelCommand;
use super::passthrough::ChannelControl;
use crate::config::SpindleConfig;
use crate::types::{ChannelId, StereoBuffer, MAX_BUFFER_SIZE, NUM_CHANNELS};

pub struct Mixer {
    channels: Vec<ChannelPipeline>,
    /// One render buffer per channel, capacity MAX_BUFFER_SIZE frames
    channel_buffers: Vec<StereoBuffer>,
    /// `is_active()` snapshot taken before rendering
    active: Vec<bool>,
    master_volume: f32,
}

impl Mixer {
    /// Build NUM_CHANNELS channels from the config's channel template
    ///
    /// Returns the mixer for the render thread and one input handle per
    /// channel for the input-delivery thread.
    pub fn new(config: &SpindleConfig) -> (Self, Vec<ChannelInput>) {
        let mut channels = Vec::with_capacity(NUM_CHANNELS);
        let mut inputs = Vec::with_capacity(NUM_CHANNELS);
        for idx in 0..NUM_CHANNELS {
            let (channel, input) = ChannelPipeline::new(ChannelId::new(idx), &config.channel);
            channels.push(channel);
            inputs.push(input);
        }

        log::info!(
            "Mixer: {} channels, passthrough ring {} samples",
            NUM_CHANNELS,
            channels.first().map_or(0, |c| c.control().capacity())
        );

        let mixer = Self {
            channels,
            channel_buffers: (0..NUM_CHANNELS)
                .map(|_| StereoBuffer::silence(MAX_BUFFER_SIZE))
                .collect(),
            active: vec![false; NUM_CHANNELS],
            master_volume: config.mixer.master_volume.clamp(0.0, 1.0),
        };
        (mixer, inputs)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, idx: usize) -> Option<&ChannelPipeline> {
        self.channels.get(idx)
    }

    pub fn channel_mut(&mut self, idx: usize) -> Option<&mut ChannelPipeline> {
        self.channels.get_mut(idx)
    }

    /// Control handles (passthrough toggle and stats), one per channel
    pub fn controls(&self) -> Vec<ChannelControl> {
        self.channels.iter().map(|c| c.control()).collect()
    }

    /// Set master volume (0.0 to 1.0)
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Apply all pending commands
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<ChannelCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.apply(cmd);
        }
    }

    fn apply(&mut self, cmd: ChannelCommand) {
        if let ChannelCommand::SetMasterVolume(volume) = cmd {
            self.set_master_volume(volume);
            return;
        }

        // Runs inside the callback: unknown channels are dropped silently,
        // CommandSender already refuses them
        let Some(channel) = cmd.channel().and_then(|idx| self.channels.get_mut(idx)) else {
            return;
        };

        match cmd {
            ChannelCommand::LoadTrack { track, .. } => channel.source_mut().load(track),
            ChannelCommand::UnloadTrack { .. } => channel.source_mut().unload(),
            ChannelCommand::Play { .. } => channel.source_mut().play(),
            ChannelCommand::Pause { .. } => channel.source_mut().pause(),
            ChannelCommand::TogglePlay { .. } => channel.source_mut().toggle_play(),
            ChannelCommand::Seek { position, .. } => channel.source_mut().seek(position),
            ChannelCommand::SetStageParam {
                slot, param, value, ..
            } => channel.stage_mut(slot).set_param(param, value),
            ChannelCommand::SetEmulationParam { param, value, .. } => {
                channel.vinyl_emu_mut().set_param(param, value)
            }
            ChannelCommand::ResetChannel { .. } => channel.reset(),
            ChannelCommand::SetMasterVolume(_) => {}
        }
    }

    /// Render one callback into `master` (its length is the frame count)
    pub fn process(&mut self, master: &mut StereoBuffer) {
        let frames = master.len();

        // Real-time safe: only the length field changes
        for buf in &mut self.channel_buffers {
            buf.set_len_from_capacity(frames);
        }

        for (flag, channel) in self.active.iter_mut().zip(&self.channels) {
            *flag = channel.is_active();
        }

        // Phase 1: parallel channel render
        self.channels
            .par_iter_mut()
            .zip(self.channel_buffers.par_iter_mut())
            .zip(self.active.par_iter())
            .for_each(|((channel, buffer), &active)| {
                if active {
                    channel.process(buffer);
                }
            });

        // Phase 2: sequential sum
        master.fill_silence();
        for (buffer, &active) in self.channel_buffers.iter().zip(&self.active) {
            if active {
                master.add_buffer(buffer);
            }
        }

        master.scale(self.master_volume);
    }

    /// Clear every channel's stage state
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioInput, AudioPathType};
    use crate::engine::{command_channel, prepare_track};
    use crate::stage::StageSlot;
    use crate::types::StereoSample;

    fn constant_track(frames: usize, value: f32) -> ChannelCommand {
        ChannelCommand::LoadTrack {
            channel: 0,
            track: prepare_track(StereoBuffer::from_vec(vec![StereoSample::mono(value); frames])),
        }
    }

    #[test]
    fn test_empty_mixer_is_silent() {
        let (mut mixer, inputs) = Mixer::new(&SpindleConfig::default());
        assert_eq!(inputs.len(), NUM_CHANNELS);
        assert_eq!(mixer.num_channels(), NUM_CHANNELS);

        let mut master = StereoBuffer::from_interleaved(&[1.0; 512]);
        mixer.process(&mut master);
        assert_eq!(master.len(), 256);
        assert!(master.is_silent());
    }

    #[test]
    fn test_commands_drive_internal_source() {
        let (mut mixer, _inputs) = Mixer::new(&SpindleConfig::default());
        let (mut tx, mut rx) = command_channel(8);

        tx.send(constant_track(1024, 0.5)).unwrap();
        tx.send(ChannelCommand::Play { channel: 0 }).unwrap();
        mixer.process_commands(&mut rx);
        assert!(mixer.channel(0).unwrap().is_active());

        let mut master = StereoBuffer::silence(128);
        mixer.process(&mut master);
        assert!((master[64].left - 0.5).abs() < 1e-3);
        assert_eq!(mixer.channel(0).unwrap().source().position(), 128);

        tx.send(ChannelCommand::SetMasterVolume(0.5)).unwrap();
        mixer.process_commands(&mut rx);
        mixer.process(&mut master);
        assert!((master[64].left - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_unknown_channel_ignored() {
        let (mut mixer, _inputs) = Mixer::new(&SpindleConfig::default());
        let (mut tx, mut rx) = command_channel(4);
        let (mut raw_tx, mut raw_rx) = rtrb::RingBuffer::new(1);

        // A command that bypassed CommandSender is still dropped by the mixer
        raw_tx.push(ChannelCommand::Play { channel: 99 }).unwrap();
        mixer.process_commands(&mut raw_rx);

        assert!(tx.send(ChannelCommand::Play { channel: 99 }).is_err());
        tx.send(ChannelCommand::SetStageParam {
            channel: 1,
            slot: StageSlot::Pregain,
            param: 0,
            value: 1.0,
        })
        .unwrap();
        mixer.process_commands(&mut rx);

        let pregain = mixer.channel(1).unwrap().stage(StageSlot::Pregain);
        assert_eq!(pregain.param_values()[0].actual, 12.0);
    }

    #[test]
    fn test_passthrough_channel_summed() {
        let (mut mixer, mut inputs) = Mixer::new(&SpindleConfig::default());
        let controls = mixer.controls();
        let vinyl = AudioInput::new(AudioPathType::VinylControl, 2);

        controls[2].set_desired_active(true);
        inputs[2].receive_buffer(vinyl, &[0.25; 256], 128).unwrap();

        let mut master = StereoBuffer::silence(128);
        mixer.process(&mut master);
        assert!((master[0].left - 0.25).abs() < 1e-3);
        assert!((master[127].right - 0.25).abs() < 1e-3);

        // Switched off: one silent callback, then the idle channel drops out
        controls[2].set_desired_active(false);
        mixer.process(&mut master);
        assert!(master.is_silent());
        assert!(!mixer.channel(2).unwrap().is_active());
    }

    #[test]
    fn test_single_sample_ring_len_builds() {
        let config: SpindleConfig = serde_yaml::from_str("channel:\n  ring_len: 1\n").unwrap();
        let (mut mixer, mut inputs) = Mixer::new(&config);
        let controls = mixer.controls();
        assert!(controls.iter().all(|c| c.capacity() == 2));

        let vinyl = AudioInput::new(AudioPathType::VinylControl, 0);
        controls[0].set_desired_active(true);
        assert_eq!(inputs[0].receive_buffer(vinyl, &[0.25, -0.25, 0.5, 0.5], 2), Ok(2));

        let mut master = StereoBuffer::silence(1);
        mixer.process(&mut master);
        assert!((master[0].left - 0.25).abs() < 1e-3);
        assert!((master[0].right + 0.25).abs() < 1e-3);
    }
}
