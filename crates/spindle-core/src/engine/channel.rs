//! Channel pipeline - one mixer channel's per-callback render path
//!
//! Each callback picks a source, fills the output buffer from it, then runs
//! the fixed stage chain in place:
//!
//! ```text
//!                ┌─ passthrough effective ──► ring ──────────────────────┐
//! process() ─────┤                                                       ├─► pregain → filter
//!                ├─ just stopped passing ───► silence, skip, return      │   → modulation → clipping
//!                └─ otherwise ──────────────► source → vinyl emulation ──┘   → metering
//! ```
//!
//! The "just stopped" branch is the deactivation edge: the callback after
//! passthrough stops being effective is forced silent and the ring backlog for
//! that callback is discarded, so a passthrough tail is never spliced with
//! internal audio in the same buffer.

use std::sync::Arc;

use super::passthrough::{
    passthrough, ChannelControl, PassthroughController, PassthroughInput, PassthroughStats,
};
use crate::audio::{AudioInput, AudioPathType, InputError, InputResult};
use crate::config::ChannelConfig;
use crate::source::{PlaybackSource, TrackPlayer};
use crate::stage::{ChannelStages, MeterAtomics, Stage, StageSlot, VinylSoundEmu, NUM_STAGES};
use crate::types::{ChannelId, Sample, StereoBuffer};

/// Render-side half of a channel, owned by the audio thread
pub struct ChannelPipeline<S: PlaybackSource = TrackPlayer> {
    id: ChannelId,
    passthrough: PassthroughController,
    toggle: ChannelControl,
    /// Internal playback source
    source: S,
    /// Source emulation, applied to internal audio only
    emulation: Box<dyn Stage>,
    /// Fixed order: see [`StageSlot::ALL`]
    stages: [Box<dyn Stage>; NUM_STAGES],
    meter: Option<Arc<MeterAtomics>>,
}

/// Input-side half of a channel, moved to the input-delivery thread
pub struct ChannelInput {
    id: ChannelId,
    accepted_kind: AudioPathType,
    passthrough: PassthroughInput,
}

impl ChannelPipeline<TrackPlayer> {
    /// Channel with a track player and the built-in stages
    pub fn new(id: ChannelId, config: &ChannelConfig) -> (Self, ChannelInput) {
        let (stages, meter) = ChannelStages::from_config(config);
        let (mut channel, input) = Self::with_parts(
            id,
            config,
            TrackPlayer::new(),
            Box::new(VinylSoundEmu::new()),
            stages,
        );
        channel.meter = Some(meter);
        (channel, input)
    }
}

impl<S: PlaybackSource> ChannelPipeline<S> {
    /// Channel assembled from caller-supplied collaborators
    ///
    /// Allocates the passthrough ring and conversion buffer; nothing in the
    /// returned halves allocates afterwards.
    pub fn with_parts(
        id: ChannelId,
        config: &ChannelConfig,
        source: S,
        emulation: Box<dyn Stage>,
        stages: ChannelStages,
    ) -> (Self, ChannelInput) {
        let ring_len = config.passthrough_ring_len();
        let (controller, input, toggle) = passthrough(ring_len);
        toggle.set_desired_active(config.passthrough_on_start);

        log::debug!(
            "{}: passthrough ring {} samples, accepts {} input",
            id,
            ring_len,
            config.input_kind
        );

        let channel = Self {
            id,
            passthrough: controller,
            toggle,
            source,
            emulation,
            stages: stages.into_array(),
            meter: None,
        };
        let input = ChannelInput {
            id,
            accepted_kind: config.input_kind,
            passthrough: input,
        };
        (channel, input)
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Render one callback into `output` (its length is the frame count)
    pub fn process(&mut self, output: &mut StereoBuffer) {
        if self.passthrough.is_passthrough_effective() {
            self.passthrough.consume(output.as_interleaved_mut());
            self.passthrough.set_was_active_last_callback(true);
        } else {
            if self.passthrough.was_active_last_callback() {
                output.fill_silence();
                self.passthrough.skip(output.len() * 2);
                self.passthrough.set_was_active_last_callback(false);
                return;
            }

            self.source.render(output);
            self.emulation.process(output);
        }

        for stage in self.stages.iter_mut() {
            stage.process(output);
        }
    }

    /// Whether the mixer should sum this channel
    ///
    /// Also true for the one pending deactivation callback, so the mixer
    /// still picks up the silence that callback emits.
    pub fn is_active(&self) -> bool {
        if self.passthrough.deactivation_pending() {
            return true;
        }
        self.source.is_loaded() || self.passthrough.is_passthrough_effective()
    }

    /// Passthrough toggle (control value > 0 means on)
    pub fn set_passthrough_enabled(&self, enabled: bool) {
        self.toggle.set_desired_active(enabled);
    }

    pub fn passthrough_enabled(&self) -> bool {
        self.passthrough.desired_active()
    }

    pub fn is_passthrough_effective(&self) -> bool {
        self.passthrough.is_passthrough_effective()
    }

    /// Cloneable handle for the control layer (toggle, diagnostics)
    pub fn control(&self) -> ChannelControl {
        self.toggle.clone()
    }

    pub fn stats(&self) -> &PassthroughStats {
        self.passthrough.stats()
    }

    /// Internal playback source, for routing and metadata queries
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn vinyl_emu_mut(&mut self) -> &mut dyn Stage {
        self.emulation.as_mut()
    }

    pub fn stage(&self, slot: StageSlot) -> &dyn Stage {
        self.stages[slot as usize].as_ref()
    }

    pub fn stage_mut(&mut self, slot: StageSlot) -> &mut dyn Stage {
        self.stages[slot as usize].as_mut()
    }

    /// Meter readings of the built-in VU meter, if this channel has one
    pub fn meter(&self) -> Option<Arc<MeterAtomics>> {
        self.meter.clone()
    }

    /// Clear every stage's internal state
    pub fn reset(&mut self) {
        self.source.reset();
        self.emulation.reset();
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }
}

impl ChannelInput {
    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn accepted_kind(&self) -> AudioPathType {
        self.accepted_kind
    }

    /// Rejections are counted, not logged; this runs at audio rate
    fn validate(&self, input: AudioInput) -> InputResult<()> {
        if input.kind() == self.accepted_kind {
            return Ok(());
        }
        self.passthrough.stats().record_rejected();
        Err(InputError::WrongKind {
            expected: self.accepted_kind,
            actual: input.kind(),
        })
    }

    /// Queue `frames` frames of external audio for the render thread
    ///
    /// Ignored (`Ok(0)`) unless passthrough is requested. Returns the number
    /// of stereo samples dropped to truncation or overflow.
    pub fn receive_buffer(
        &mut self,
        input: AudioInput,
        samples: &[Sample],
        frames: usize,
    ) -> InputResult<usize> {
        // Nobody will consume it
        if !self.passthrough.desired_active() {
            return Ok(0);
        }
        self.validate(input)?;
        self.passthrough.produce(samples, frames, input.channels())
    }

    /// Device connected: drop data from the previous device epoch
    pub fn on_input_connected(&self, input: AudioInput) -> InputResult<()> {
        self.validate(input)?;
        self.passthrough.on_connection_event();
        Ok(())
    }

    /// Device disconnected: drop whatever it left behind
    pub fn on_input_disconnected(&self, input: AudioInput) -> InputResult<()> {
        self.validate(input)?;
        self.passthrough.on_connection_event();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::ParamInfo;
    use crate::types::StereoSample;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that emits a constant and counts renders
    struct ConstantSource {
        value: Sample,
        loaded: bool,
        renders: Arc<AtomicUsize>,
    }

    impl PlaybackSource for ConstantSource {
        fn render(&mut self, output: &mut StereoBuffer) {
            self.renders.fetch_add(1, Ordering::Relaxed);
            for s in output.iter_mut() {
                *s = StereoSample::mono(self.value);
            }
        }

        fn is_loaded(&self) -> bool {
            self.loaded
        }
    }

    /// Stage that records its position in a shared call log
    struct Recorder {
        tag: usize,
        log: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    impl Stage for Recorder {
        fn process(&mut self, _buffer: &mut StereoBuffer) {
            self.log.lock().unwrap().push(self.tag);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }

        fn params(&self) -> &'static [ParamInfo] {
            &[]
        }
    }

    struct Harness {
        channel: ChannelPipeline<ConstantSource>,
        input: ChannelInput,
        renders: Arc<AtomicUsize>,
        calls: Arc<std::sync::Mutex<Vec<usize>>>,
    }

    fn harness(ring_len: usize, loaded: bool) -> Harness {
        let renders = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = |tag| -> Box<dyn Stage> {
            Box::new(Recorder {
                tag,
                log: Arc::clone(&calls),
            })
        };
        let stages = ChannelStages {
            pregain: recorder(0),
            filter: recorder(1),
            modulation: recorder(2),
            clipping: recorder(3),
            metering: recorder(4),
        };
        let config = ChannelConfig {
            ring_len,
            ..Default::default()
        };
        let source = ConstantSource {
            value: 0.25,
            loaded,
            renders: Arc::clone(&renders),
        };
        let (channel, input) = ChannelPipeline::with_parts(
            ChannelId::new(0),
            &config,
            source,
            Box::new(VinylSoundEmu::new()),
            stages,
        );
        Harness {
            channel,
            input,
            renders,
            calls,
        }
    }

    fn vinyl() -> AudioInput {
        AudioInput::new(AudioPathType::VinylControl, 0)
    }

    #[test]
    fn test_internal_source_when_passthrough_off() {
        let mut h = harness(64, true);
        let mut out = StereoBuffer::silence(4);
        h.channel.process(&mut out);

        assert_eq!(h.renders.load(Ordering::Relaxed), 1);
        assert_eq!(out[0], StereoSample::mono(0.25));
        assert_eq!(*h.calls.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_input_ignored_unless_requested() {
        let mut h = harness(64, false);
        assert_eq!(h.input.receive_buffer(vinyl(), &[0.5; 8], 4), Ok(0));
        assert_eq!(h.channel.control().buffered_samples(), 0);
    }

    #[test]
    fn test_toggle_without_input_keeps_internal_source() {
        let mut h = harness(64, true);
        h.channel.set_passthrough_enabled(true);
        assert!(!h.channel.is_passthrough_effective());

        let mut out = StereoBuffer::silence(4);
        h.channel.process(&mut out);
        assert_eq!(h.renders.load(Ordering::Relaxed), 1);
        assert_eq!(out[3], StereoSample::mono(0.25));
    }

    #[test]
    fn test_passthrough_feeds_chain() {
        let mut h = harness(64, false);
        h.channel.set_passthrough_enabled(true);
        let stereo = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
        assert_eq!(h.input.receive_buffer(vinyl(), &stereo, 4), Ok(0));
        assert!(h.channel.is_active());

        let mut out = StereoBuffer::silence(4);
        h.channel.process(&mut out);

        assert_eq!(out.as_interleaved(), &stereo);
        assert_eq!(h.renders.load(Ordering::Relaxed), 0);
        assert_eq!(h.calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_deactivation_edge_emits_one_silent_callback() {
        let mut h = harness(64, true);
        h.channel.set_passthrough_enabled(true);
        h.input.receive_buffer(vinyl(), &[0.9; 16], 8).unwrap();

        let mut out = StereoBuffer::silence(2);
        h.channel.process(&mut out);
        assert_eq!(out[0], StereoSample::mono(0.9));
        assert_eq!(h.channel.control().buffered_samples(), 12);

        h.channel.set_passthrough_enabled(false);
        assert!(h.channel.is_active());

        // Edge: forced silence, internal source untouched, backlog skipped
        let mut out = StereoBuffer::from_interleaved(&[1.0; 4]);
        h.channel.process(&mut out);
        assert!(out.is_silent());
        assert_eq!(h.renders.load(Ordering::Relaxed), 0);
        assert_eq!(h.channel.control().buffered_samples(), 8);
        assert_eq!(h.calls.lock().unwrap().len(), 5);

        // Back to the internal source
        let mut out = StereoBuffer::silence(2);
        h.channel.process(&mut out);
        assert_eq!(h.renders.load(Ordering::Relaxed), 1);
        assert_eq!(out[1], StereoSample::mono(0.25));
    }

    #[test]
    fn test_is_active_reports_pending_deactivation() {
        let mut h = harness(64, false);
        assert!(!h.channel.is_active());

        h.channel.set_passthrough_enabled(true);
        h.input.receive_buffer(vinyl(), &[0.5; 4], 2).unwrap();
        assert!(h.channel.is_active());

        let mut out = StereoBuffer::silence(2);
        h.channel.process(&mut out);

        h.channel.set_passthrough_enabled(false);
        assert!(h.channel.is_active());

        h.channel.process(&mut out);
        assert!(!h.channel.is_active());
    }

    #[test]
    fn test_underflow_then_edge_when_input_stalls() {
        let mut h = harness(64, true);
        h.channel.set_passthrough_enabled(true);
        h.input.receive_buffer(vinyl(), &[0.5; 4], 2).unwrap();

        // Asks for 4 frames, only 2 available: remainder silenced
        let mut out = StereoBuffer::silence(4);
        h.channel.process(&mut out);
        assert_eq!(out[1], StereoSample::mono(0.5));
        assert_eq!(out[2], StereoSample::silence());
        assert_eq!(h.channel.stats().underflows(), 1);

        // Ring now empty: treated as a deactivation edge
        h.channel.process(&mut out);
        assert!(out.is_silent());
        assert_eq!(h.renders.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_wrong_kind_rejected_without_side_effects() {
        let mut h = harness(64, false);
        h.channel.set_passthrough_enabled(true);
        h.input.receive_buffer(vinyl(), &[0.5; 4], 2).unwrap();

        let mic = AudioInput::new(AudioPathType::Microphone, 0);
        assert_eq!(
            h.input.receive_buffer(mic, &[0.5; 4], 4),
            Err(InputError::WrongKind {
                expected: AudioPathType::VinylControl,
                actual: AudioPathType::Microphone,
            })
        );
        assert!(h.input.on_input_connected(mic).is_err());
        assert_eq!(h.channel.control().buffered_samples(), 4);
        assert_eq!(h.channel.stats().rejected_buffers(), 2);
    }

    #[test]
    fn test_connection_events_clear_ring() {
        let mut h = harness(64, false);
        h.channel.set_passthrough_enabled(true);

        h.input.receive_buffer(vinyl(), &[0.5; 8], 4).unwrap();
        h.input.on_input_disconnected(vinyl()).unwrap();
        assert_eq!(h.channel.control().buffered_samples(), 0);

        h.input.receive_buffer(vinyl(), &[0.5; 8], 4).unwrap();
        h.input.on_input_connected(vinyl()).unwrap();
        assert_eq!(h.channel.control().buffered_samples(), 0);
    }

    #[test]
    fn test_default_channel_builds_with_meter() {
        let config = ChannelConfig::default();
        let (mut channel, _input) = ChannelPipeline::new(ChannelId::new(2), &config);
        assert!(channel.meter().is_some());
        assert!(!channel.is_active());

        let mut out = StereoBuffer::silence(64);
        channel.process(&mut out);
        assert!(out.is_silent());
        assert_eq!(channel.stage(StageSlot::Metering).name(), "metering");
    }

    #[test]
    fn test_enable_writes_through_control_handle() {
        let h = harness(64, false);
        let control = h.channel.control();

        h.channel.set_passthrough_enabled(true);
        assert!(control.desired_active());
        assert!(h.channel.passthrough_enabled());

        control.set_desired_active(false);
        assert!(!h.channel.passthrough_enabled());
    }

    #[test]
    fn test_degenerate_ring_len_rounded_to_whole_frames() {
        for (ring_len, expected) in [(0, 2), (1, 2), (7, 6)] {
            let config = ChannelConfig {
                ring_len,
                ..Default::default()
            };
            let (channel, _input) = ChannelPipeline::new(ChannelId::new(0), &config);
            assert_eq!(channel.control().capacity(), expected);
        }
    }
}
